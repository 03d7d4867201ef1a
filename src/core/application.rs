//! Application and the frame loop

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::core::{
    ApplicationDescriptor, EcsError, FrameRequest, FrameScheduler, FrameStats, ManualScheduler,
    Registry, Result, short_type_name,
};
use crate::ecs::{ComponentManager, Entity, System, SystemHandle, SystemRef};
use crate::renderer::Renderer;

/// How systems react to a component failing during a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Log the error, disable the component and carry on with the frame.
    #[default]
    Isolate,
    /// Abort the frame; the error stops the loop.
    Abort,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Start the loop as soon as a root is assigned
    pub autostart: bool,
    /// Per-component failure handling in system dispatch
    pub failure_policy: FailurePolicy,
    /// Frames averaged by [`FrameStats`]
    pub stats_samples: usize,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            autostart: false,
            failure_policy: FailurePolicy::Isolate,
            stats_samples: 120,
        }
    }
}

impl ApplicationConfig {
    /// Start the loop when a root is assigned
    #[must_use]
    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// Set the component failure policy
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the frame statistics window
    #[must_use]
    pub fn with_stats_samples(mut self, samples: usize) -> Self {
        self.stats_samples = samples;
        self
    }
}

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

pub(crate) struct ApplicationShared {
    config: ApplicationConfig,
    systems: RefCell<Vec<SystemHandle>>,
    root: RefCell<Option<Entity>>,
    state: Cell<LoopState>,
    pending_frame: Cell<Option<FrameRequest>>,
    /// Host time of the previous frame, `None` until the first tick after a start
    last_time: Cell<Option<f64>>,
    /// `init_root` ran for the current root and `destruct_root` has not
    root_initialized: Cell<bool>,
    scheduler: RefCell<Box<dyn FrameScheduler>>,
    stats: RefCell<FrameStats>,
}

/// Owns the root entity and the systems, and drives the frame loop.
///
/// Cloning yields another handle to the same application.
#[derive(Clone)]
pub struct Application(Rc<ApplicationShared>);

#[derive(Clone, Default)]
pub(crate) struct WeakApplication(Weak<ApplicationShared>);

impl WeakApplication {
    pub(crate) fn upgrade(&self) -> Option<Application> {
        self.0.upgrade().map(Application)
    }
}

impl Application {
    /// Create an application driven by a [`ManualScheduler`].
    #[must_use]
    pub fn new(config: ApplicationConfig) -> Self {
        Self::with_scheduler(config, ManualScheduler::new())
    }

    /// Create an application driven by the given host scheduler.
    pub fn with_scheduler(config: ApplicationConfig, scheduler: impl FrameScheduler + 'static) -> Self {
        let stats = FrameStats::new(config.stats_samples);
        Self(Rc::new(ApplicationShared {
            config,
            systems: RefCell::new(Vec::new()),
            root: RefCell::new(None),
            state: Cell::new(LoopState::Stopped),
            pending_frame: Cell::new(None),
            last_time: Cell::new(None),
            root_initialized: Cell::new(false),
            scheduler: RefCell::new(Box::new(scheduler)),
            stats: RefCell::new(stats),
        }))
    }

    /// Build systems and the root tree from a descriptor.
    ///
    /// Without a `systems` entry the application gets a [`ComponentManager`]
    /// followed by a [`Renderer`].
    ///
    /// # Errors
    ///
    /// Registry errors for unknown types or bad props, hierarchy errors while
    /// building the tree, and initialization errors when the root goes live.
    pub fn from_descriptor(
        registry: &Registry,
        descriptor: &ApplicationDescriptor,
        config: ApplicationConfig,
    ) -> Result<Self> {
        let application = Self::new(config);

        let systems = match &descriptor.systems {
            Some(systems) => systems
                .iter()
                .map(|system| registry.create_system(&system.type_name, &system.props))
                .collect::<Result<Vec<_>>>()?,
            None => vec![
                SystemHandle::new(ComponentManager::default()),
                SystemHandle::new(Renderer::default()),
            ],
        };
        for system in systems {
            application.add_system_handle(system)?;
        }

        if let Some(root) = &descriptor.root {
            let entity = Entity::new("root");
            for child in &root.entities {
                entity.add_child(&Entity::from_descriptor(registry, child)?)?;
            }
            application.set_root(Some(entity))?;
        }
        Ok(application)
    }

    pub(crate) fn downgrade(&self) -> WeakApplication {
        WeakApplication(Rc::downgrade(&self.0))
    }

    #[must_use]
    pub fn config(&self) -> &ApplicationConfig {
        &self.0.config
    }

    // ========================================================================
    // Systems
    // ========================================================================

    /// Register a system after the existing ones.
    ///
    /// # Errors
    ///
    /// Errors from `init_root` when a root is already initialized.
    pub fn add_system<T: System>(&self, system: T) -> Result<SystemRef<T>> {
        let system = SystemRef::new(system);
        self.add_system_handle(system.handle())?;
        Ok(system)
    }

    /// Register an already wrapped system. Registering the same handle twice
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Errors from `init_root` when a root is already initialized.
    pub fn add_system_handle(&self, system: SystemHandle) -> Result<()> {
        if self.0.systems.borrow().contains(&system) {
            return Ok(());
        }
        system.set_application(Some(self));
        self.0.systems.borrow_mut().push(system.clone());
        log::debug!("registered system `{}`", system.type_name());

        if self.0.root_initialized.get() {
            if let Some(root) = self.root() {
                system.init_root(&root)?;
            }
        }
        Ok(())
    }

    /// Snapshot of the systems in registration order.
    #[must_use]
    pub fn systems(&self) -> Vec<SystemHandle> {
        self.0.systems.borrow().clone()
    }

    #[must_use]
    pub fn get_system<T: System>(&self) -> Option<SystemRef<T>> {
        self.0
            .systems
            .borrow()
            .iter()
            .find_map(SystemHandle::downcast::<T>)
    }

    /// # Errors
    ///
    /// [`EcsError::MissingSystem`] when no system of type `T` is registered.
    pub fn require_system<T: System>(&self) -> Result<SystemRef<T>> {
        self.get_system::<T>().ok_or_else(|| EcsError::MissingSystem {
            entity: self
                .root()
                .map_or_else(|| "<application>".to_owned(), |root| root.id().to_owned()),
            type_name: short_type_name::<T>(),
        })
    }

    // ========================================================================
    // Root
    // ========================================================================

    #[must_use]
    pub fn root(&self) -> Option<Entity> {
        self.0.root.borrow().clone()
    }

    /// Replace the root entity.
    ///
    /// The old root (if any) is torn down first: `destruct_root` on every
    /// system, then its components are destroyed. The new root goes live,
    /// every system gets `init_root`, and the loop starts when `autostart`
    /// is configured.
    ///
    /// # Errors
    ///
    /// [`EcsError::MultiParent`] when the new root already has a parent or
    /// belongs to another application, initialization errors of the new
    /// tree, and `init_root` errors.
    pub fn set_root(&self, root: Option<Entity>) -> Result<()> {
        if self.root() == root {
            return Ok(());
        }
        if let Some(root) = &root {
            let owner = match root.parent() {
                Some(parent) => Some(parent.id().to_owned()),
                None => root
                    .application()
                    .filter(|application| application != self)
                    .map(|_| "<application>".to_owned()),
            };
            if let Some(parent) = owner {
                return Err(EcsError::MultiParent {
                    child: root.id().to_owned(),
                    parent,
                    target: "<application>".to_owned(),
                });
            }
        }

        let previous = self.0.root.borrow_mut().take();
        if let Some(previous) = previous {
            self.destruct_systems(&previous);
            previous.set_application(None)?;
            log::info!("root `{}` detached", previous.id());
        }

        let Some(root) = root else {
            return Ok(());
        };
        *self.0.root.borrow_mut() = Some(root.clone());
        log::info!("root `{}` attached", root.id());
        root.set_application(Some(self))?;
        self.init_systems(&root)?;

        if self.0.config.autostart {
            self.start()?;
        }
        Ok(())
    }

    fn init_systems(&self, root: &Entity) -> Result<()> {
        for system in self.systems() {
            system.init_root(root)?;
        }
        self.0.root_initialized.set(true);
        Ok(())
    }

    fn destruct_systems(&self, root: &Entity) {
        if !self.0.root_initialized.replace(false) {
            return;
        }
        for system in self.systems() {
            system.destruct_root(root);
        }
    }

    // ========================================================================
    // Loop
    // ========================================================================

    #[must_use]
    pub fn state(&self) -> LoopState {
        self.0.state.get()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// The frame request the loop is waiting on, if any.
    #[must_use]
    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.0.pending_frame.get()
    }

    #[must_use]
    pub fn frame_stats(&self) -> Ref<'_, FrameStats> {
        self.0.stats.borrow()
    }

    /// Start the loop. Calling it while running is a no-op.
    ///
    /// A root torn down by [`stop`](Self::stop) gets `init_root` again.
    ///
    /// # Errors
    ///
    /// `init_root` errors; the loop stays stopped in that case.
    pub fn start(&self) -> Result<()> {
        if self.is_running() {
            log::warn!("start() called on a running application, ignoring");
            return Ok(());
        }
        if !self.0.root_initialized.get() {
            if let Some(root) = self.root() {
                self.init_systems(&root)?;
            }
        }
        self.0.last_time.set(None);
        self.0.state.set(LoopState::Running);
        self.request_frame();
        log::info!("application started");
        Ok(())
    }

    /// Stop the loop, cancel the pending frame and run `destruct_root` on
    /// every system when a root is attached.
    pub fn stop(&self) {
        if let Some(request) = self.0.pending_frame.take() {
            self.0.scheduler.borrow_mut().cancel_frame(request);
        }
        let was_running = self.0.state.replace(LoopState::Stopped) == LoopState::Running;
        if let Some(root) = self.root() {
            self.destruct_systems(&root);
        }
        if was_running {
            log::info!("application stopped");
        }
    }

    /// Run one frame at host time `time` (milliseconds).
    ///
    /// Systems run in registration order with `delta = time - last_time`.
    /// The first tick after [`start`](Self::start) only sets the time base:
    /// it runs with `delta = 0` and is not recorded in the frame stats.
    /// Ticks while stopped are ignored.
    ///
    /// # Errors
    ///
    /// The first system error. The loop is stopped before it is returned.
    pub fn tick(&self, time: f64) -> Result<()> {
        self.0.pending_frame.set(None);
        if !self.is_running() {
            log::trace!("tick at {time} ignored, application stopped");
            return Ok(());
        }

        let delta = match self.0.last_time.get() {
            Some(last) => {
                let delta = time - last;
                self.0.stats.borrow_mut().record_frame(delta);
                delta
            }
            None => 0.0,
        };

        if let Some(root) = self.root() {
            for system in self.systems() {
                if let Err(err) = system.update_root(&root, delta) {
                    log::error!("system `{}` failed, stopping: {err}", system.type_name());
                    self.stop();
                    return Err(err);
                }
                if !self.is_running() {
                    break;
                }
            }
        }

        self.0.last_time.set(Some(time));
        if self.is_running() {
            self.request_frame();
        }
        Ok(())
    }

    fn request_frame(&self) {
        if self.0.pending_frame.get().is_some() {
            return;
        }
        let request = self.0.scheduler.borrow_mut().request_frame();
        self.0.pending_frame.set(Some(request));
    }
}

impl PartialEq for Application {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("state", &self.state())
            .field("root", &self.root().map(|root| root.id().to_owned()))
            .field("systems", &self.systems())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::core::{ComponentDescriptor, EntityDescriptor, Props, RootDescriptor};
    use crate::ecs::{Component, ComponentContext, Updatable};

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
        fail_on_update: bool,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Rc::clone(log),
                fail_on_update: false,
            }
        }

        fn push(&self, event: &str) {
            self.log.borrow_mut().push(format!("{} {event}", self.name));
        }
    }

    impl System for Recorder {
        fn init_root(&mut self, _root: &Entity) -> Result<()> {
            self.push("init");
            Ok(())
        }

        fn update_root(&mut self, _root: &Entity, delta: f64) -> Result<()> {
            self.push(&format!("update {delta}"));
            if self.fail_on_update {
                return Err(EcsError::custom("boom"));
            }
            Ok(())
        }

        fn destruct_root(&mut self, _root: &Entity) {
            self.push("destruct");
        }
    }

    #[derive(Default)]
    struct Ticks {
        deltas: Vec<f64>,
    }

    impl Component for Ticks {
        fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
            Some(self)
        }
    }

    impl Updatable for Ticks {
        fn update(&mut self, _ctx: &ComponentContext, delta: f64) -> Result<()> {
            self.deltas.push(delta);
            Ok(())
        }
    }

    /// Counts host requests through shared cells.
    #[derive(Default, Clone)]
    struct CountingScheduler {
        requested: Rc<Cell<u64>>,
        cancelled: Rc<Cell<u64>>,
    }

    impl FrameScheduler for CountingScheduler {
        fn request_frame(&mut self) -> FrameRequest {
            self.requested.set(self.requested.get() + 1);
            FrameRequest::new(self.requested.get())
        }

        fn cancel_frame(&mut self, _request: FrameRequest) {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }

    fn app_with_recorders(log: &Log) -> Application {
        let app = Application::new(ApplicationConfig::default());
        app.add_system(Recorder::new("logic", log)).unwrap();
        app.add_system(Recorder::new("render", log)).unwrap();
        app
    }

    #[test]
    fn test_set_root_initializes_systems_in_order() {
        let log = Log::default();
        let app = app_with_recorders(&log);
        app.set_root(Some(Entity::new("root"))).unwrap();

        assert_eq!(*log.borrow(), vec!["logic init", "render init"]);
        assert!(!app.is_running());
    }

    #[test]
    fn test_systems_update_in_registration_order() {
        let log = Log::default();
        let app = app_with_recorders(&log);
        app.set_root(Some(Entity::new("root"))).unwrap();
        app.start().unwrap();
        log.borrow_mut().clear();

        app.tick(16.0).unwrap();
        app.tick(32.0).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["logic update 0", "render update 0", "logic update 16", "render update 16"]
        );
        assert_eq!(app.frame_stats().total_frames(), 1);
    }

    #[test]
    fn test_one_frame_updates_each_component_once() {
        let app = Application::new(ApplicationConfig::default());
        app.add_system(ComponentManager::default()).unwrap();
        let root = Entity::new("root");
        let child = Entity::new("child");
        root.add_child(&child).unwrap();
        let a = root.add_component(Ticks::default()).unwrap();
        let b = child.add_component(Ticks::default()).unwrap();
        app.set_root(Some(root)).unwrap();
        app.start().unwrap();

        app.tick(16.0).unwrap();
        app.tick(32.0).unwrap();
        assert_eq!(a.borrow().deltas, vec![0.0, 16.0]);
        assert_eq!(b.borrow().deltas, vec![0.0, 16.0]);
    }

    #[test]
    fn test_restart_resets_time_base() {
        let log = Log::default();
        let app = app_with_recorders(&log);
        app.set_root(Some(Entity::new("root"))).unwrap();
        app.start().unwrap();
        app.tick(5000.0).unwrap();
        app.tick(5016.0).unwrap();
        app.stop();

        app.start().unwrap();
        log.borrow_mut().clear();
        app.tick(9000.0).unwrap();
        app.tick(9016.0).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["logic update 0", "render update 0", "logic update 16", "render update 16"]
        );
        assert!(app.frame_stats().max_frame_time_ms() <= 16.0);
    }

    #[test]
    fn test_ticks_while_stopped_are_ignored() {
        let log = Log::default();
        let app = app_with_recorders(&log);
        app.set_root(Some(Entity::new("root"))).unwrap();
        log.borrow_mut().clear();

        app.tick(16.0).unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(app.frame_stats().total_frames(), 0);
    }

    #[test]
    fn test_duplicate_start_keeps_one_pending_frame() {
        let scheduler = CountingScheduler::default();
        let app = Application::with_scheduler(ApplicationConfig::default(), scheduler.clone());
        app.start().unwrap();
        app.start().unwrap();
        assert_eq!(scheduler.requested.get(), 1);

        app.tick(16.0).unwrap();
        assert_eq!(scheduler.requested.get(), 2);
        assert!(app.pending_frame().is_some());

        app.stop();
        assert_eq!(scheduler.cancelled.get(), 1);
        assert!(app.pending_frame().is_none());
    }

    #[test]
    fn test_stop_destructs_root_and_restart_reinitializes() {
        let log = Log::default();
        let app = app_with_recorders(&log);
        app.set_root(Some(Entity::new("root"))).unwrap();
        app.start().unwrap();
        app.stop();
        app.stop();
        assert_eq!(
            *log.borrow(),
            vec!["logic init", "render init", "logic destruct", "render destruct"]
        );

        log.borrow_mut().clear();
        app.start().unwrap();
        assert_eq!(*log.borrow(), vec!["logic init", "render init"]);
    }

    #[test]
    fn test_replacing_root_tears_down_previous() {
        let log = Log::default();
        let app = app_with_recorders(&log);
        let first = Entity::new("first");
        app.set_root(Some(first.clone())).unwrap();
        log.borrow_mut().clear();

        app.set_root(Some(Entity::new("second"))).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["logic destruct", "render destruct", "logic init", "render init"]
        );
        assert!(!first.is_live());
        assert_eq!(app.root().unwrap().id(), "second");

        app.set_root(None).unwrap();
        assert!(app.root().is_none());
    }

    #[test]
    fn test_root_with_parent_is_rejected() {
        let app = Application::new(ApplicationConfig::default());
        let parent = Entity::new("parent");
        let child = Entity::new("child");
        parent.add_child(&child).unwrap();
        assert!(matches!(
            app.set_root(Some(child)).unwrap_err(),
            EcsError::MultiParent { .. }
        ));
    }

    #[test]
    fn test_failing_system_stops_loop() {
        let log = Log::default();
        let app = Application::new(ApplicationConfig::default());
        let mut failing = Recorder::new("bad", &log);
        failing.fail_on_update = true;
        app.add_system(failing).unwrap();
        app.add_system(Recorder::new("after", &log)).unwrap();
        app.set_root(Some(Entity::new("root"))).unwrap();
        app.start().unwrap();

        assert!(app.tick(16.0).is_err());
        assert!(!app.is_running());
        assert!(!log.borrow().iter().any(|line| line.starts_with("after update")));
    }

    #[test]
    fn test_autostart_starts_on_root() {
        let app = Application::new(ApplicationConfig::default().with_autostart(true));
        app.set_root(Some(Entity::new("root"))).unwrap();
        assert!(app.is_running());
    }

    #[test]
    fn test_require_system() {
        let log = Log::default();
        let app = app_with_recorders(&log);
        assert!(app.require_system::<Recorder>().is_ok());
        assert!(matches!(
            app.require_system::<ComponentManager>().unwrap_err(),
            EcsError::MissingSystem { type_name: "ComponentManager", .. }
        ));
    }

    #[test]
    fn test_from_descriptor_defaults_systems() {
        let registry = Registry::with_defaults();
        let descriptor = ApplicationDescriptor {
            systems: None,
            root: Some(RootDescriptor {
                entities: vec![EntityDescriptor {
                    id: Some("p".into()),
                    components: vec![ComponentDescriptor::new("Transform", Props::new())],
                    ..EntityDescriptor::default()
                }],
            }),
        };

        let app =
            Application::from_descriptor(&registry, &descriptor, ApplicationConfig::default())
                .unwrap();
        let names: Vec<_> = app.systems().iter().map(SystemHandle::type_name).collect();
        assert_eq!(names, vec!["ComponentManager", "Renderer"]);
        let p = app.root().unwrap().find_entity("/p").unwrap();
        assert!(p.is_live());
        assert!(p.components().at(0).unwrap().is_initialized());
    }
}
