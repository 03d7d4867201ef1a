//! Components and their lifecycle
//!
//! A component is a unit of behaviour attached to exactly one [`Entity`].
//! The entity owns it; the component only keeps a weak back-reference.
//!
//! Lifecycle per attach cycle:
//!
//! 1. the component is added to an entity (back-reference set)
//! 2. once the entity is connected to a root that has an application, the
//!    component's declared [`Dependencies`] are resolved and `init` runs
//! 3. when the component (or an ancestor entity) is removed from the live
//!    tree, `destroy` runs and the component may be attached again later
//!
//! Per-frame behaviour is opted into through the [`Updatable`] and
//! [`Renderable`] capabilities rather than by probing for hooks.

use std::any::{Any, TypeId};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::core::{Application, EcsError, Result, short_type_name};
use crate::ecs::entity::WeakEntity;
use crate::ecs::{Dependencies, Entity, System, SystemRef};
use crate::renderer::Canvas;

/// A behaviour unit attached to an entity.
///
/// Every hook has a default, so the minimal component is a plain struct with
/// an empty `impl Component for ... {}`.
pub trait Component: Any {
    /// Declare sibling and entity-path dependencies for this type.
    ///
    /// Called once per type; the resulting table is shared by all instances.
    fn dependencies(_deps: &mut Dependencies<Self>)
    where
        Self: Sized,
    {
    }

    /// Called when the component becomes live, after dependencies resolved.
    fn init(&mut self, _ctx: &ComponentContext) -> Result<()> {
        Ok(())
    }

    /// Called when the component leaves the live tree. Undo what `init` did.
    fn destroy(&mut self, _ctx: &ComponentContext) {}

    /// Opt into per-frame updates.
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        None
    }

    /// Opt into rendering.
    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        None
    }
}

/// Capability for components that advance every frame.
pub trait Updatable {
    /// `delta` is the time since the previous frame in milliseconds.
    fn update(&mut self, ctx: &ComponentContext, delta: f64) -> Result<()>;
}

/// Capability for components that draw themselves.
///
/// The canvas already carries the entity's accumulated transform.
pub trait Renderable {
    fn render(&mut self, ctx: &ComponentContext, canvas: &mut dyn Canvas) -> Result<()>;
}

/// What a lifecycle hook can reach: its entity and, through it, the tree and
/// the application.
#[derive(Debug, Clone)]
pub struct ComponentContext {
    entity: Entity,
}

impl ComponentContext {
    pub(crate) fn new(entity: Entity) -> Self {
        Self { entity }
    }

    /// The entity this component is attached to.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// The application the entity is live in.
    #[must_use]
    pub fn application(&self) -> Option<Application> {
        self.entity.application()
    }

    /// Resolve a path relative to the entity.
    #[must_use]
    pub fn find_entity(&self, path: &str) -> Option<Entity> {
        self.entity.find_entity(path)
    }

    /// First sibling component of type `T`.
    #[must_use]
    pub fn get_component<T: Component>(&self) -> Option<ComponentRef<T>> {
        self.entity.get_component::<T>()
    }

    /// First sibling component of type `T`, or an error.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] when absent.
    pub fn require_component<T: Component>(&self) -> Result<ComponentRef<T>> {
        self.entity.require_component::<T>()
    }

    /// First application system of type `T`.
    #[must_use]
    pub fn get_system<T: System>(&self) -> Option<SystemRef<T>> {
        self.entity.get_system::<T>()
    }

    /// First application system of type `T`, or an error.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingSystem`] when absent.
    pub fn require_system<T: System>(&self) -> Result<SystemRef<T>> {
        self.entity.require_system::<T>()
    }
}

/// Capabilities probed once when a component is wrapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Capabilities {
    pub update: bool,
    pub render: bool,
}

pub(crate) struct ComponentCell<T: Component> {
    value: RefCell<T>,
    type_name: &'static str,
    entity: RefCell<WeakEntity>,
    initialized: Cell<bool>,
    enabled: Cell<bool>,
    capabilities: Capabilities,
    dependencies: Rc<Dependencies<T>>,
}

impl<T: Component> ComponentCell<T> {
    fn busy(&self) -> EcsError {
        EcsError::Busy {
            type_name: self.type_name,
        }
    }

    fn context(&self) -> Result<ComponentContext> {
        self.entity
            .borrow()
            .upgrade()
            .map(ComponentContext::new)
            .ok_or(EcsError::UninitializedAccess {
                what: "component.entity",
            })
    }

    fn run_init(&self) -> Result<()> {
        let ctx = self.context()?;
        let mut value = self.value.try_borrow_mut().map_err(|_| self.busy())?;
        let result = self
            .dependencies
            .resolve(&mut value, ctx.entity())
            .and_then(|()| value.init(&ctx));
        if result.is_err() {
            self.dependencies.release(&mut value);
        }
        result
    }
}

/// Type-erased view of a [`ComponentCell`].
pub(crate) trait ErasedComponent {
    fn type_name(&self) -> &'static str;
    fn value_type_id(&self) -> TypeId;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
    fn entity(&self) -> Option<Entity>;
    fn set_entity(&self, entity: Option<&Entity>);
    fn is_initialized(&self) -> bool;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
    fn capabilities(&self) -> Capabilities;
    fn attach(&self) -> Result<()>;
    fn detach(&self);
    fn update(&self, delta: f64) -> Result<()>;
    fn render(&self, canvas: &mut dyn Canvas) -> Result<()>;
}

impl<T: Component> ErasedComponent for ComponentCell<T> {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn entity(&self) -> Option<Entity> {
        self.entity.borrow().upgrade()
    }

    fn set_entity(&self, entity: Option<&Entity>) {
        *self.entity.borrow_mut() = entity.map(Entity::downgrade).unwrap_or_default();
    }

    fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn attach(&self) -> Result<()> {
        // set before running so re-entrant hierarchy events are no-ops
        if self.initialized.replace(true) {
            return Ok(());
        }
        let result = self.run_init();
        if result.is_err() {
            self.initialized.set(false);
        }
        result
    }

    fn detach(&self) {
        if !self.initialized.replace(false) {
            return;
        }
        let Ok(mut value) = self.value.try_borrow_mut() else {
            log::warn!("skipping destroy of busy component `{}`", self.type_name);
            return;
        };
        if let Ok(ctx) = self.context() {
            value.destroy(&ctx);
        }
        // resolved dependencies may point back into the tree
        self.dependencies.release(&mut value);
    }

    fn update(&self, delta: f64) -> Result<()> {
        let ctx = self.context()?;
        let mut value = self.value.try_borrow_mut().map_err(|_| self.busy())?;
        match value.as_updatable() {
            Some(updatable) => updatable.update(&ctx, delta),
            None => Ok(()),
        }
    }

    fn render(&self, canvas: &mut dyn Canvas) -> Result<()> {
        let ctx = self.context()?;
        let mut value = self.value.try_borrow_mut().map_err(|_| self.busy())?;
        match value.as_renderable() {
            Some(renderable) => renderable.render(&ctx, canvas),
            None => Ok(()),
        }
    }
}

/// Typed shared handle to a component.
pub struct ComponentRef<T: Component>(Rc<ComponentCell<T>>);

impl<T: Component> ComponentRef<T> {
    /// Wrap a component value. It is not attached to any entity yet.
    pub fn new(mut value: T) -> Self {
        let capabilities = Capabilities {
            update: value.as_updatable().is_some(),
            render: value.as_renderable().is_some(),
        };
        Self(Rc::new(ComponentCell {
            value: RefCell::new(value),
            type_name: short_type_name::<T>(),
            entity: RefCell::new(WeakEntity::default()),
            initialized: Cell::new(false),
            enabled: Cell::new(true),
            capabilities,
            dependencies: Dependencies::<T>::of(),
        }))
    }

    /// Immutably borrow the component.
    ///
    /// # Panics
    ///
    /// Panics if the component is currently mutably borrowed, e.g. from
    /// inside one of its own hooks. Use [`try_borrow`](Self::try_borrow) when
    /// that can happen.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.value.borrow()
    }

    /// Mutably borrow the component.
    ///
    /// # Panics
    ///
    /// Panics if the component is already borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.value.borrow_mut()
    }

    /// Immutably borrow the component.
    ///
    /// # Errors
    ///
    /// [`EcsError::Busy`] while the component is mutably borrowed.
    pub fn try_borrow(&self) -> Result<Ref<'_, T>> {
        self.0.value.try_borrow().map_err(|_| self.0.busy())
    }

    /// Mutably borrow the component.
    ///
    /// # Errors
    ///
    /// [`EcsError::Busy`] while the component is borrowed.
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, T>> {
        self.0.value.try_borrow_mut().map_err(|_| self.0.busy())
    }

    /// The owning entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::UninitializedAccess`] before the component is attached.
    pub fn entity(&self) -> Result<Entity> {
        self.0.entity().ok_or(EcsError::UninitializedAccess {
            what: "component.entity",
        })
    }

    /// Whether `init` has run for the current attach cycle.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.0.is_initialized()
    }

    /// Disabled components are skipped by the updating and rendering systems.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.0.set_enabled(enabled);
    }

    /// Type-erased handle to the same component.
    #[must_use]
    pub fn handle(&self) -> ComponentHandle {
        ComponentHandle(Rc::clone(&self.0) as Rc<dyn ErasedComponent>)
    }
}

impl<T: Component> Clone for ComponentRef<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Component> PartialEq for ComponentRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Component> Eq for ComponentRef<T> {}

impl<T: Component> fmt::Debug for ComponentRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("type", &self.0.type_name)
            .field("entity", &self.0.entity().map(|e| e.id().to_owned()))
            .field("initialized", &self.0.is_initialized())
            .finish()
    }
}

/// Type-erased shared handle to a component, as stored by entities.
///
/// Equality is identity: two handles are equal when they refer to the same
/// component instance.
#[derive(Clone)]
pub struct ComponentHandle(Rc<dyn ErasedComponent>);

impl ComponentHandle {
    /// Wrap a component value.
    pub fn new<T: Component>(value: T) -> Self {
        ComponentRef::new(value).handle()
    }

    /// Short name of the component's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// `TypeId` of the wrapped component.
    #[must_use]
    pub fn component_type_id(&self) -> TypeId {
        self.0.value_type_id()
    }

    /// Whether the wrapped component is a `T`.
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.0.value_type_id() == TypeId::of::<T>()
    }

    /// Typed handle, if the component is a `T`.
    #[must_use]
    pub fn downcast<T: Component>(&self) -> Option<ComponentRef<T>> {
        if !self.is::<T>() {
            return None;
        }
        Rc::clone(&self.0)
            .into_any()
            .downcast::<ComponentCell<T>>()
            .ok()
            .map(ComponentRef)
    }

    /// The owning entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::UninitializedAccess`] before the component is attached.
    pub fn entity(&self) -> Result<Entity> {
        self.0.entity().ok_or(EcsError::UninitializedAccess {
            what: "component.entity",
        })
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.0.is_initialized()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.0.set_enabled(enabled);
    }

    /// Whether the component implements [`Updatable`].
    #[must_use]
    pub fn is_updatable(&self) -> bool {
        self.0.capabilities().update
    }

    /// Whether the component implements [`Renderable`].
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        self.0.capabilities().render
    }

    /// Resolve dependencies and run `init`. A no-op if already initialized.
    ///
    /// Normally driven by the entity tree; exposed for hosts that manage
    /// attachment themselves.
    ///
    /// # Errors
    ///
    /// [`EcsError::UninitializedAccess`] when unattached, dependency errors
    /// such as [`EcsError::MissingComponent`], or whatever `init` returns.
    pub fn on_added_to_hierarchy(&self) -> Result<()> {
        self.0.attach()
    }

    /// Reset the initialized flag and run `destroy` if `init` had run.
    pub fn on_removed_from_hierarchy(&self) {
        self.0.detach();
    }

    pub(crate) fn set_entity(&self, entity: Option<&Entity>) {
        self.0.set_entity(entity);
    }

    pub(crate) fn update(&self, delta: f64) -> Result<()> {
        self.0.update(delta)
    }

    pub(crate) fn render(&self, canvas: &mut dyn Canvas) -> Result<()> {
        self.0.render(canvas)
    }
}

impl PartialEq for ComponentHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ComponentHandle {}

impl<T: Component> From<ComponentRef<T>> for ComponentHandle {
    fn from(component: ComponentRef<T>) -> Self {
        component.handle()
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("type", &self.type_name())
            .field("entity", &self.0.entity().map(|e| e.id().to_owned()))
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
