//! Application-wide systems
//!
//! A system is a singleton service bound to one [`Application`]. It hooks
//! into the root lifecycle: `init_root` when a root is assigned,
//! `update_root` every frame and `destruct_root` when the root is torn down.
//! Hooks of different systems run in registration order.

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::core::{Application, EcsError, Result, WeakApplication, short_type_name};
use crate::ecs::Entity;

/// A root-level service driven by the application loop.
pub trait System: Any {
    /// A root was assigned (or the loop restarted with a root present).
    fn init_root(&mut self, _root: &Entity) -> Result<()> {
        Ok(())
    }

    /// One frame. `delta` is in milliseconds.
    fn update_root(&mut self, _root: &Entity, _delta: f64) -> Result<()> {
        Ok(())
    }

    /// The root is being replaced or the loop stopped.
    fn destruct_root(&mut self, _root: &Entity) {}
}

pub(crate) struct SystemCell<T: System> {
    value: RefCell<T>,
    type_name: &'static str,
    application: RefCell<WeakApplication>,
}

impl<T: System> SystemCell<T> {
    fn busy(&self) -> EcsError {
        EcsError::Busy {
            type_name: self.type_name,
        }
    }
}

pub(crate) trait ErasedSystem {
    fn type_name(&self) -> &'static str;
    fn value_type_id(&self) -> TypeId;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
    fn application(&self) -> Option<Application>;
    fn set_application(&self, application: Option<&Application>);
    fn init_root(&self, root: &Entity) -> Result<()>;
    fn update_root(&self, root: &Entity, delta: f64) -> Result<()>;
    fn destruct_root(&self, root: &Entity);
}

impl<T: System> ErasedSystem for SystemCell<T> {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn application(&self) -> Option<Application> {
        self.application.borrow().upgrade()
    }

    fn set_application(&self, application: Option<&Application>) {
        *self.application.borrow_mut() = application.map(Application::downgrade).unwrap_or_default();
    }

    fn init_root(&self, root: &Entity) -> Result<()> {
        let mut value = self.value.try_borrow_mut().map_err(|_| self.busy())?;
        value.init_root(root)
    }

    fn update_root(&self, root: &Entity, delta: f64) -> Result<()> {
        let mut value = self.value.try_borrow_mut().map_err(|_| self.busy())?;
        value.update_root(root, delta)
    }

    fn destruct_root(&self, root: &Entity) {
        match self.value.try_borrow_mut() {
            Ok(mut value) => value.destruct_root(root),
            Err(_) => log::warn!("skipping destruct_root of busy system `{}`", self.type_name),
        }
    }
}

/// Typed shared handle to a system.
pub struct SystemRef<T: System>(Rc<SystemCell<T>>);

impl<T: System> SystemRef<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(SystemCell {
            value: RefCell::new(value),
            type_name: short_type_name::<T>(),
            application: RefCell::new(WeakApplication::default()),
        }))
    }

    /// # Panics
    ///
    /// Panics while the system is mutably borrowed, e.g. during its own
    /// `update_root`.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.value.borrow()
    }

    /// # Panics
    ///
    /// Panics while the system is borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.value.borrow_mut()
    }

    /// # Errors
    ///
    /// [`EcsError::Busy`] while the system is mutably borrowed.
    pub fn try_borrow(&self) -> Result<Ref<'_, T>> {
        self.0.value.try_borrow().map_err(|_| self.0.busy())
    }

    /// # Errors
    ///
    /// [`EcsError::Busy`] while the system is borrowed.
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, T>> {
        self.0.value.try_borrow_mut().map_err(|_| self.0.busy())
    }

    /// The application this system is registered with.
    ///
    /// # Errors
    ///
    /// [`EcsError::UninitializedAccess`] before registration.
    pub fn application(&self) -> Result<Application> {
        self.0.application().ok_or(EcsError::UninitializedAccess {
            what: "system.application",
        })
    }

    #[must_use]
    pub fn handle(&self) -> SystemHandle {
        SystemHandle(Rc::clone(&self.0) as Rc<dyn ErasedSystem>)
    }
}

impl<T: System> Clone for SystemRef<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: System> PartialEq for SystemRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: System> fmt::Debug for SystemRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRef")
            .field("type", &self.0.type_name)
            .field("bound", &self.0.application().is_some())
            .finish()
    }
}

/// Type-erased system handle, as stored by the application.
#[derive(Clone)]
pub struct SystemHandle(Rc<dyn ErasedSystem>);

impl SystemHandle {
    pub fn new<T: System>(value: T) -> Self {
        SystemRef::new(value).handle()
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    #[must_use]
    pub fn is<T: System>(&self) -> bool {
        self.0.value_type_id() == TypeId::of::<T>()
    }

    #[must_use]
    pub fn downcast<T: System>(&self) -> Option<SystemRef<T>> {
        if !self.is::<T>() {
            return None;
        }
        Rc::clone(&self.0)
            .into_any()
            .downcast::<SystemCell<T>>()
            .ok()
            .map(SystemRef)
    }

    #[must_use]
    pub fn application(&self) -> Option<Application> {
        self.0.application()
    }

    pub(crate) fn set_application(&self, application: Option<&Application>) {
        self.0.set_application(application);
    }

    pub(crate) fn init_root(&self, root: &Entity) -> Result<()> {
        self.0.init_root(root)
    }

    pub(crate) fn update_root(&self, root: &Entity, delta: f64) -> Result<()> {
        self.0.update_root(root, delta)
    }

    pub(crate) fn destruct_root(&self, root: &Entity) {
        self.0.destruct_root(root);
    }
}

impl PartialEq for SystemHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: System> From<SystemRef<T>> for SystemHandle {
    fn from(system: SystemRef<T>) -> Self {
        system.handle()
    }
}

impl fmt::Debug for SystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SystemHandle").field(&self.type_name()).finish()
    }
}
