//! Entity Component System module
//!
//! Entities form a shared-ownership tree. Components hang off entities and
//! get their lifecycle hooks once the entity joins a live application; systems
//! are application-wide services driven once per frame.

mod component;
mod components;
mod dependency;
pub(crate) mod entity;
mod list;
pub(crate) mod manager;
mod observable;
mod prefab;
mod shape;
mod system;

pub use component::{
    Component, ComponentContext, ComponentHandle, ComponentRef, Renderable, Updatable,
};
pub use components::{GlobalTransform, Transform, TransformChain};
pub use dependency::Dependencies;
pub use entity::{Entity, EntityEvent, EntityEventKind, MAX_PREFAB_DEPTH};
pub use list::{ListObserver, ObservableList};
pub use manager::ComponentManager;
pub use observable::{Event, Observable, SubscriptionId};
pub use prefab::{OVERRIDES_KEY, Prefab};
pub use shape::{Shape, parse_path};
pub use system::{System, SystemHandle, SystemRef};
