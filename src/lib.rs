//! A small entity tree runtime in Rust
//!
//! This crate provides:
//! - An entity tree with shared ownership and single-parent enforcement
//! - Components with attach/detach lifecycles and declared dependencies
//! - Application-wide systems driven by a host frame scheduler
//! - Declarative scene descriptors, prefabs and a type registry
//! - 2D rendering through a canvas abstraction

pub mod core;
pub mod ecs;
pub mod input;
pub mod prefabs;
pub mod renderer;

// Re-exports for convenience
pub use glam;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::core::{
        Application, ApplicationConfig, ApplicationDescriptor, EcsError, EntityDescriptor,
        FailurePolicy, FrameScheduler, FrameStats, ManualScheduler, Props, Registry,
    };
    pub use crate::ecs::{
        Component, ComponentContext, ComponentHandle, ComponentManager, ComponentRef,
        Dependencies, Entity, Prefab, Renderable, Shape, System, SystemRef, Transform, Updatable,
    };
    pub use crate::input::InputManager;
    pub use crate::prefabs::OriginGraph;
    pub use crate::renderer::{Canvas, CommandBuffer, Renderer};
    pub use glam::{Affine2, Vec2};
}
