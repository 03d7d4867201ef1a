//! Core module
//!
//! Contains the Application, its configuration and frame loop, the type
//! registry, descriptors and the error taxonomy

mod application;
mod debug;
pub mod descriptor;
mod error;
mod registry;
mod scheduler;

pub(crate) use application::WeakApplication;
pub use application::{Application, ApplicationConfig, FailurePolicy, LoopState};
pub use debug::FrameStats;
pub use descriptor::{
    ApplicationDescriptor, ComponentDescriptor, DescriptorError, EntityDescriptor,
    PrefabReference, Props, RootDescriptor, SystemDescriptor, TypedDescriptor,
};
pub use error::{EcsError, RegistryKind, Result};
pub use registry::{Registry, instantiate, short_type_name};
pub use scheduler::{FrameRequest, FrameScheduler, ManualScheduler};
