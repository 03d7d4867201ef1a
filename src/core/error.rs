//! Error types for hierarchy, lifecycle and registry operations
//!
//! Every failure the core can produce is a variant of [`EcsError`]. None of
//! them are swallowed internally: they propagate out of the call that caused
//! them (tree mutation, descriptor expansion, a frame tick) unless a system
//! explicitly isolates them according to its [`FailurePolicy`].
//!
//! [`FailurePolicy`]: crate::core::FailurePolicy

use std::fmt;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = EcsError> = std::result::Result<T, E>;

/// The three kinds of types a [`Registry`](crate::core::Registry) can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryKind {
    Component,
    System,
    Prefab,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component => write!(f, "component"),
            Self::System => write!(f, "system"),
            Self::Prefab => write!(f, "prefab"),
        }
    }
}

/// Errors raised by the entity tree, component lifecycle and type registry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EcsError {
    /// Two types were registered under the same name.
    #[error("{kind} type `{name}` is already registered")]
    DuplicateRegistration { kind: RegistryKind, name: String },

    /// A descriptor referenced a type name nobody registered.
    #[error("unknown {kind} type `{name}`")]
    UnknownType { kind: RegistryKind, name: String },

    /// Properties could not be assigned onto the constructed value.
    #[error("invalid properties for `{name}`: {source}")]
    InvalidProperties {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// An entity that already has a parent was added to another container.
    #[error("tried to add entity `{child}` to `{target}`, but it is already a child of `{parent}`")]
    MultiParent {
        child: String,
        parent: String,
        target: String,
    },

    /// An entity was added beneath itself or one of its descendants.
    #[error("adding entity `{child}` to `{target}` would create a cycle")]
    HierarchyCycle { child: String, target: String },

    /// A component that already belongs to an entity was added to another one.
    #[error("component `{type_name}` is already attached to entity `{entity}`")]
    ComponentAlreadyAttached {
        type_name: &'static str,
        entity: String,
    },

    /// `require_component` found no match on the entity.
    #[error("entity `{entity}` required missing component of type `{type_name}`")]
    MissingComponent {
        entity: String,
        type_name: &'static str,
    },

    /// `require_system` found no match on the entity's application.
    #[error("entity `{entity}` required missing system of type `{type_name}`")]
    MissingSystem {
        entity: String,
        type_name: &'static str,
    },

    /// A back-reference was read before it was established.
    #[error("tried to access {what} before initialization")]
    UninitializedAccess { what: &'static str },

    /// Index-based list access outside the list bounds.
    #[error("list does not include index {index} (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A component or system was accessed while one of its own hooks was running.
    #[error("`{type_name}` is already borrowed")]
    Busy { type_name: &'static str },

    /// Prefab expansion kept producing further prefabs.
    #[error("prefab `{name}` exceeded the maximum expansion depth of {depth}")]
    PrefabDepth { name: String, depth: usize },

    /// Failure reported by user code from a lifecycle hook.
    #[error("{0}")]
    Custom(String),
}

impl EcsError {
    /// Create a custom error from any message.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}
