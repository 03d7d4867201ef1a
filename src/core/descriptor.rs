//! Declarative descriptors
//!
//! Descriptors are plain data describing what to build: an application's
//! systems and root tree, entities, their components and prefab references.
//! They load from and save to RON or JSON files.
//!
//! ```json
//! {
//!   "root": {
//!     "entities": [
//!       { "id": "p", "components": [{ "type": "Transform" }, { "type": "Orbiter", "distance": 50 }] }
//!     ]
//!   }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Property bag assigned onto a freshly constructed component, system or
/// prefab.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// A registered type name plus the properties to assign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypedDescriptor {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub props: Props,
}

impl TypedDescriptor {
    #[must_use]
    pub fn new(type_name: impl Into<String>, props: Props) -> Self {
        Self {
            type_name: type_name.into(),
            props,
        }
    }

    /// Descriptor without properties
    #[must_use]
    pub fn named(type_name: impl Into<String>) -> Self {
        Self::new(type_name, Props::new())
    }
}

pub type ComponentDescriptor = TypedDescriptor;
pub type SystemDescriptor = TypedDescriptor;

/// Either a bare prefab name or a name with props.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefabReference {
    Name(String),
    Configured(TypedDescriptor),
}

impl PrefabReference {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Configured(descriptor) => &descriptor.type_name,
        }
    }

    /// Split into the prefab name and its props.
    #[must_use]
    pub fn into_parts(self) -> (String, Props) {
        match self {
            Self::Name(name) => (name, Props::new()),
            Self::Configured(descriptor) => (descriptor.type_name, descriptor.props),
        }
    }
}

/// Declarative entity tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefab: Option<PrefabReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityDescriptor>,
}

impl EntityDescriptor {
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Append a component descriptor
    #[must_use]
    pub fn with_component(mut self, component: ComponentDescriptor) -> Self {
        self.components.push(component);
        self
    }

    /// Append a child descriptor
    #[must_use]
    pub fn with_entity(mut self, entity: EntityDescriptor) -> Self {
        self.entities.push(entity);
        self
    }

    /// Apply `overrides` on top of `self`.
    ///
    /// Scalars present in `overrides` win; `components` and `entities` are
    /// concatenated, base first.
    #[must_use]
    pub fn merge(mut self, overrides: EntityDescriptor) -> Self {
        if overrides.prefab.is_some() {
            self.prefab = overrides.prefab;
        }
        if overrides.id.is_some() {
            self.id = overrides.id;
        }
        self.components.extend(overrides.components);
        self.entities.extend(overrides.entities);
        self
    }
}

/// The root container of an application descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootDescriptor {
    pub entities: Vec<EntityDescriptor>,
}

/// Systems plus root tree of an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationDescriptor {
    /// `None` selects the default systems
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systems: Option<Vec<SystemDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<RootDescriptor>,
}

/// Errors that can occur while loading or saving descriptor files
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

/// Parse a descriptor from a RON string
///
/// # Errors
///
/// Returns an error if the text is not a valid descriptor
pub fn from_ron_str<T: DeserializeOwned>(text: &str) -> Result<T, DescriptorError> {
    ron::from_str(text).map_err(|e| DescriptorError::Deserialize(e.to_string()))
}

/// Parse a descriptor from a JSON string
///
/// # Errors
///
/// Returns an error if the text is not a valid descriptor
pub fn from_json_str<T: DeserializeOwned>(text: &str) -> Result<T, DescriptorError> {
    serde_json::from_str(text).map_err(|e| DescriptorError::Deserialize(e.to_string()))
}

/// Save a descriptor to a RON file
///
/// # Errors
///
/// Returns an error if the file cannot be written or serialization fails
pub fn save_ron<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), DescriptorError> {
    let text = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
        .map_err(|e| DescriptorError::Serialize(e.to_string()))?;
    fs::write(path, text)?;
    Ok(())
}

/// Load a descriptor from a RON file
///
/// # Errors
///
/// Returns an error if the file cannot be read or deserialization fails
pub fn load_ron<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, DescriptorError> {
    from_ron_str(&fs::read_to_string(path)?)
}

/// Save a descriptor to a JSON file
///
/// # Errors
///
/// Returns an error if the file cannot be written or serialization fails
pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), DescriptorError> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| DescriptorError::Serialize(e.to_string()))?;
    fs::write(path, text)?;
    Ok(())
}

/// Load a descriptor from a JSON file
///
/// # Errors
///
/// Returns an error if the file cannot be read or deserialization fails
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, DescriptorError> {
    from_json_str(&fs::read_to_string(path)?)
}
