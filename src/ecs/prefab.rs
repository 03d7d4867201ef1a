//! Prefabs
//!
//! A prefab is a parameterized factory for an [`EntityDescriptor`]. Props
//! arrive as a property bag; an optional `overrides` key holds an entity
//! descriptor merged on top of what the prefab builds.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::{EcsError, EntityDescriptor, Props, Result, instantiate};

/// Key under which props carry descriptor overrides.
pub const OVERRIDES_KEY: &str = "overrides";

/// Factory for a reusable entity subtree.
pub trait Prefab {
    /// Typed parameters, filled from the defaults plus the given props.
    type Props: Default + Serialize + DeserializeOwned;

    /// Produce the descriptor for the given parameters.
    fn build(&self, props: Self::Props) -> EntityDescriptor;

    /// Build from a property bag and apply its `overrides`.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidProperties`] when the props or the overrides do
    /// not fit.
    fn describe(&self, name: &str, props: &Props) -> Result<EntityDescriptor> {
        let mut props = props.clone();
        let overrides = match props.remove(OVERRIDES_KEY) {
            Some(value) => serde_json::from_value::<EntityDescriptor>(value).map_err(|source| {
                EcsError::InvalidProperties {
                    name: format!("{name}.{OVERRIDES_KEY}"),
                    source,
                }
            })?,
            None => EntityDescriptor::default(),
        };
        let typed = instantiate::<Self::Props>(name, &props)?;
        Ok(self.build(typed).merge(overrides))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::core::TypedDescriptor;

    #[derive(Default)]
    struct Pair;

    #[derive(Default, Serialize, Deserialize)]
    #[serde(default)]
    struct PairProps {
        label: String,
    }

    impl Prefab for Pair {
        type Props = PairProps;

        fn build(&self, props: PairProps) -> EntityDescriptor {
            let id = if props.label.is_empty() {
                "pair".to_owned()
            } else {
                props.label
            };
            EntityDescriptor::with_id(id).with_component(TypedDescriptor::named("A"))
        }
    }

    fn props(value: serde_json::Value) -> Props {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_overrides_are_concatenated() {
        let descriptor = Pair
            .describe(
                "Pair",
                &props(json!({ "overrides": { "components": [{ "type": "B" }] } })),
            )
            .unwrap();
        let types: Vec<_> = descriptor
            .components
            .iter()
            .map(|c| c.type_name.as_str())
            .collect();
        assert_eq!(types, vec!["A", "B"]);
        assert_eq!(descriptor.id.as_deref(), Some("pair"));
    }

    #[test]
    fn test_typed_props_reach_build() {
        let descriptor = Pair
            .describe("Pair", &props(json!({ "label": "left" })))
            .unwrap();
        assert_eq!(descriptor.id.as_deref(), Some("left"));
    }

    #[test]
    fn test_override_id_wins() {
        let descriptor = Pair
            .describe("Pair", &props(json!({ "overrides": { "id": "mine" } })))
            .unwrap();
        assert_eq!(descriptor.id.as_deref(), Some("mine"));
    }

    #[test]
    fn test_malformed_overrides() {
        let err = Pair
            .describe("Pair", &props(json!({ "overrides": 3 })))
            .unwrap_err();
        assert!(matches!(err, EcsError::InvalidProperties { ref name, .. } if name == "Pair.overrides"));
    }
}
