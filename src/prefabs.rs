//! Built-in prefabs

use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{EntityDescriptor, Props, TypedDescriptor};
use crate::ecs::{Prefab, Shape, Transform};

/// Props of a built-in component, as a descriptor would carry them.
fn props_of<T: Serialize>(value: &T) -> Props {
    match serde_json::to_value(value) {
        Ok(Value::Object(props)) => props,
        _ => Props::new(),
    }
}

/// Parameters of [`OriginGraph`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginGraphProps {
    /// Edge length of the cross
    pub size: f32,
    pub color: String,
    pub line_width: f32,
}

impl Default for OriginGraphProps {
    fn default() -> Self {
        Self {
            size: 10.0,
            color: "#aaffff".to_owned(),
            line_width: 2.0,
        }
    }
}

/// A stroked cross centred on the parent's origin.
#[derive(Debug, Default)]
pub struct OriginGraph;

impl Prefab for OriginGraph {
    type Props = OriginGraphProps;

    fn build(&self, props: OriginGraphProps) -> EntityDescriptor {
        let size = props.size;
        let half = size / 2.0;
        let transform = Transform::from_position(Vec2::splat(-half));
        let shape = Shape::new(format!("m 0 {half} l {size} {half} m {half} 0 l {half} {size}"))
            .with_stroke(props.color, props.line_width);

        EntityDescriptor::with_id("origin-graph")
            .with_component(TypedDescriptor::new("Transform", props_of(&transform)))
            .with_component(TypedDescriptor::new("Shape", props_of(&shape)))
    }
}
