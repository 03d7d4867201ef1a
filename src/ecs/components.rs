//! Common components

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ecs::{Component, ComponentRef, Entity};

/// Transforms from an entity up to the first ancestor without one, leaf
/// first.
pub type TransformChain = SmallVec<[ComponentRef<Transform>; 8]>;

/// 2D transform relative to the parent entity's transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub position: Vec2,
    pub scale: Vec2,
    /// Rotation in degrees
    pub rotation: f32,
    /// Point rotation and scale are applied around, in local units
    pub pivot: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            pivot: Vec2::ZERO,
        }
    }
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transform with just a position
    #[must_use]
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn with_pivot(mut self, pivot: Vec2) -> Self {
        self.pivot = pivot;
        self
    }

    /// Translate by a delta
    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }

    /// Rotate by `degrees`
    pub fn rotate(&mut self, degrees: f32) {
        self.rotation += degrees;
    }

    /// Local matrix: translate, rotate around the pivot, then scale
    #[must_use]
    pub fn matrix(&self) -> Affine2 {
        Affine2::from_translation(self.position)
            * Affine2::from_translation(self.pivot)
            * Affine2::from_angle(self.rotation.to_radians())
            * Affine2::from_translation(-self.pivot)
            * Affine2::from_scale(self.scale)
    }

    /// Transform of the parent entity, if the parent has one.
    #[must_use]
    pub fn of_parent(entity: &Entity) -> Option<ComponentRef<Transform>> {
        entity.parent()?.get_component::<Transform>()
    }

    /// The entity's transform followed by each ancestor's, stopping at the
    /// first entity without a transform.
    #[must_use]
    pub fn chain(entity: &Entity) -> TransformChain {
        let mut chain = TransformChain::new();
        let mut current = entity.get_component::<Transform>();
        while let Some(transform) = current {
            current = transform.parent_transform();
            chain.push(transform);
        }
        chain
    }
}

impl Component for Transform {}

/// World-space position, scale and rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalTransform {
    pub position: Vec2,
    pub scale: Vec2,
    /// Rotation in degrees
    pub rotation: f32,
}

impl ComponentRef<Transform> {
    /// The transform of the owning entity's parent.
    #[must_use]
    pub fn parent_transform(&self) -> Option<ComponentRef<Transform>> {
        Transform::of_parent(&self.entity().ok()?)
    }

    /// Compose this transform with every ancestor transform.
    ///
    /// Pivots are not taken into account.
    #[must_use]
    pub fn global_transform(&self) -> GlobalTransform {
        let local = *self.borrow();
        let mut global = GlobalTransform {
            position: local.position,
            scale: local.scale,
            rotation: local.rotation,
        };

        let mut current = self.parent_transform();
        while let Some(parent) = current {
            let p = *parent.borrow();
            let (sin, cos) = p.rotation.to_radians().sin_cos();
            let rotated = Vec2::new(
                cos * global.position.x - sin * global.position.y,
                sin * global.position.x + cos * global.position.y,
            );
            global.position = p.position + rotated * p.scale;
            global.scale *= p.scale;
            global.rotation += p.rotation;
            current = parent.parent_transform();
        }
        global
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_transform_defaults() {
        let transform = Transform::default();
        assert_eq!(transform.scale, Vec2::ONE);
        assert_eq!(transform.matrix(), Affine2::IDENTITY);
    }

    #[test]
    fn test_matrix_rotates_around_pivot() {
        let transform = Transform::new()
            .with_rotation(180.0)
            .with_pivot(Vec2::new(1.0, 0.0));
        let point = transform.matrix().transform_point2(Vec2::ZERO);
        assert!(approx(point, Vec2::new(2.0, 0.0)));
    }

    #[test]
    fn test_global_transform_composes_parents() {
        let parent = Entity::new("parent");
        let child = Entity::new("child");
        parent.add_child(&child).unwrap();
        parent
            .add_component(Transform::from_position(Vec2::new(10.0, 0.0)).with_rotation(90.0))
            .unwrap();
        let local = child
            .add_component(Transform::from_position(Vec2::new(1.0, 0.0)).with_scale(Vec2::splat(2.0)))
            .unwrap();

        let global = local.global_transform();
        assert!(approx(global.position, Vec2::new(10.0, 1.0)));
        assert_eq!(global.rotation, 90.0);
        assert_eq!(global.scale, Vec2::splat(2.0));
    }

    #[test]
    fn test_chain_stops_at_entity_without_transform() {
        let top = Entity::new("top");
        let middle = Entity::new("middle");
        let leaf = Entity::new("leaf");
        top.add_child(&middle).unwrap();
        middle.add_child(&leaf).unwrap();
        top.add_component(Transform::default()).unwrap();
        leaf.add_component(Transform::default()).unwrap();

        assert_eq!(Transform::chain(&leaf).len(), 1);
        middle.add_component(Transform::default()).unwrap();
        assert_eq!(Transform::chain(&leaf).len(), 3);
        assert!(Transform::chain(&Entity::new("bare")).is_empty());
    }

    #[test]
    fn test_props_deserialize_vectors() {
        let transform: Transform =
            serde_json::from_str(r#"{ "position": [3.0, 4.0], "rotation": 45.0 }"#).unwrap();
        assert_eq!(transform.position, Vec2::new(3.0, 4.0));
        assert_eq!(transform.scale, Vec2::ONE);
    }
}
