//! Component update system

use serde::{Deserialize, Serialize};

use crate::core::{EcsError, FailurePolicy, Result};
use crate::ecs::{ComponentHandle, Entity, System};

/// Failure policy of the application `root` is live in.
pub(crate) fn failure_policy(root: &Entity) -> FailurePolicy {
    root.application()
        .map(|application| application.config().failure_policy)
        .unwrap_or_default()
}

/// Apply `policy` to a component hook failure.
pub(crate) fn handle_failure(
    policy: FailurePolicy,
    component: &ComponentHandle,
    phase: &str,
    err: EcsError,
) -> Result<()> {
    match policy {
        FailurePolicy::Isolate => {
            let entity = component
                .entity()
                .map(|entity| entity.id().to_owned())
                .unwrap_or_default();
            log::error!(
                "{phase} of `{}` on entity `{entity}` failed, disabling it: {err}",
                component.type_name()
            );
            component.set_enabled(false);
            Ok(())
        }
        FailurePolicy::Abort => Err(err),
    }
}

/// Calls `update` on every updatable component of the tree, each frame.
///
/// Components run in tree preorder, in list order within an entity. The list
/// is rebuilt at the start of every frame, so components added during a
/// frame are picked up on the next one.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ComponentManager {
    #[serde(skip)]
    dirty: bool,
    #[serde(skip)]
    updatables: Vec<ComponentHandle>,
}

impl ComponentManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a rebuild of the component list before the next update.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Components updated in the last frame.
    #[must_use]
    pub fn updatables(&self) -> &[ComponentHandle] {
        &self.updatables
    }

    fn update_component_lists(&mut self, root: &Entity) {
        if !self.dirty {
            return;
        }
        self.updatables.clear();
        for entity in std::iter::once(root.clone()).chain(root.grand_children()) {
            self.updatables.extend(
                entity
                    .components()
                    .iter()
                    .filter(|component| component.is_updatable() && component.is_enabled()),
            );
        }
        self.dirty = false;
    }
}

impl System for ComponentManager {
    fn init_root(&mut self, root: &Entity) -> Result<()> {
        log::debug!("component manager bound to root `{}`", root.id());
        self.mark_dirty();
        Ok(())
    }

    fn update_root(&mut self, root: &Entity, delta: f64) -> Result<()> {
        self.mark_dirty();
        self.update_component_lists(root);

        let policy = failure_policy(root);
        for component in &self.updatables {
            // detached or disabled since the list was built
            if !component.is_initialized() || !component.is_enabled() {
                continue;
            }
            if let Err(err) = component.update(delta) {
                handle_failure(policy, component, "update", err)?;
            }
        }
        Ok(())
    }

    fn destruct_root(&mut self, _root: &Entity) {
        self.updatables.clear();
        self.dirty = true;
    }
}
