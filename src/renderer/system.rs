//! Renderer system
//!
//! Each frame the renderer clears its canvas and draws every renderable
//! component of the tree in preorder. Around each draw call it saves the
//! canvas, applies the entity's transform chain from the outermost ancestor
//! down to the entity itself, and restores afterwards.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::ecs::manager::{failure_policy, handle_failure};
use crate::ecs::{ComponentHandle, Entity, System, Transform};
use crate::renderer::{Canvas, CommandBuffer};

fn default_canvas() -> Box<dyn Canvas> {
    Box::new(CommandBuffer::new())
}

/// Draws renderable components onto a [`Canvas`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Renderer {
    /// Viewport width in canvas units
    pub width: f32,
    /// Viewport height in canvas units
    pub height: f32,
    #[serde(skip, default = "default_canvas")]
    canvas: Box<dyn Canvas>,
    #[serde(skip)]
    dirty: bool,
    #[serde(skip)]
    renderables: Vec<ComponentHandle>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            canvas: default_canvas(),
            dirty: true,
            renderables: Vec::new(),
        }
    }
}

impl Renderer {
    /// Create a renderer drawing onto `canvas`
    #[must_use]
    pub fn with_canvas(canvas: impl Canvas + 'static) -> Self {
        Self {
            canvas: Box::new(canvas),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    #[must_use]
    pub fn canvas(&self) -> &dyn Canvas {
        self.canvas.as_ref()
    }

    pub fn canvas_mut(&mut self) -> &mut dyn Canvas {
        self.canvas.as_mut()
    }

    /// Components drawn in the last frame
    #[must_use]
    pub fn renderables(&self) -> &[ComponentHandle] {
        &self.renderables
    }

    fn update_component_lists(&mut self, root: &Entity) {
        if !self.dirty {
            return;
        }
        self.renderables.clear();
        for entity in std::iter::once(root.clone()).chain(root.grand_children()) {
            self.renderables.extend(
                entity
                    .components()
                    .iter()
                    .filter(|component| component.is_renderable() && component.is_enabled()),
            );
        }
        self.dirty = false;
    }

    fn render(&mut self, root: &Entity) -> Result<()> {
        let policy = failure_policy(root);
        self.canvas.clear();

        for component in &self.renderables {
            if !component.is_initialized() || !component.is_enabled() {
                continue;
            }
            let Ok(entity) = component.entity() else {
                continue;
            };

            self.canvas.save();
            for transform in Transform::chain(&entity).iter().rev() {
                let local = *transform.borrow();
                self.canvas.apply_transform(&local);
            }
            let result = component.render(self.canvas.as_mut());
            self.canvas.restore();

            if let Err(err) = result {
                handle_failure(policy, component, "render", err)?;
            }
        }
        Ok(())
    }
}

impl System for Renderer {
    fn init_root(&mut self, root: &Entity) -> Result<()> {
        log::debug!(
            "renderer bound to root `{}` ({}x{})",
            root.id(),
            self.width,
            self.height
        );
        self.dirty = true;
        Ok(())
    }

    fn update_root(&mut self, root: &Entity, _delta: f64) -> Result<()> {
        self.dirty = true;
        self.update_component_lists(root);
        self.render(root)
    }

    fn destruct_root(&mut self, _root: &Entity) {
        self.renderables.clear();
        self.dirty = true;
    }
}
