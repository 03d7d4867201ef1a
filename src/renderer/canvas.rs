//! Drawing context abstraction
//!
//! [`Canvas`] is the immediate-mode 2D surface renderable components draw
//! on. It keeps a transform stack with `save`/`restore` semantics. The crate
//! ships [`CommandBuffer`], a headless backend that records every draw call
//! together with the transform current at the time.

use std::fmt;

use glam::{Affine2, Vec2};
use smallvec::SmallVec;

use crate::ecs::Transform;

/// One segment of a 2D path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Vec2),
    LineTo(Vec2),
    BezierTo { control1: Vec2, control2: Vec2, to: Vec2 },
    ArcTo { from: Vec2, to: Vec2, radius: f32 },
    QuadraticTo { control: Vec2, to: Vec2 },
}

/// Fill and stroke applied to a path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathStyle {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub line_width: Option<f32>,
}

/// A 2D drawing surface with a transform stack
pub trait Canvas: fmt::Debug {
    /// Start a new frame
    fn clear(&mut self);

    /// Push the current transform
    fn save(&mut self);

    /// Pop the transform pushed by the matching `save`
    fn restore(&mut self);

    fn translate(&mut self, offset: Vec2);

    fn rotate(&mut self, radians: f32);

    fn scale(&mut self, factor: Vec2);

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: &str);

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: &str);

    /// Draw a closed path
    fn draw_path(&mut self, segments: &[PathSegment], style: &PathStyle);

    /// Apply a [`Transform`]: translate, rotate around the pivot, scale.
    fn apply_transform(&mut self, transform: &Transform) {
        self.translate(transform.position);
        self.translate(transform.pivot);
        self.rotate(transform.rotation.to_radians());
        self.translate(-transform.pivot);
        self.scale(transform.scale);
    }

    /// The recording backend, if this canvas is one
    fn as_command_buffer(&self) -> Option<&CommandBuffer> {
        None
    }
}

/// A recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect {
        origin: Vec2,
        size: Vec2,
        color: String,
        transform: Affine2,
    },
    FillCircle {
        center: Vec2,
        radius: f32,
        color: String,
        transform: Affine2,
    },
    Path {
        segments: Vec<PathSegment>,
        style: PathStyle,
        transform: Affine2,
    },
}

impl DrawCommand {
    /// Transform in effect when the command was recorded
    #[must_use]
    pub fn transform(&self) -> Affine2 {
        match self {
            Self::FillRect { transform, .. }
            | Self::FillCircle { transform, .. }
            | Self::Path { transform, .. } => *transform,
        }
    }
}

/// Headless canvas recording draw calls
#[derive(Debug, Clone)]
pub struct CommandBuffer {
    commands: Vec<DrawCommand>,
    current: Affine2,
    stack: SmallVec<[Affine2; 8]>,
    frames: u64,
}

impl CommandBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            current: Affine2::IDENTITY,
            stack: SmallVec::new(),
            frames: 0,
        }
    }

    /// Commands recorded since the last `clear`
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Current transform
    #[must_use]
    pub fn transform(&self) -> Affine2 {
        self.current
    }

    /// Number of unmatched `save` calls
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of `clear` calls, i.e. frames started
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas for CommandBuffer {
    fn as_command_buffer(&self) -> Option<&CommandBuffer> {
        Some(self)
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.frames += 1;
    }

    fn save(&mut self) {
        self.stack.push(self.current);
    }

    fn restore(&mut self) {
        match self.stack.pop() {
            Some(transform) => self.current = transform,
            None => log::warn!("canvas restore() without matching save()"),
        }
    }

    fn translate(&mut self, offset: Vec2) {
        self.current = self.current * Affine2::from_translation(offset);
    }

    fn rotate(&mut self, radians: f32) {
        self.current = self.current * Affine2::from_angle(radians);
    }

    fn scale(&mut self, factor: Vec2) {
        self.current = self.current * Affine2::from_scale(factor);
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: &str) {
        self.commands.push(DrawCommand::FillRect {
            origin,
            size,
            color: color.to_owned(),
            transform: self.current,
        });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: &str) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            color: color.to_owned(),
            transform: self.current,
        });
    }

    fn draw_path(&mut self, segments: &[PathSegment], style: &PathStyle) {
        self.commands.push(DrawCommand::Path {
            segments: segments.to_vec(),
            style: style.clone(),
            transform: self.current,
        });
    }
}
