//! Vector shape component
//!
//! A shape draws a closed path described by a compact mini-language. The
//! path is a sequence of commands, each a lowercase letter followed by
//! space separated numbers:
//!
//! | command | arguments                  | meaning                  |
//! |---------|----------------------------|--------------------------|
//! | `m`     | `x y`                      | move to                  |
//! | `l`     | `x y`                      | line to                  |
//! | `b`     | `c1x c1y c2x c2y x y`      | cubic bezier to          |
//! | `a`     | `x1 y1 x2 y2 radius`       | arc through two tangents |
//! | `c`     | `cx cy x y`                | quadratic curve to       |
//!
//! Missing or malformed numbers read as `0`; unknown commands are skipped.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::ecs::{Component, ComponentContext, Renderable};
use crate::renderer::{Canvas, PathSegment, PathStyle};

/// Parse a path string into segments.
#[must_use]
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut rest = path.trim_start();
    while let Some(command) = rest.chars().next() {
        let args_end = rest[command.len_utf8()..]
            .find(|c: char| c.is_ascii_lowercase())
            .map_or(rest.len(), |i| i + command.len_utf8());
        let args: Vec<f32> = rest[command.len_utf8()..args_end]
            .split_whitespace()
            .map(|n| n.parse().unwrap_or(0.0))
            .collect();
        let arg = |i: usize| args.get(i).copied().unwrap_or(0.0);
        let point = |i: usize| Vec2::new(arg(i), arg(i + 1));

        let segment = match command {
            'm' => Some(PathSegment::MoveTo(point(0))),
            'l' => Some(PathSegment::LineTo(point(0))),
            'b' => Some(PathSegment::BezierTo {
                control1: point(0),
                control2: point(2),
                to: point(4),
            }),
            'a' => Some(PathSegment::ArcTo {
                from: point(0),
                to: point(2),
                radius: arg(4),
            }),
            'c' => Some(PathSegment::QuadraticTo {
                control: point(0),
                to: point(2),
            }),
            _ => None,
        };
        segments.extend(segment);
        rest = rest[args_end..].trim_start();
    }
    segments
}

/// A filled and/or stroked vector path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Shape {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Parsed form of `path`, keyed by the source it was parsed from
    #[serde(skip)]
    parsed: Option<(String, Vec<PathSegment>)>,
}

impl Shape {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_fill(mut self, color: impl Into<String>) -> Self {
        self.fill = Some(color.into());
        self
    }

    #[must_use]
    pub fn with_stroke(mut self, color: impl Into<String>, line_width: f32) -> Self {
        self.stroke = Some(color.into());
        self.line_width = Some(line_width);
        self
    }

    #[must_use]
    pub fn style(&self) -> PathStyle {
        PathStyle {
            fill: self.fill.clone(),
            stroke: self.stroke.clone(),
            line_width: self.line_width,
        }
    }

    /// Segments of the current path, reparsed when `path` changed.
    pub fn segments(&mut self) -> &[PathSegment] {
        let source = self.path.as_deref().unwrap_or_default();
        let stale = self
            .parsed
            .as_ref()
            .is_none_or(|(parsed_from, _)| parsed_from != source);
        if stale {
            self.parsed = Some((source.to_owned(), parse_path(source)));
        }
        self.parsed
            .as_ref()
            .map_or(&[], |(_, segments)| segments.as_slice())
    }
}

impl Component for Shape {
    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        Some(self)
    }
}

impl Renderable for Shape {
    fn render(&mut self, _ctx: &ComponentContext, canvas: &mut dyn Canvas) -> Result<()> {
        if self.path.is_none() {
            return Ok(());
        }
        let style = self.style();
        canvas.draw_path(self.segments(), &style);
        Ok(())
    }
}
