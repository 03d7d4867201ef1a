//! Keyboard and pointer state

use glam::Vec2;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::ecs::{Entity, System};

/// Tracks which keys are held, keyed by name (`"ArrowLeft"`, `"a"`, ...).
///
/// The host feeds raw events through [`press`](Self::press),
/// [`release`](Self::release) and [`move_pointer`](Self::move_pointer).
/// Edge sets hold what happened since the previous frame and are cleared
/// when this system's own update runs, so register it ahead of the systems
/// that read them.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputManager {
    #[serde(skip)]
    pressed_keys: FxHashSet<String>,
    #[serde(skip)]
    just_pressed_keys: FxHashSet<String>,
    #[serde(skip)]
    just_released_keys: FxHashSet<String>,
    #[serde(skip)]
    pointer: Vec2,
}

impl InputManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key going down. Auto-repeat does not count as a new press.
    pub fn press(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !self.pressed_keys.contains(&key) {
            self.just_pressed_keys.insert(key.clone());
        }
        self.pressed_keys.insert(key);
    }

    pub fn release(&mut self, key: &str) {
        if self.pressed_keys.remove(key) {
            self.just_released_keys.insert(key.to_owned());
        }
    }

    pub fn move_pointer(&mut self, position: Vec2) {
        self.pointer = position;
    }

    #[must_use]
    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }

    #[must_use]
    pub fn is_key_just_pressed(&self, key: &str) -> bool {
        self.just_pressed_keys.contains(key)
    }

    #[must_use]
    pub fn is_key_just_released(&self, key: &str) -> bool {
        self.just_released_keys.contains(key)
    }

    /// Currently held keys, sorted
    #[must_use]
    pub fn pressed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.pressed_keys.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    #[must_use]
    pub fn pointer(&self) -> Vec2 {
        self.pointer
    }

    /// Forget all held keys and pending edges.
    pub fn reset(&mut self) {
        self.pressed_keys.clear();
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
        self.pointer = Vec2::ZERO;
    }
}

impl System for InputManager {
    fn init_root(&mut self, root: &Entity) -> Result<()> {
        log::debug!("input manager bound to root `{}`", root.id());
        self.reset();
        Ok(())
    }

    fn update_root(&mut self, _root: &Entity, _delta: f64) -> Result<()> {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
        Ok(())
    }

    fn destruct_root(&mut self, _root: &Entity) {
        self.reset();
    }
}
