//! Input handling module
//!
//! Key and pointer state exposed to components as the [`InputManager`]
//! system.

mod state;

pub use state::InputManager;
