//! Animated theme backdrops and the board render loop for the Quadra puzzle game.

pub mod board;
pub mod cache;
pub mod dom;
pub mod manager;
pub mod scenes;
pub mod settings;
pub mod theme;

#[cfg(target_arch = "wasm32")]
mod web;

pub use manager::ThemeManager;
pub use theme::{ThemeDefinition, ThemeError, ThemeId};
