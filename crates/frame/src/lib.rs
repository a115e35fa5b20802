//! Frame Driver: per-tick update/draw over a [`RenderContext`], with the
//! draw call timed against the slow-frame watchdog.
//!
//! # Invariants
//! - Single-threaded. Update then draw, no suspension points.
//! - The driver owns the render context, and through it the batcher and
//!   backend, for the whole run.
//!
//! [`RenderContext`]: blendlab_render::RenderContext

pub mod config;
pub mod driver;
pub mod scene;

pub use config::{AppConfig, ConfigError, SceneConfig};
pub use driver::{Flow, FrameDriver, FrameError, FrameTime, Game, InjectedDelay, UpdateContext};
pub use scene::SpriteStorm;

pub fn crate_info() -> &'static str {
    "blendlab-frame v0.1.0"
}
