//! Rendering Adapter: renderer-agnostic sprite batching.
//!
//! Draw calls flow `RenderContext` -> `SpriteBatcher` -> `GraphicsBackend`.
//!
//! # Invariants
//! - Every GPU state change (blend parameters, render target, transform)
//!   made through `RenderContext` is preceded by a batch flush, so buffered
//!   draws never pick up state set after they were issued.
//! - The alpha-test effect is toggled only as a consequence of opacity or
//!   blend-mode changes, never directly by callers.
//!
//! `RecordingBackend` implements the backend trait without a GPU; the wgpu
//! implementation lives in `blendlab-render-wgpu`.

mod backend;
mod batch;
mod config;
mod context;
mod effect;
mod error;
mod recording;

pub use backend::{GraphicsBackend, SpriteSubmission};
pub use batch::{BatchMode, BatchStats, Sprite, SpriteBatch, SpriteBatcher, texture_runs};
pub use config::DeviceConfig;
pub use context::{RenderContext, RenderState};
pub use effect::{AlphaTestEffect, screen_projection};
pub use error::RenderError;
pub use recording::{BackendCommand, RecordingBackend, SubmitRecord};

pub fn crate_info() -> &'static str {
    "blendlab-render v0.1.0"
}
