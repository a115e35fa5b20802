//! Shared value types for the blendlab workspace.
//!
//! Everything here is plain data: colors, resource handles, blend parameters
//! and draw counters. Behavior lives in `blendlab-render`.

mod blend;
mod metrics;
mod types;

pub use blend::{Blend, BlendParams, CompareFunction};
pub use metrics::DrawMetrics;
pub use types::{Color, RenderTargetId, TextureId, Viewport};

pub fn crate_info() -> &'static str {
    "blendlab-common v0.1.0"
}
