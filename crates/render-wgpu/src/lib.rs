//! wgpu backend for the sprite batcher.
//!
//! Each submission is one render pass that loads the bound target, so
//! draw order across flushes is exactly submission order.
//!
//! # Invariants
//! - One pipeline per distinct set of blend factors, built on first use.
//! - The blend-factor color is a per-pass constant, not pipeline state.
//! - Alpha testing is a uniform flag; toggling it never rebuilds pipelines.

mod gpu;
mod shaders;

pub use gpu::WgpuBackend;
