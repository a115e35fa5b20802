//! Developer Tooling: frame-time watchdog and profiling hooks.
//!
//! # Invariants
//! - Observation only. A slow frame is reported, never cancelled.

mod stats;
mod watchdog;

pub use stats::FrameStats;
pub use watchdog::{
    DEFAULT_SLOW_FRAME, FRAME_LOG_END, FRAME_LOG_START, FrameWatchdog, SlowFrame,
};

pub fn crate_info() -> &'static str {
    "blendlab-tools v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("tools"));
    }
}
