use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Local};

use blendlab_common::DrawMetrics;

use crate::stats::FrameStats;

/// Frames that take longer than this to draw are logged.
pub const DEFAULT_SLOW_FRAME: Duration = Duration::from_millis(10);

pub const FRAME_LOG_START: &str = "====FrameLogStart====";
pub const FRAME_LOG_END: &str = "====FrameLogEnd====";

/// One frame that exceeded the watchdog threshold.
#[derive(Debug, Clone)]
pub struct SlowFrame {
    pub timestamp: DateTime<Local>,
    pub duration: Duration,
    /// Backend counters captured right after the frame was drawn.
    pub metrics: DrawMetrics,
}

impl SlowFrame {
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_nanos() as f64 / 1_000_000.0
    }

    /// Write the four-line diagnostic block.
    pub fn write_block<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{FRAME_LOG_START}")?;
        writeln!(
            out,
            "{} - Slow update: {}",
            self.timestamp.format("%-I:%M:%S %p"),
            self.duration_ms()
        )?;
        writeln!(out, "Metrics: {}", self.metrics)?;
        writeln!(out, "{FRAME_LOG_END}")
    }
}

/// Measures draw durations against a threshold.
#[derive(Debug, Clone)]
pub struct FrameWatchdog {
    threshold: Duration,
    stats: FrameStats,
}

impl Default for FrameWatchdog {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_FRAME)
    }
}

impl FrameWatchdog {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            stats: FrameStats::default(),
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Record a frame. Returns a report when `duration` strictly exceeds the
    /// threshold; `metrics` is only evaluated in that case.
    pub fn observe(
        &mut self,
        duration: Duration,
        metrics: impl FnOnce() -> DrawMetrics,
    ) -> Option<SlowFrame> {
        let slow = duration > self.threshold;
        self.stats.record(duration, slow);
        if !slow {
            return None;
        }

        let report = SlowFrame {
            timestamp: Local::now(),
            duration,
            metrics: metrics(),
        };
        tracing::warn!(
            duration_ms = report.duration_ms(),
            threshold_ms = self.threshold.as_secs_f64() * 1000.0,
            draws = report.metrics.draw_count,
            sprites = report.metrics.sprite_count,
            "slow frame"
        );
        Some(report)
    }
}
