use std::time::Duration;

/// Running draw-time statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub frames: u64,
    pub slow_frames: u64,
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    pub last: Option<Duration>,
}

impl FrameStats {
    pub fn record(&mut self, duration: Duration, slow: bool) {
        self.frames += 1;
        if slow {
            self.slow_frames += 1;
        }
        self.total += duration;
        self.min = Some(self.min.map_or(duration, |m| m.min(duration)));
        self.max = Some(self.max.map_or(duration, |m| m.max(duration)));
        self.last = Some(duration);
    }

    pub fn mean(&self) -> Option<Duration> {
        (self.frames > 0).then(|| self.total / self.frames as u32)
    }
}

impl std::fmt::Display for FrameStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ms = |d: Option<Duration>| d.map_or(0.0, |d| d.as_secs_f64() * 1000.0);
        write!(
            f,
            "frames={} slow={} mean={:.3}ms min={:.3}ms max={:.3}ms",
            self.frames,
            self.slow_frames,
            ms(self.mean()),
            ms(self.min),
            ms(self.max),
        )
    }
}
