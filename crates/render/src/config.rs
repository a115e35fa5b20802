use serde::{Deserialize, Serialize};

use blendlab_common::Viewport;

/// Device settings, passed once at device creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Back buffer width in pixels.
    pub width: u32,
    /// Back buffer height in pixels.
    pub height: u32,
    pub fullscreen: bool,
    /// Present on vertical blank. Off by default so slow frames show up
    /// in the frame log instead of being hidden by the swap interval.
    pub vsync: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            fullscreen: false,
            vsync: false,
        }
    }
}

impl DeviceConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width.max(1), self.height.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_back_buffer() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.viewport(), Viewport::new(1024, 768));
        assert!(!cfg.vsync);
    }

    #[test]
    fn zero_size_clamps_viewport() {
        let cfg = DeviceConfig {
            width: 0,
            height: 0,
            ..DeviceConfig::default()
        };
        assert_eq!(cfg.viewport(), Viewport::new(1, 1));
    }
}
