use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use blendlab_common::Color;
use blendlab_render::DeviceConfig;

/// Errors from loading configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Parameters of the sprite-storm scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Content name of the sprite texture.
    pub texture: String,
    /// Sprites drawn per frame on top of the background sprite.
    pub sprite_count: usize,
    /// Fixed RNG seed. `None` seeds from entropy.
    pub seed: Option<u64>,
    pub fractional_opacity: f32,
    pub additive_rate: f32,
    pub background: Color,
    /// Alpha values at or below this are discarded under the alpha test.
    pub alpha_reference: u8,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            texture: "test".into(),
            sprite_count: 500,
            seed: None,
            fractional_opacity: 0.3,
            additive_rate: 0.7,
            background: Color::CORNFLOWER_BLUE,
            alpha_reference: 0,
        }
    }
}

/// Top-level application configuration, readable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub scene: SceneConfig,
    pub content_root: PathBuf,
    /// Draw time, in milliseconds, above which a frame is logged.
    pub slow_frame_ms: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            scene: SceneConfig::default(),
            content_root: PathBuf::from("Content"),
            slow_frame_ms: 10.0,
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Negative values clamp to zero; values too large for a `Duration`
    /// fall back to the default threshold.
    pub fn slow_frame_threshold(&self) -> Duration {
        Duration::try_from_secs_f64(self.slow_frame_ms.max(0.0) / 1000.0)
            .unwrap_or(blendlab_tools::DEFAULT_SLOW_FRAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.scene.sprite_count, 500);
        assert_eq!(cfg.scene.texture, "test");
        assert_eq!(cfg.scene.background, Color::CORNFLOWER_BLUE);
        assert_eq!(cfg.device.width, 1024);
        assert_eq!(cfg.slow_frame_threshold(), Duration::from_millis(10));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blendlab.json");
        std::fs::write(
            &path,
            r#"{ "scene": { "seed": 42, "sprite_count": 10 }, "device": { "width": 640 } }"#,
        )
        .unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.scene.seed, Some(42));
        assert_eq!(cfg.scene.sprite_count, 10);
        assert_eq!(cfg.scene.additive_rate, 0.7);
        assert_eq!(cfg.device.width, 640);
        assert_eq!(cfg.device.height, 768);
        assert_eq!(cfg.content_root, PathBuf::from("Content"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AppConfig::load("/nonexistent/blendlab.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load(&path).unwrap_err(),
            ConfigError::Json { .. }
        ));
    }

    #[test]
    fn negative_threshold_clamps() {
        let cfg = AppConfig {
            slow_frame_ms: -5.0,
            ..AppConfig::default()
        };
        assert_eq!(cfg.slow_frame_threshold(), Duration::ZERO);
    }

    #[test]
    fn oversized_threshold_falls_back_to_default() {
        for slow_frame_ms in [1e300, f64::INFINITY] {
            let cfg = AppConfig {
                slow_frame_ms,
                ..AppConfig::default()
            };
            assert_eq!(
                cfg.slow_frame_threshold(),
                blendlab_tools::DEFAULT_SLOW_FRAME
            );
        }
    }

    #[test]
    fn device_section_lists_only_known_fields() {
        let value = serde_json::to_value(AppConfig::default()).unwrap();
        let mut keys: Vec<_> = value["device"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        keys.sort();
        assert_eq!(keys, ["fullscreen", "height", "vsync", "width"]);
    }
}
