//! Content loading: resolves texture names under a content root.
//!
//! Textures are requested by name without extension, the way the demo asks
//! for `"test"`. Decoded pixel data is cached by name and identified by a
//! content hash, so two names pointing at identical files share an id.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File extensions tried, in order, when resolving a texture name.
pub const TEXTURE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Content-addressed asset ID computed from the decoded pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub u64);

/// Decoded RGBA8 texture, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub id: AssetId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Build a texture from raw RGBA8 pixels.
    pub fn from_rgba(
        name: impl Into<String>,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<Self, AssetError> {
        let name = name.into();
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(AssetError::PixelSize {
                name,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            id: content_hash(width, height, &pixels),
            name,
            width,
            height,
            pixels,
        })
    }

    /// A single-color texture.
    pub fn solid(name: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect::<Vec<_>>();
        Self {
            id: content_hash(width, height, &pixels),
            name: name.into(),
            width,
            height,
            pixels,
        }
    }
}

/// Errors from asset operations. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("texture {name:?} not found under {root}")]
    NotFound { name: String, root: PathBuf },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture {name:?} has {actual} bytes of pixel data, expected {expected}")]
    PixelSize {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Loads textures by name from a content root directory.
#[derive(Debug, Clone)]
pub struct ContentLoader {
    root: PathBuf,
    cache: BTreeMap<String, Arc<TextureData>>,
}

impl ContentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of textures currently cached.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Find the file backing `name`, trying each known extension.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, AssetError> {
        let direct = self.root.join(name);
        if direct.extension().is_some() && direct.is_file() {
            return Ok(direct);
        }
        TEXTURE_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .find(|p| p.is_file())
            .ok_or_else(|| AssetError::NotFound {
                name: name.to_string(),
                root: self.root.clone(),
            })
    }

    /// Load and decode a texture, returning the cached copy on repeat calls.
    pub fn load_texture(&mut self, name: &str) -> Result<Arc<TextureData>, AssetError> {
        if let Some(tex) = self.cache.get(name) {
            return Ok(Arc::clone(tex));
        }

        let path = self.resolve(name)?;
        let bytes = std::fs::read(&path)?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|source| AssetError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        let tex = Arc::new(TextureData::from_rgba(
            name,
            width,
            height,
            decoded.into_raw(),
        )?);

        tracing::debug!(name, width, height, path = %path.display(), "texture loaded");
        self.cache.insert(name.to_string(), Arc::clone(&tex));
        Ok(tex)
    }

    /// Drop every cached texture.
    pub fn unload(&mut self) {
        self.cache.clear();
    }
}

fn content_hash(width: u32, height: u32, pixels: &[u8]) -> AssetId {
    let mut hasher = Sha256::new();
    hasher.update(width.to_le_bytes());
    hasher.update(height.to_le_bytes());
    hasher.update(pixels);
    let result = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&result[..8]);
    AssetId(u64::from_le_bytes(bytes))
}

pub fn crate_info() -> &'static str {
    "blendlab-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, file: &str, w: u32, h: u32) {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
        img.save(dir.join(file)).unwrap();
    }

    #[test]
    fn load_by_bare_name() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "test.png", 4, 2);

        let mut loader = ContentLoader::new(dir.path());
        let tex = loader.load_texture("test").unwrap();
        assert_eq!((tex.width, tex.height), (4, 2));
        assert_eq!(tex.pixels.len(), 4 * 2 * 4);
        assert_eq!(&tex.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn repeat_load_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "test.png", 2, 2);

        let mut loader = ContentLoader::new(dir.path());
        let a = loader.load_texture("test").unwrap();
        let b = loader.load_texture("test").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.len(), 1);
    }

    #[test]
    fn identical_content_shares_id() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 3, 3);
        write_png(dir.path(), "b.png", 3, 3);

        let mut loader = ContentLoader::new(dir.path());
        let a = loader.load_texture("a").unwrap();
        let b = loader.load_texture("b").unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn missing_texture_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = ContentLoader::new(dir.path());
        let err = loader.load_texture("missing").unwrap_err();
        assert!(matches!(err, AssetError::NotFound { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not a png").unwrap();
        let mut loader = ContentLoader::new(dir.path());
        let err = loader.load_texture("bad").unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }

    #[test]
    fn from_rgba_checks_size() {
        let err = TextureData::from_rgba("t", 2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            AssetError::PixelSize {
                expected: 16,
                actual: 15,
                ..
            }
        ));
    }

    #[test]
    fn solid_fills_every_pixel() {
        let tex = TextureData::solid("s", 2, 3, [1, 2, 3, 4]);
        assert_eq!(tex.pixels.len(), 24);
        assert!(tex.pixels.chunks(4).all(|p| p == [1, 2, 3, 4]));
    }

    #[test]
    fn unload_clears_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "test.png", 1, 1);
        let mut loader = ContentLoader::new(dir.path());
        loader.load_texture("test").unwrap();
        loader.unload();
        assert!(loader.is_empty());
    }
}
