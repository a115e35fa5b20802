use serde::{Deserialize, Serialize};

/// 8-bit RGBA color, the unit of tints, clear colors and blend factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const RED: Self = Self::new(255, 0, 0, 255);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const CORNFLOWER_BLUE: Self = Self::new(100, 149, 237, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Same value on all four channels.
    pub const fn splat(v: u8) -> Self {
        Self::new(v, v, v, v)
    }

    /// Scale a unit value to a byte on all four channels. Truncates, and
    /// saturates outside [0, 1].
    pub fn from_unit(v: f32) -> Self {
        Self::splat((255.0 * v) as u8)
    }

    /// Normalized channels in `[r, g, b, a]` order.
    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Handle to a texture created on a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureId(pub u32);

/// Handle to an offscreen render target created on a backend.
/// `None` in an `Option<RenderTargetId>` means the back buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderTargetId(pub u32);

/// Size of the surface draws are directed to, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}
