use serde::{Deserialize, Serialize};

use crate::Color;

/// Blend factor applied to a source or destination term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Blend {
    Zero,
    One,
    SourceAlpha,
    InverseSourceAlpha,
    /// The uniform blend factor color set alongside the blend state.
    BlendFactor,
    InverseBlendFactor,
}

/// Comparison used by the alpha test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareFunction {
    Always,
    Never,
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
    NotEqual,
}

impl CompareFunction {
    /// Whether a pixel with `value` passes against `reference`.
    pub fn passes(self, value: u8, reference: u8) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Less => value < reference,
            Self::LessEqual => value <= reference,
            Self::Equal => value == reference,
            Self::GreaterEqual => value >= reference,
            Self::Greater => value > reference,
            Self::NotEqual => value != reference,
        }
    }
}

/// Blend-state parameters applied to a backend.
///
/// Color and alpha channels each combine `src * source + dst * destination`.
/// `blend_factor` is the uniform color referenced by [`Blend::BlendFactor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendParams {
    pub color_src: Blend,
    pub color_dst: Blend,
    pub alpha_src: Blend,
    pub alpha_dst: Blend,
    pub blend_factor: Color,
}

impl BlendParams {
    /// Standard non-premultiplied alpha blending with a white blend factor.
    pub const ALPHA_BLEND: Self = Self {
        color_src: Blend::SourceAlpha,
        color_dst: Blend::InverseSourceAlpha,
        alpha_src: Blend::One,
        alpha_dst: Blend::InverseSourceAlpha,
        blend_factor: Color::WHITE,
    };

    /// Whether either channel reads the uniform blend factor.
    pub fn uses_blend_factor(&self) -> bool {
        [self.color_src, self.color_dst, self.alpha_src, self.alpha_dst]
            .iter()
            .any(|b| matches!(b, Blend::BlendFactor | Blend::InverseBlendFactor))
    }
}

impl Default for BlendParams {
    fn default() -> Self {
        Self::ALPHA_BLEND
    }
}
