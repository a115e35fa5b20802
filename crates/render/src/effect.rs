use glam::Mat4;

use blendlab_common::{CompareFunction, Viewport};

/// Alpha-test effect: discards pixels whose alpha fails the comparison
/// against `reference_alpha`. With the default `Greater`/0, fully
/// transparent pixels are dropped so fractional opacity doesn't smear
/// the blend factor over empty texels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaTestEffect {
    pub alpha_function: CompareFunction,
    pub reference_alpha: u8,
    pub vertex_color_enabled: bool,
    pub projection: Mat4,
    pub view: Mat4,
}

impl AlphaTestEffect {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            alpha_function: CompareFunction::Greater,
            reference_alpha: 0,
            vertex_color_enabled: true,
            projection: screen_projection(viewport),
            view: Mat4::IDENTITY,
        }
    }

    pub fn with_reference_alpha(mut self, reference_alpha: u8) -> Self {
        self.reference_alpha = reference_alpha;
        self
    }

    /// Whether a pixel of the given alpha survives the test.
    pub fn keeps(&self, alpha: u8) -> bool {
        self.alpha_function.passes(alpha, self.reference_alpha)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Orthographic projection with (0,0) at the top-left and y growing down.
pub fn screen_projection(viewport: Viewport) -> Mat4 {
    Mat4::orthographic_rh(
        0.0,
        viewport.width as f32,
        viewport.height as f32,
        0.0,
        -1.0,
        1.0,
    )
}
