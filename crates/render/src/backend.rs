use glam::Mat4;

use blendlab_assets::TextureData;
use blendlab_common::{BlendParams, Color, DrawMetrics, RenderTargetId, TextureId, Viewport};

use crate::batch::Sprite;
use crate::effect::AlphaTestEffect;
use crate::error::RenderError;

/// A run of buffered sprites handed to the backend by a flush.
///
/// The backend draws them with its *current* blend state and render
/// target, in slice order.
#[derive(Debug, Clone, Copy)]
pub struct SpriteSubmission<'a> {
    pub sprites: &'a [Sprite],
    pub transform: Mat4,
    /// Alpha-test effect in force for this run, if any.
    pub effect: Option<&'a AlphaTestEffect>,
}

/// GPU device/context handle. All renderers implement this trait.
///
/// Device-level state (blend parameters, bound target) is owned here;
/// batching and flush ordering are the batcher's concern.
pub trait GraphicsBackend {
    /// Clear the bound target.
    fn clear(&mut self, color: Color);

    /// Bind an offscreen target, or the back buffer for `None`.
    fn set_render_target(&mut self, target: Option<RenderTargetId>);

    fn render_target(&self) -> Option<RenderTargetId>;

    fn set_blend_state(&mut self, params: &BlendParams);

    fn blend_state(&self) -> BlendParams;

    /// Size of the bound target.
    fn viewport(&self) -> Viewport;

    fn metrics(&self) -> DrawMetrics;

    fn reset_metrics(&mut self);

    /// Upload decoded pixels and return a handle for drawing.
    fn create_texture(&mut self, texture: &TextureData) -> Result<TextureId, RenderError>;

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<RenderTargetId, RenderError>;

    /// Draw a flushed run of sprites.
    fn submit(&mut self, submission: &SpriteSubmission<'_>) -> Result<(), RenderError>;
}
