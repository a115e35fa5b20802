use glam::{Mat4, Vec2};

use blendlab_assets::ContentLoader;
use blendlab_common::{
    Blend, BlendParams, Color, DrawMetrics, RenderTargetId, TextureId, Viewport,
};

use crate::backend::GraphicsBackend;
use crate::batch::{BatchMode, Sprite, SpriteBatcher};
use crate::effect::{AlphaTestEffect, screen_projection};
use crate::error::RenderError;

/// Blend/opacity state tracked by a [`RenderContext`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    /// Always in `[0, 1]`; out-of-range requests are stored as `1.0`.
    pub opacity: f32,
    /// Additive blending engaged.
    pub blending: bool,
    pub blend_rate: f32,
    pub render_target: Option<RenderTargetId>,
    pub transform: Mat4,
    /// Derived: fractional opacity or additive blending.
    pub alpha_test: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            blending: false,
            blend_rate: 1.0,
            render_target: None,
            transform: Mat4::IDENTITY,
            alpha_test: false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Stale {
    opacity: bool,
    blend: bool,
    target: bool,
}

impl Stale {
    fn all() -> Self {
        Self {
            opacity: true,
            blend: true,
            target: true,
        }
    }
}

/// Sits between draw calls and a sprite batcher and owns all blend,
/// opacity, render-target and transform state.
///
/// Every setter that changes state flushes the batch first, so draws
/// issued before the change are submitted under the old state. Setters
/// called with the current value do nothing (no flush, no device call)
/// unless [`RenderContext::invalidate`] was called since.
pub struct RenderContext<S: SpriteBatcher> {
    batch: S,
    state: RenderState,
    effect: AlphaTestEffect,
    stale: Stale,
}

impl<S: SpriteBatcher> RenderContext<S> {
    /// Wrap a batcher and put its device into standard alpha blending.
    pub fn new(mut batch: S) -> Self {
        let viewport = batch.backend().viewport();
        batch.backend_mut().set_blend_state(&BlendParams::ALPHA_BLEND);
        let render_target = batch.backend().render_target();
        Self {
            batch,
            state: RenderState {
                render_target,
                ..RenderState::default()
            },
            effect: AlphaTestEffect::new(viewport),
            stale: Stale::default(),
        }
    }

    /// Alpha values at or below `reference` are discarded while the alpha
    /// test is engaged.
    pub fn with_alpha_reference(mut self, reference: u8) -> Self {
        self.effect = self.effect.with_reference_alpha(reference);
        self
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn effect(&self) -> &AlphaTestEffect {
        &self.effect
    }

    pub fn batch(&self) -> &S {
        &self.batch
    }

    pub fn batch_mut(&mut self) -> &mut S {
        &mut self.batch
    }

    pub fn backend(&self) -> &S::Backend {
        self.batch.backend()
    }

    pub fn backend_mut(&mut self) -> &mut S::Backend {
        self.batch.backend_mut()
    }

    pub fn into_batch(self) -> S {
        self.batch
    }

    /// Set opacity for subsequent draws.
    ///
    /// Values `>= 1`, `< 0` and NaN all mean fully opaque. Fractional values
    /// drive the blend factor and engage the alpha test.
    pub fn set_opacity(&mut self, value: f32) -> Result<(), RenderError> {
        let opacity = normalize_opacity(value);
        if opacity == self.state.opacity && !self.stale.opacity {
            return Ok(());
        }

        self.batch.flush()?;
        self.state.opacity = opacity;
        self.stale.opacity = false;
        self.sync_alpha_test();
        let params = opacity_params(self.batch.backend().blend_state(), opacity);
        self.batch.backend_mut().set_blend_state(&params);
        tracing::trace!(opacity, "opacity applied");

        self.batch.flush()
    }

    /// Engage or release additive blending at `rate` (clamped to `[0, 1]`).
    ///
    /// An active batch is ended and restarted around the change: additive
    /// mode restarts with [`BatchMode::DoNotSaveState`] so the additive
    /// parameters survive, leaving it restarts with [`BatchMode::AlphaBlend`].
    /// The tracked render target is bound again afterwards because ending a
    /// state-saving batch restores whatever target it began with.
    pub fn set_blend(&mut self, enabled: bool, rate: f32) -> Result<(), RenderError> {
        if enabled == self.state.blending && !self.stale.blend {
            return Ok(());
        }

        let rate = if rate.is_nan() { 1.0 } else { rate.clamp(0.0, 1.0) };
        self.batch.flush()?;
        let active = self.batch.is_active();
        if active {
            self.batch.end()?;
        }

        self.state.blending = enabled;
        self.state.blend_rate = if enabled { rate } else { 1.0 };
        self.stale.blend = false;

        if enabled {
            if active {
                self.batch.begin(BatchMode::DoNotSaveState)?;
            }
            let params = additive_params(self.batch.backend().blend_state(), rate);
            self.batch.backend_mut().set_blend_state(&params);
        } else {
            let params = opacity_params(BlendParams::ALPHA_BLEND, self.state.opacity);
            self.batch.backend_mut().set_blend_state(&params);
            if active {
                self.batch.begin(BatchMode::AlphaBlend)?;
                if self.state.opacity < 1.0 {
                    self.batch.backend_mut().set_blend_state(&params);
                }
            }
        }
        self.sync_alpha_test();
        self.batch
            .backend_mut()
            .set_render_target(self.state.render_target);
        tracing::trace!(enabled, rate, "blend mode applied");
        Ok(())
    }

    /// Direct subsequent draws to `target` (`None` for the back buffer).
    pub fn set_render_target(
        &mut self,
        target: Option<RenderTargetId>,
    ) -> Result<(), RenderError> {
        if target == self.state.render_target && !self.stale.target {
            return Ok(());
        }

        self.batch.flush()?;
        self.state.render_target = target;
        self.stale.target = false;
        self.batch.backend_mut().set_render_target(target);
        self.refresh_projection();
        Ok(())
    }

    /// Replace the sprite transform. Also becomes the alpha-test view matrix.
    pub fn set_transform(&mut self, transform: Mat4) -> Result<(), RenderError> {
        self.batch.flush()?;
        self.state.transform = transform;
        self.effect.view = transform;
        self.batch.set_transform(transform);
        if self.state.alpha_test {
            self.batch.set_custom_effect(Some(self.effect));
        }
        Ok(())
    }

    /// Forget that the device matches the tracked state, so the next call
    /// to each setter applies even when the value is unchanged. Call after
    /// anything outside this context touched the device.
    pub fn invalidate(&mut self) {
        self.stale = Stale::all();
    }

    pub fn clear(&mut self, color: Color) {
        self.batch.backend_mut().clear(color);
    }

    /// Begin a batch. An `AlphaBlend` begin resets the device to standard
    /// alpha blending, so the tracked opacity or additive parameters are
    /// applied again on top of it.
    pub fn begin(&mut self, mode: BatchMode) -> Result<(), RenderError> {
        self.batch.begin(mode)?;
        self.refresh_projection();
        if mode == BatchMode::AlphaBlend {
            self.resync_device();
        }
        Ok(())
    }

    pub fn draw(
        &mut self,
        texture: TextureId,
        position: Vec2,
        tint: Color,
    ) -> Result<(), RenderError> {
        self.batch.draw(Sprite::new(texture, position, tint))
    }

    /// End the batch. A state-saving batch restores the device state it
    /// began with; the tracked state is bound again afterwards.
    pub fn end(&mut self) -> Result<(), RenderError> {
        let ended = self.batch.end();
        self.resync_device();
        ended
    }

    /// Load a named texture through `content` and upload it.
    pub fn load_texture(
        &mut self,
        content: &mut ContentLoader,
        name: &str,
    ) -> Result<TextureId, RenderError> {
        let data = content.load_texture(name)?;
        let id = self.batch.backend_mut().create_texture(&data)?;
        tracing::debug!(name, ?id, "texture uploaded");
        Ok(id)
    }

    pub fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<RenderTargetId, RenderError> {
        self.batch.backend_mut().create_render_target(width, height)
    }

    pub fn viewport(&self) -> Viewport {
        self.batch.backend().viewport()
    }

    pub fn metrics(&self) -> DrawMetrics {
        self.batch.backend().metrics()
    }

    /// Bind the tracked blend parameters and render target wherever the
    /// device disagrees with them.
    fn resync_device(&mut self) {
        let current = self.batch.backend().blend_state();
        let params = if self.state.blending {
            additive_params(current, self.state.blend_rate)
        } else {
            opacity_params(BlendParams::ALPHA_BLEND, self.state.opacity)
        };
        if current != params {
            self.batch.backend_mut().set_blend_state(&params);
        }
        if self.batch.backend().render_target() != self.state.render_target {
            self.batch
                .backend_mut()
                .set_render_target(self.state.render_target);
        }
        self.refresh_projection();
    }

    /// Match the effect's projection to the bound target's size.
    fn refresh_projection(&mut self) {
        let projection = screen_projection(self.batch.backend().viewport());
        if self.effect.projection == projection {
            return;
        }
        self.effect.projection = projection;
        if self.state.alpha_test {
            self.batch.set_custom_effect(Some(self.effect));
        }
    }

    fn sync_alpha_test(&mut self) {
        let enabled = self.state.opacity < 1.0 || self.state.blending;
        self.state.alpha_test = enabled;
        self.batch.set_custom_effect(enabled.then_some(self.effect));
    }
}

fn normalize_opacity(value: f32) -> f32 {
    if (0.0..1.0).contains(&value) {
        value
    } else {
        1.0
    }
}

/// Additive blending at `rate`, keeping the alpha factors of `base`.
fn additive_params(base: BlendParams, rate: f32) -> BlendParams {
    BlendParams {
        color_src: Blend::BlendFactor,
        color_dst: Blend::One,
        blend_factor: Color::from_unit(rate),
        ..base
    }
}

/// Blend parameters for `opacity`, keeping the alpha destination of `base`.
fn opacity_params(base: BlendParams, opacity: f32) -> BlendParams {
    if opacity >= 1.0 {
        BlendParams {
            color_src: Blend::SourceAlpha,
            color_dst: Blend::InverseSourceAlpha,
            alpha_src: Blend::One,
            blend_factor: Color::WHITE,
            ..base
        }
    } else {
        BlendParams {
            color_src: Blend::BlendFactor,
            color_dst: Blend::InverseBlendFactor,
            alpha_src: Blend::SourceAlpha,
            blend_factor: Color::from_unit(opacity),
            ..base
        }
    }
}
