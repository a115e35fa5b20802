use std::ops::Range;

use glam::{Mat4, Vec2};

use blendlab_common::{BlendParams, Color, RenderTargetId, TextureId};

use crate::backend::{GraphicsBackend, SpriteSubmission};
use crate::effect::AlphaTestEffect;
use crate::error::RenderError;

/// One buffered draw request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub texture: TextureId,
    /// Top-left corner in pixels, before the batch transform.
    pub position: Vec2,
    pub tint: Color,
}

impl Sprite {
    pub fn new(texture: TextureId, position: Vec2, tint: Color) -> Self {
        Self {
            texture,
            position,
            tint,
        }
    }
}

/// How a batch treats device state around `begin`/`end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Capture the device's blend state and render target at `begin`, switch
    /// to standard alpha blending, and restore the captured state at `end`.
    AlphaBlend,
    /// Leave device state untouched at both ends. Whatever the caller sets
    /// after `begin` stays in force.
    DoNotSaveState,
}

/// Lifetime counters of a batcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub begins: u64,
    pub ends: u64,
    /// Every `flush` call, including the implicit one in `end`.
    pub flushes: u64,
    /// Flushes that actually handed sprites to the backend.
    pub submissions: u64,
    pub draws: u64,
}

/// Sprite batcher: buffers draws and submits them in order on flush.
pub trait SpriteBatcher {
    type Backend: GraphicsBackend;

    fn backend(&self) -> &Self::Backend;

    fn backend_mut(&mut self) -> &mut Self::Backend;

    fn is_active(&self) -> bool;

    fn begin(&mut self, mode: BatchMode) -> Result<(), RenderError>;

    fn draw(&mut self, sprite: Sprite) -> Result<(), RenderError>;

    /// Submit buffered draws now. A no-op with nothing buffered.
    fn flush(&mut self) -> Result<(), RenderError>;

    fn end(&mut self) -> Result<(), RenderError>;

    /// Transform applied to sprites submitted from now on.
    fn set_transform(&mut self, transform: Mat4);

    fn set_custom_effect(&mut self, effect: Option<AlphaTestEffect>);

    fn stats(&self) -> BatchStats;
}

struct SavedState {
    blend: BlendParams,
    target: Option<RenderTargetId>,
}

/// The default batcher: owns its backend for the process lifetime.
pub struct SpriteBatch<B: GraphicsBackend> {
    backend: B,
    pending: Vec<Sprite>,
    mode: Option<BatchMode>,
    saved: Option<SavedState>,
    transform: Mat4,
    effect: Option<AlphaTestEffect>,
    stats: BatchStats,
}

impl<B: GraphicsBackend> SpriteBatch<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            pending: Vec::with_capacity(256),
            mode: None,
            saved: None,
            transform: Mat4::IDENTITY,
            effect: None,
            stats: BatchStats::default(),
        }
    }

    /// Mode of the active batch, if any.
    pub fn mode(&self) -> Option<BatchMode> {
        self.mode
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn custom_effect(&self) -> Option<&AlphaTestEffect> {
        self.effect.as_ref()
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

impl<B: GraphicsBackend> SpriteBatcher for SpriteBatch<B> {
    type Backend = B;

    fn backend(&self) -> &B {
        &self.backend
    }

    fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn is_active(&self) -> bool {
        self.mode.is_some()
    }

    fn begin(&mut self, mode: BatchMode) -> Result<(), RenderError> {
        if self.mode.is_some() {
            return Err(RenderError::BatchAlreadyActive);
        }
        if mode == BatchMode::AlphaBlend {
            self.saved = Some(SavedState {
                blend: self.backend.blend_state(),
                target: self.backend.render_target(),
            });
            self.backend.set_blend_state(&BlendParams::ALPHA_BLEND);
        }
        self.mode = Some(mode);
        self.stats.begins += 1;
        tracing::trace!(?mode, "batch begin");
        Ok(())
    }

    fn draw(&mut self, sprite: Sprite) -> Result<(), RenderError> {
        if self.mode.is_none() {
            return Err(RenderError::BatchNotActive("draw"));
        }
        self.pending.push(sprite);
        self.stats.draws += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        self.stats.flushes += 1;
        if self.pending.is_empty() {
            return Ok(());
        }

        let submission = SpriteSubmission {
            sprites: &self.pending,
            transform: self.transform,
            effect: self.effect.as_ref(),
        };
        let result = self.backend.submit(&submission);
        self.pending.clear();
        self.stats.submissions += 1;
        result
    }

    fn end(&mut self) -> Result<(), RenderError> {
        if self.mode.is_none() {
            return Err(RenderError::BatchNotActive("end"));
        }
        let flushed = self.flush();
        if let Some(saved) = self.saved.take() {
            self.backend.set_blend_state(&saved.blend);
            if self.backend.render_target() != saved.target {
                self.backend.set_render_target(saved.target);
            }
        }
        self.mode = None;
        self.stats.ends += 1;
        tracing::trace!("batch end");
        flushed
    }

    fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    fn set_custom_effect(&mut self, effect: Option<AlphaTestEffect>) {
        self.effect = effect;
    }

    fn stats(&self) -> BatchStats {
        self.stats
    }
}

/// Split sprites into maximal runs sharing a texture, preserving order.
pub fn texture_runs(sprites: &[Sprite]) -> impl Iterator<Item = (TextureId, Range<usize>)> + '_ {
    let mut start = 0;
    sprites
        .chunk_by(|a, b| a.texture == b.texture)
        .map(move |run| {
            let range = start..start + run.len();
            start = range.end;
            (run[0].texture, range)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{BackendCommand, RecordingBackend};
    use blendlab_common::{Blend, Viewport};

    fn batch() -> SpriteBatch<RecordingBackend> {
        SpriteBatch::new(RecordingBackend::new(Viewport::new(64, 64)))
    }

    fn sprite(tex: u32) -> Sprite {
        Sprite::new(TextureId(tex), Vec2::ZERO, Color::WHITE)
    }

    #[test]
    fn draws_are_buffered_until_flush() {
        let mut b = batch();
        b.begin(BatchMode::AlphaBlend).unwrap();
        b.draw(sprite(0)).unwrap();
        b.draw(sprite(0)).unwrap();
        assert_eq!(b.pending(), 2);
        assert_eq!(b.backend().submitted_sprites(), 0);

        b.flush().unwrap();
        assert_eq!(b.pending(), 0);
        assert_eq!(b.backend().submitted_sprites(), 2);
    }

    #[test]
    fn empty_flush_submits_nothing() {
        let mut b = batch();
        b.flush().unwrap();
        let stats = b.stats();
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.submissions, 0);
    }

    #[test]
    fn draw_outside_batch_fails() {
        let mut b = batch();
        assert!(matches!(
            b.draw(sprite(0)),
            Err(RenderError::BatchNotActive("draw"))
        ));
        assert!(matches!(b.end(), Err(RenderError::BatchNotActive("end"))));
    }

    #[test]
    fn double_begin_fails() {
        let mut b = batch();
        b.begin(BatchMode::DoNotSaveState).unwrap();
        assert!(matches!(
            b.begin(BatchMode::AlphaBlend),
            Err(RenderError::BatchAlreadyActive)
        ));
    }

    #[test]
    fn alpha_blend_restores_state_at_end() {
        let mut b = batch();
        let additive = BlendParams {
            color_src: Blend::BlendFactor,
            color_dst: Blend::One,
            ..BlendParams::ALPHA_BLEND
        };
        b.backend_mut().set_blend_state(&additive);

        b.begin(BatchMode::AlphaBlend).unwrap();
        assert_eq!(b.backend().blend_state(), BlendParams::ALPHA_BLEND);
        b.backend_mut().set_render_target(Some(RenderTargetId(3)));
        b.end().unwrap();

        assert_eq!(b.backend().blend_state(), additive);
        assert_eq!(b.backend().render_target(), None);
    }

    #[test]
    fn do_not_save_state_leaves_device_alone() {
        let mut b = batch();
        b.begin(BatchMode::DoNotSaveState).unwrap();
        b.backend_mut().set_render_target(Some(RenderTargetId(1)));
        b.end().unwrap();
        assert_eq!(b.backend().render_target(), Some(RenderTargetId(1)));
        assert!(
            !b.backend()
                .commands()
                .iter()
                .any(|c| matches!(c, BackendCommand::SetBlendState(_)))
        );
    }

    #[test]
    fn submission_carries_transform_and_effect() {
        let mut b = batch();
        let fx = AlphaTestEffect::new(Viewport::new(64, 64));
        let m = Mat4::from_scale(glam::Vec3::splat(2.0));
        b.begin(BatchMode::AlphaBlend).unwrap();
        b.set_transform(m);
        b.set_custom_effect(Some(fx));
        b.draw(sprite(0)).unwrap();
        b.end().unwrap();

        let submit = b
            .backend()
            .commands()
            .iter()
            .find_map(|c| match c {
                BackendCommand::Submit(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(submit.transform, m);
        assert!(submit.alpha_test);
    }

    #[test]
    fn texture_runs_split_on_change() {
        let sprites = [sprite(1), sprite(1), sprite(2), sprite(1)];
        let runs: Vec<_> = texture_runs(&sprites).collect();
        assert_eq!(
            runs,
            vec![
                (TextureId(1), 0..2),
                (TextureId(2), 2..3),
                (TextureId(1), 3..4),
            ]
        );
        assert_eq!(texture_runs(&[]).count(), 0);
    }
}
