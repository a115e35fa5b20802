use glam::Mat4;

use blendlab_assets::TextureData;
use blendlab_common::{BlendParams, Color, DrawMetrics, RenderTargetId, TextureId, Viewport};

use crate::backend::{GraphicsBackend, SpriteSubmission};
use crate::batch::{Sprite, texture_runs};
use crate::error::RenderError;

/// A sprite run as seen by the backend at submit time.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRecord {
    pub sprites: Vec<Sprite>,
    pub transform: Mat4,
    pub alpha_test: bool,
    pub blend: BlendParams,
    pub target: Option<RenderTargetId>,
}

/// One call made against a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    Clear(Color),
    SetRenderTarget(Option<RenderTargetId>),
    SetBlendState(BlendParams),
    CreateTexture { id: TextureId, name: String },
    CreateRenderTarget { id: RenderTargetId, width: u32, height: u32 },
    Submit(SubmitRecord),
}

/// Backend that draws nothing and records everything.
///
/// Used by the headless CLI and by tests that check flush ordering and
/// state transitions without a GPU. Metrics are maintained the same way
/// the wgpu backend counts them.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    viewport: Viewport,
    blend: BlendParams,
    target: Option<RenderTargetId>,
    textures: Vec<String>,
    targets: Vec<Viewport>,
    commands: Vec<BackendCommand>,
    metrics: DrawMetrics,
    last_alpha_test: Option<bool>,
}

impl RecordingBackend {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            blend: BlendParams::ALPHA_BLEND,
            target: None,
            textures: Vec::new(),
            targets: Vec::new(),
            commands: Vec::new(),
            metrics: DrawMetrics::default(),
            last_alpha_test: None,
        }
    }

    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Every submitted run, in order.
    pub fn submissions(&self) -> impl Iterator<Item = &SubmitRecord> {
        self.commands.iter().filter_map(|c| match c {
            BackendCommand::Submit(s) => Some(s),
            _ => None,
        })
    }

    /// Total sprites submitted so far.
    pub fn submitted_sprites(&self) -> usize {
        self.submissions().map(|s| s.sprites.len()).sum()
    }

    /// Number of blend-state applications recorded.
    pub fn blend_applies(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, BackendCommand::SetBlendState(_)))
            .count()
    }
}

impl GraphicsBackend for RecordingBackend {
    fn clear(&mut self, color: Color) {
        self.metrics.clear_count += 1;
        self.commands.push(BackendCommand::Clear(color));
    }

    fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        self.target = target;
        self.metrics.target_count += 1;
        self.commands.push(BackendCommand::SetRenderTarget(target));
    }

    fn render_target(&self) -> Option<RenderTargetId> {
        self.target
    }

    fn set_blend_state(&mut self, params: &BlendParams) {
        self.blend = *params;
        self.commands.push(BackendCommand::SetBlendState(*params));
    }

    fn blend_state(&self) -> BlendParams {
        self.blend
    }

    fn viewport(&self) -> Viewport {
        match self.target {
            Some(id) => self
                .targets
                .get(id.0 as usize)
                .copied()
                .unwrap_or(self.viewport),
            None => self.viewport,
        }
    }

    fn metrics(&self) -> DrawMetrics {
        self.metrics
    }

    fn reset_metrics(&mut self) {
        self.metrics = DrawMetrics::default();
        self.last_alpha_test = None;
    }

    fn create_texture(&mut self, texture: &TextureData) -> Result<TextureId, RenderError> {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(texture.name.clone());
        self.commands.push(BackendCommand::CreateTexture {
            id,
            name: texture.name.clone(),
        });
        Ok(id)
    }

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<RenderTargetId, RenderError> {
        let id = RenderTargetId(self.targets.len() as u32);
        self.targets.push(Viewport::new(width, height));
        self.commands
            .push(BackendCommand::CreateRenderTarget { id, width, height });
        Ok(id)
    }

    fn submit(&mut self, submission: &SpriteSubmission<'_>) -> Result<(), RenderError> {
        if let Some(id) = self.target {
            if id.0 as usize >= self.targets.len() {
                return Err(RenderError::UnknownRenderTarget(id));
            }
        }
        if let Some(bad) = submission
            .sprites
            .iter()
            .find(|s| s.texture.0 as usize >= self.textures.len())
        {
            return Err(RenderError::UnknownTexture(bad.texture));
        }

        let alpha_test = submission.effect.is_some();
        if self.last_alpha_test != Some(alpha_test) {
            self.metrics.record_shader_switch();
            self.last_alpha_test = Some(alpha_test);
        }
        for (_, range) in texture_runs(submission.sprites) {
            self.metrics.record_sprite_draw(range.len() as u64);
        }

        self.commands.push(BackendCommand::Submit(SubmitRecord {
            sprites: submission.sprites.to_vec(),
            transform: submission.transform,
            alpha_test,
            blend: self.blend,
            target: self.target,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn backend_with_texture() -> (RecordingBackend, TextureId) {
        let mut b = RecordingBackend::new(Viewport::new(320, 240));
        let id = b
            .create_texture(&TextureData::solid("t", 1, 1, [255; 4]))
            .unwrap();
        (b, id)
    }

    #[test]
    fn records_in_call_order() {
        let (mut b, _) = backend_with_texture();
        b.clear(Color::BLACK);
        b.set_render_target(None);
        assert!(matches!(b.commands()[1], BackendCommand::Clear(Color::BLACK)));
        assert!(matches!(b.commands()[2], BackendCommand::SetRenderTarget(None)));
    }

    #[test]
    fn submit_counts_draws_per_texture_run() {
        let (mut b, tex) = backend_with_texture();
        let sprites = [
            Sprite::new(tex, Vec2::ZERO, Color::WHITE),
            Sprite::new(tex, Vec2::ONE, Color::WHITE),
        ];
        b.submit(&SpriteSubmission {
            sprites: &sprites,
            transform: Mat4::IDENTITY,
            effect: None,
        })
        .unwrap();

        let m = b.metrics();
        assert_eq!(m.draw_count, 1);
        assert_eq!(m.sprite_count, 2);
        assert_eq!(m.primitive_count, 4);
        assert_eq!(m.pixel_shader_count, 1);
    }

    #[test]
    fn unknown_texture_rejected() {
        let mut b = RecordingBackend::new(Viewport::new(1, 1));
        let sprites = [Sprite::new(TextureId(9), Vec2::ZERO, Color::WHITE)];
        let err = b
            .submit(&SpriteSubmission {
                sprites: &sprites,
                transform: Mat4::IDENTITY,
                effect: None,
            })
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownTexture(TextureId(9))));
    }

    #[test]
    fn viewport_follows_target() {
        let mut b = RecordingBackend::new(Viewport::new(100, 100));
        let rt = b.create_render_target(16, 8).unwrap();
        b.set_render_target(Some(rt));
        assert_eq!(b.viewport(), Viewport::new(16, 8));
        b.set_render_target(None);
        assert_eq!(b.viewport(), Viewport::new(100, 100));
    }

    #[test]
    fn reset_clears_metrics() {
        let (mut b, _) = backend_with_texture();
        b.clear(Color::WHITE);
        b.reset_metrics();
        assert_eq!(b.metrics(), DrawMetrics::default());
    }
}
