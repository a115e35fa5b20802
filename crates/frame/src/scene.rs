use glam::{Mat4, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use blendlab_assets::ContentLoader;
use blendlab_common::{Color, TextureId};
use blendlab_render::{BatchMode, RenderContext, RenderError, SpriteBatcher};

use crate::config::SceneConfig;
use crate::driver::{FrameTime, Game};

/// Stress scene: a full-size background sprite, then `sprite_count` red
/// sprites at random positions, each either scaled at fractional opacity
/// or drawn additively. Every sprite forces state changes mid-batch.
pub struct SpriteStorm {
    config: SceneConfig,
    rng: StdRng,
    texture: Option<TextureId>,
}

impl SpriteStorm {
    pub fn new(config: SceneConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            texture: None,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    fn storm_sprite<S: SpriteBatcher>(
        &mut self,
        ctx: &mut RenderContext<S>,
        texture: TextureId,
    ) -> Result<(), RenderError> {
        let viewport = ctx.viewport();
        let x = (self.rng.gen_range(0.0f64..1.0) * viewport.width as f64) as i32;
        let y = (self.rng.gen_range(0.0f64..1.0) * viewport.height as f64) as i32;
        let position = Vec2::new(x as f32, y as f32);

        if self.rng.gen_range(0.0f32..1.0) > 0.5 {
            let scale = self.rng.gen_range(0.0f32..1.0) + 0.01;
            ctx.set_transform(Mat4::from_scale(Vec3::splat(scale)))?;
            ctx.set_opacity(self.config.fractional_opacity)?;
            ctx.draw(texture, position, Color::RED)?;
            ctx.set_opacity(1.0)?;
            ctx.set_transform(Mat4::IDENTITY)
        } else {
            ctx.set_blend(true, self.config.additive_rate)?;
            ctx.draw(texture, position, Color::RED)?;
            ctx.set_blend(false, 1.0)
        }
    }
}

impl<S: SpriteBatcher> Game<S> for SpriteStorm {
    fn on_load(
        &mut self,
        ctx: &mut RenderContext<S>,
        content: &mut ContentLoader,
    ) -> Result<(), RenderError> {
        self.texture = Some(ctx.load_texture(content, &self.config.texture)?);
        tracing::info!(
            texture = %self.config.texture,
            sprites = self.config.sprite_count,
            seed = ?self.config.seed,
            "sprite storm ready"
        );
        Ok(())
    }

    fn on_draw(&mut self, ctx: &mut RenderContext<S>, _time: &FrameTime) -> Result<(), RenderError> {
        let Some(texture) = self.texture else {
            return Err(RenderError::NotLoaded("sprite storm texture"));
        };

        ctx.clear(self.config.background);
        ctx.begin(BatchMode::AlphaBlend)?;
        ctx.draw(texture, Vec2::ZERO, Color::WHITE)?;
        for _ in 0..self.config.sprite_count {
            self.storm_sprite(ctx, texture)?;
        }
        ctx.end()
    }

    fn on_unload(&mut self) {
        self.texture = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use blendlab_common::Viewport;
    use blendlab_input::InputState;
    use blendlab_render::{RecordingBackend, SpriteBatch, SubmitRecord};

    use crate::driver::FrameDriver;

    type Batch = SpriteBatch<RecordingBackend>;

    fn write_texture(root: &Path) {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 255, 255, 255]));
        img.save(root.join("test.png")).unwrap();
    }

    fn scene(seed: u64, sprite_count: usize) -> SpriteStorm {
        SpriteStorm::new(SceneConfig {
            seed: Some(seed),
            sprite_count,
            ..SceneConfig::default()
        })
    }

    fn driver(root: &Path, game: SpriteStorm) -> FrameDriver<Batch, SpriteStorm, Vec<u8>> {
        let ctx = RenderContext::new(SpriteBatch::new(RecordingBackend::new(Viewport::new(
            320, 240,
        ))));
        FrameDriver::new(ctx, game, ContentLoader::new(root)).with_log(Vec::new())
    }

    fn submissions(d: &FrameDriver<Batch, SpriteStorm, Vec<u8>>) -> Vec<SubmitRecord> {
        d.context().backend().submissions().cloned().collect()
    }

    #[test]
    fn every_sprite_reaches_the_backend() {
        let dir = tempfile::tempdir().unwrap();
        write_texture(dir.path());
        let mut d = driver(dir.path(), scene(7, 500));
        d.tick(&InputState::new()).unwrap();

        let backend = d.context().backend();
        assert_eq!(backend.submitted_sprites(), 501);
        assert_eq!(d.context().batch().stats().draws, 501);
        assert_eq!(d.context().metrics().clear_count, 1);
        assert_eq!(d.context().metrics().sprite_count, 501);
    }

    #[test]
    fn seeded_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        write_texture(dir.path());
        let mut a = driver(dir.path(), scene(42, 50));
        let mut b = driver(dir.path(), scene(42, 50));
        a.tick(&InputState::new()).unwrap();
        b.tick(&InputState::new()).unwrap();
        assert_eq!(submissions(&a), submissions(&b));

        let mut c = driver(dir.path(), scene(43, 50));
        c.tick(&InputState::new()).unwrap();
        assert_ne!(submissions(&a), submissions(&c));
    }

    #[test]
    fn storm_sprites_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        write_texture(dir.path());
        let mut d = driver(dir.path(), scene(3, 20));
        d.tick(&InputState::new()).unwrap();

        let subs = submissions(&d);
        // Background goes out alone, then one submission per storm sprite.
        assert_eq!(subs.len(), 21);
        assert!(subs.iter().all(|s| s.sprites.len() == 1));
        assert_eq!(subs[0].sprites[0].tint, Color::WHITE);
        assert!(!subs[0].alpha_test);
        for sub in &subs[1..] {
            assert_eq!(sub.sprites[0].tint, Color::RED);
            assert!(sub.alpha_test);
            assert!(sub.sprites[0].position.x < 320.0);
            assert!(sub.sprites[0].position.y < 240.0);
        }
    }

    #[test]
    fn state_settles_after_frame() {
        let dir = tempfile::tempdir().unwrap();
        write_texture(dir.path());
        let mut d = driver(dir.path(), scene(11, 30));
        d.tick(&InputState::new()).unwrap();

        let state = d.context().state();
        assert_eq!(state.opacity, 1.0);
        assert!(!state.blending);
        assert!(!state.alpha_test);
        assert_eq!(state.transform, Mat4::IDENTITY);
        assert!(!d.context().batch().is_active());
    }

    #[test]
    fn missing_texture_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = driver(dir.path(), scene(1, 1));
        let err = d.tick(&InputState::new()).unwrap_err();
        assert!(matches!(
            err,
            crate::FrameError::Render(RenderError::ResourceLoad(_))
        ));
    }

    #[test]
    fn draw_before_load_errors() {
        let mut ctx = RenderContext::new(SpriteBatch::new(RecordingBackend::new(Viewport::new(
            8, 8,
        ))));
        let mut storm = scene(1, 1);
        let err = Game::<Batch>::on_draw(&mut storm, &mut ctx, &FrameTime::default()).unwrap_err();
        assert!(matches!(err, RenderError::NotLoaded(_)));
    }
}
