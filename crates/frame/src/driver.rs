use std::io::{Stdout, Write};
use std::time::{Duration, Instant};

use blendlab_assets::ContentLoader;
use blendlab_input::{Action, InputState, KeyMap};
use blendlab_render::{GraphicsBackend, RenderContext, RenderError, SpriteBatcher};
use blendlab_tools::{FrameStats, FrameWatchdog};

/// Errors surfaced by the frame driver. All are fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to write frame log: {0}")]
    Log(#[from] std::io::Error),
}

/// Whether the host loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Timing of the current tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    /// Time since the previous tick; zero on the first.
    pub elapsed: Duration,
    /// Time since the first tick.
    pub total: Duration,
    /// Zero-based tick index.
    pub frame: u64,
}

/// What a game sees during update.
pub struct UpdateContext<'a> {
    pub input: &'a InputState,
    pub keymap: &'a KeyMap,
    pub time: FrameTime,
}

impl UpdateContext<'_> {
    pub fn exit_requested(&self) -> bool {
        self.input.wants(self.keymap, Action::Exit)
    }
}

/// Lifecycle callbacks driven by [`FrameDriver`].
pub trait Game<S: SpriteBatcher> {
    /// Resolve content and create device resources. Called once.
    fn on_load(
        &mut self,
        ctx: &mut RenderContext<S>,
        content: &mut ContentLoader,
    ) -> Result<(), RenderError>;

    /// Advance game state. The default exits when the exit action is held.
    fn on_update(&mut self, update: &UpdateContext<'_>) -> Flow {
        if update.exit_requested() {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    /// Issue the frame's draw calls. This is what the watchdog times.
    fn on_draw(&mut self, ctx: &mut RenderContext<S>, time: &FrameTime)
    -> Result<(), RenderError>;

    fn on_unload(&mut self) {}
}

/// Drives a [`Game`] one tick at a time for an external host loop.
///
/// Slow-frame diagnostic blocks go to `log`, stdout unless replaced.
pub struct FrameDriver<S: SpriteBatcher, G: Game<S>, W: Write = Stdout> {
    ctx: RenderContext<S>,
    game: G,
    content: ContentLoader,
    keymap: KeyMap,
    watchdog: FrameWatchdog,
    log: W,
    loaded: bool,
    frame: u64,
    first_tick: Option<Instant>,
    last_tick: Option<Instant>,
}

impl<S: SpriteBatcher, G: Game<S>> FrameDriver<S, G, Stdout> {
    pub fn new(ctx: RenderContext<S>, game: G, content: ContentLoader) -> Self {
        Self {
            ctx,
            game,
            content,
            keymap: KeyMap::default(),
            watchdog: FrameWatchdog::default(),
            log: std::io::stdout(),
            loaded: false,
            frame: 0,
            first_tick: None,
            last_tick: None,
        }
    }
}

impl<S: SpriteBatcher, G: Game<S>, W: Write> FrameDriver<S, G, W> {
    /// Send diagnostic blocks somewhere other than stdout.
    pub fn with_log<W2: Write>(self, log: W2) -> FrameDriver<S, G, W2> {
        FrameDriver {
            ctx: self.ctx,
            game: self.game,
            content: self.content,
            keymap: self.keymap,
            watchdog: self.watchdog,
            log,
            loaded: self.loaded,
            frame: self.frame,
            first_tick: self.first_tick,
            last_tick: self.last_tick,
        }
    }

    pub fn with_watchdog(mut self, watchdog: FrameWatchdog) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn with_keymap(mut self, keymap: KeyMap) -> Self {
        self.keymap = keymap;
        self
    }

    pub fn context(&self) -> &RenderContext<S> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RenderContext<S> {
        &mut self.ctx
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn log(&self) -> &W {
        &self.log
    }

    pub fn stats(&self) -> &FrameStats {
        self.watchdog.stats()
    }

    /// Ticks run so far, including the one that requested exit.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Run the game's load callback. `tick` calls this on first use.
    pub fn load(&mut self) -> Result<(), FrameError> {
        if self.loaded {
            return Ok(());
        }
        self.game.on_load(&mut self.ctx, &mut self.content)?;
        self.loaded = true;
        tracing::info!(
            textures = self.content.len(),
            viewport = ?self.ctx.viewport(),
            "content loaded"
        );
        Ok(())
    }

    /// One update + draw. Returns `Flow::Exit` without drawing when the
    /// game asks to stop.
    pub fn tick(&mut self, input: &InputState) -> Result<Flow, FrameError> {
        self.load()?;

        let now = Instant::now();
        let first = *self.first_tick.get_or_insert(now);
        let time = FrameTime {
            elapsed: self.last_tick.map_or(Duration::ZERO, |t| now - t),
            total: now - first,
            frame: self.frame,
        };
        self.last_tick = Some(now);
        self.frame += 1;

        let update = UpdateContext {
            input,
            keymap: &self.keymap,
            time,
        };
        if self.game.on_update(&update) == Flow::Exit {
            tracing::info!(frame = time.frame, "exit requested");
            return Ok(Flow::Exit);
        }

        self.draw(&time)?;
        Ok(Flow::Continue)
    }

    /// Tick up to `frames` times with fixed input. Returns ticks run.
    pub fn run_for(&mut self, frames: u64, input: &InputState) -> Result<u64, FrameError> {
        let start = self.frame;
        for _ in 0..frames {
            if self.tick(input)? == Flow::Exit {
                break;
            }
        }
        Ok(self.frame - start)
    }

    /// Run the unload callback and hand the game back.
    pub fn unload(mut self) -> G {
        self.game.on_unload();
        self.content.unload();
        tracing::info!(frames = self.frame, "unloaded");
        self.game
    }

    fn draw(&mut self, time: &FrameTime) -> Result<(), FrameError> {
        self.ctx.backend_mut().reset_metrics();

        let started = Instant::now();
        let drawn = self.game.on_draw(&mut self.ctx, time);
        let elapsed = started.elapsed();
        drawn?;

        if let Some(report) = self.watchdog.observe(elapsed, || self.ctx.metrics()) {
            report.write_block(&mut self.log)?;
            self.log.flush()?;
        }
        Ok(())
    }
}

/// Wraps a game and stalls every draw by a fixed delay.
pub struct InjectedDelay<G> {
    inner: G,
    delay: Duration,
}

impl<G> InjectedDelay<G> {
    pub fn new(inner: G, delay: Duration) -> Self {
        Self { inner, delay }
    }

    pub fn into_inner(self) -> G {
        self.inner
    }
}

impl<S: SpriteBatcher, G: Game<S>> Game<S> for InjectedDelay<G> {
    fn on_load(
        &mut self,
        ctx: &mut RenderContext<S>,
        content: &mut ContentLoader,
    ) -> Result<(), RenderError> {
        self.inner.on_load(ctx, content)
    }

    fn on_update(&mut self, update: &UpdateContext<'_>) -> Flow {
        self.inner.on_update(update)
    }

    fn on_draw(&mut self, ctx: &mut RenderContext<S>, time: &FrameTime) -> Result<(), RenderError> {
        self.inner.on_draw(ctx, time)?;
        std::thread::sleep(self.delay);
        Ok(())
    }

    fn on_unload(&mut self) {
        self.inner.on_unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blendlab_common::{Color, Viewport};
    use blendlab_input::Key;
    use blendlab_render::{BatchMode, RecordingBackend, SpriteBatch};
    use blendlab_tools::{FRAME_LOG_END, FRAME_LOG_START};

    type Batch = SpriteBatch<RecordingBackend>;

    /// Clears and draws nothing; counts callbacks.
    #[derive(Default)]
    struct Blank {
        loads: u32,
        draws: u32,
        unloaded: bool,
    }

    impl Game<Batch> for Blank {
        fn on_load(
            &mut self,
            _ctx: &mut RenderContext<Batch>,
            _content: &mut ContentLoader,
        ) -> Result<(), RenderError> {
            self.loads += 1;
            Ok(())
        }

        fn on_draw(
            &mut self,
            ctx: &mut RenderContext<Batch>,
            _time: &FrameTime,
        ) -> Result<(), RenderError> {
            self.draws += 1;
            ctx.clear(Color::BLACK);
            ctx.begin(BatchMode::AlphaBlend)?;
            ctx.end()
        }

        fn on_unload(&mut self) {
            self.unloaded = true;
        }
    }

    fn driver<G: Game<Batch>>(game: G) -> FrameDriver<Batch, G, Vec<u8>> {
        let ctx = RenderContext::new(SpriteBatch::new(RecordingBackend::new(Viewport::new(
            64, 64,
        ))));
        FrameDriver::new(ctx, game, ContentLoader::new("Content")).with_log(Vec::new())
    }

    fn log_text<G: Game<Batch>>(d: &FrameDriver<Batch, G, Vec<u8>>) -> String {
        String::from_utf8(d.log().clone()).unwrap()
    }

    #[test]
    fn tick_loads_once_and_draws() {
        let mut d = driver(Blank::default());
        let input = InputState::new();
        assert_eq!(d.tick(&input).unwrap(), Flow::Continue);
        assert_eq!(d.tick(&input).unwrap(), Flow::Continue);

        assert_eq!(d.game().loads, 1);
        assert_eq!(d.game().draws, 2);
        assert_eq!(d.frame_count(), 2);
        assert_eq!(d.context().metrics().clear_count, 1);
    }

    #[test]
    fn escape_exits_before_draw() {
        let mut d = driver(Blank::default());
        let mut input = InputState::new();
        input.set_key(Key::Escape, true);

        assert_eq!(d.tick(&input).unwrap(), Flow::Exit);
        assert_eq!(d.game().draws, 0);
        assert_eq!(d.run_for(5, &input).unwrap(), 1);
    }

    #[test]
    fn run_for_counts_ticks() {
        let mut d = driver(Blank::default());
        assert_eq!(d.run_for(3, &InputState::new()).unwrap(), 3);
        assert_eq!(d.stats().frames, 3);
    }

    #[test]
    fn unload_runs_callback() {
        let mut d = driver(Blank::default());
        d.tick(&InputState::new()).unwrap();
        let game = d.unload();
        assert!(game.unloaded);
    }

    #[test]
    fn injected_delay_logs_one_block() {
        let game = InjectedDelay::new(Blank::default(), Duration::from_millis(15));
        let mut d = driver(game).with_watchdog(FrameWatchdog::new(Duration::from_millis(10)));
        d.tick(&InputState::new()).unwrap();

        let text = log_text(&d);
        assert_eq!(text.matches(FRAME_LOG_START).count(), 1);
        assert_eq!(text.matches(FRAME_LOG_END).count(), 1);

        let ms: f64 = text
            .lines()
            .find_map(|l| l.split(" - Slow update: ").nth(1))
            .unwrap()
            .parse()
            .unwrap();
        assert!(ms >= 15.0, "logged {ms}ms");
        assert!(text.contains("Metrics: ClearCount:1,"));
        assert_eq!(d.stats().slow_frames, 1);
    }

    #[test]
    fn fast_frames_log_nothing() {
        let mut d = driver(Blank::default()).with_watchdog(FrameWatchdog::new(Duration::from_secs(5)));
        d.run_for(3, &InputState::new()).unwrap();
        assert!(log_text(&d).is_empty());
    }

    #[test]
    fn draw_errors_propagate() {
        struct Broken;
        impl Game<Batch> for Broken {
            fn on_load(
                &mut self,
                _ctx: &mut RenderContext<Batch>,
                _content: &mut ContentLoader,
            ) -> Result<(), RenderError> {
                Ok(())
            }

            fn on_draw(
                &mut self,
                ctx: &mut RenderContext<Batch>,
                _time: &FrameTime,
            ) -> Result<(), RenderError> {
                ctx.end()
            }
        }

        let mut d = driver(Broken);
        let err = d.tick(&InputState::new()).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Render(RenderError::BatchNotActive("end"))
        ));
    }

    #[test]
    fn frame_time_advances() {
        struct Clocked(Vec<FrameTime>);
        impl Game<Batch> for Clocked {
            fn on_load(
                &mut self,
                _ctx: &mut RenderContext<Batch>,
                _content: &mut ContentLoader,
            ) -> Result<(), RenderError> {
                Ok(())
            }

            fn on_draw(
                &mut self,
                _ctx: &mut RenderContext<Batch>,
                time: &FrameTime,
            ) -> Result<(), RenderError> {
                self.0.push(*time);
                Ok(())
            }
        }

        let mut d = driver(Clocked(Vec::new()));
        d.run_for(2, &InputState::new()).unwrap();
        let times = &d.game().0;
        assert_eq!(times[0].frame, 0);
        assert_eq!(times[0].elapsed, Duration::ZERO);
        assert_eq!(times[1].frame, 1);
        assert!(times[1].total >= times[1].elapsed);
    }
}
