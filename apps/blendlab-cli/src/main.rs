use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use blendlab_assets::ContentLoader;
use blendlab_frame::{AppConfig, FrameDriver, Game, InjectedDelay, SpriteStorm};
use blendlab_input::InputState;
use blendlab_render::{RecordingBackend, RenderContext, SpriteBatch, SpriteBatcher};
use blendlab_tools::FrameWatchdog;

type Batch = SpriteBatch<RecordingBackend>;

#[derive(Parser)]
#[command(name = "blendlab-cli", about = "Headless blend/opacity demo runner")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Run the sprite-storm scene against the recording backend
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Number of frames to draw
    #[arg(short, long, default_value = "60")]
    frames: u64,
    /// RNG seed for a reproducible scene
    #[arg(short, long)]
    seed: Option<u64>,
    /// Sleep this long inside every draw, to exercise the slow-frame log
    #[arg(long)]
    delay_ms: Option<u64>,
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Content directory, overrides the config file
    #[arg(long)]
    content_dir: Option<PathBuf>,
    /// Sprites per frame, overrides the config file
    #[arg(long)]
    sprites: Option<usize>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
}

impl RunArgs {
    fn settings(&self) -> anyhow::Result<AppConfig> {
        let mut settings = AppConfig::load_or_default(self.config.as_deref())?;
        if let Some(dir) = &self.content_dir {
            settings.content_root = dir.clone();
        }
        if self.seed.is_some() {
            settings.scene.seed = self.seed;
        }
        if let Some(sprites) = self.sprites {
            settings.scene.sprite_count = sprites;
        }
        if let Some(width) = self.width {
            settings.device.width = width;
        }
        if let Some(height) = self.height {
            settings.device.height = height;
        }
        Ok(settings)
    }
}

fn run_frames<G: Game<Batch>>(settings: &AppConfig, game: G, frames: u64) -> anyhow::Result<()> {
    let backend = RecordingBackend::new(settings.device.viewport());
    let ctx = RenderContext::new(SpriteBatch::new(backend))
        .with_alpha_reference(settings.scene.alpha_reference);
    let mut driver = FrameDriver::new(ctx, game, ContentLoader::new(&settings.content_root))
        .with_watchdog(FrameWatchdog::new(settings.slow_frame_threshold()));

    let ran = driver.run_for(frames, &InputState::new())?;
    let metrics = driver.context().metrics();
    let batch = driver.context().batch().stats();
    println!("frames run: {ran}");
    println!("draw time: {}", driver.stats());
    println!(
        "batch: begins={} ends={} flushes={} submissions={} draws={}",
        batch.begins, batch.ends, batch.flushes, batch.submissions, batch.draws
    );
    println!("last frame: {metrics}");
    driver.unload();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => {
            println!("blendlab-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", blendlab_common::crate_info());
            println!("assets: {}", blendlab_assets::crate_info());
            println!("render: {}", blendlab_render::crate_info());
            println!("input: {}", blendlab_input::crate_info());
            println!("tools: {}", blendlab_tools::crate_info());
            println!("frame: {}", blendlab_frame::crate_info());
        }
        Commands::Run(args) => {
            let settings = args.settings()?;
            tracing::info!(
                frames = args.frames,
                sprites = settings.scene.sprite_count,
                seed = ?settings.scene.seed,
                "headless run"
            );
            let storm = SpriteStorm::new(settings.scene.clone());
            match args.delay_ms {
                Some(ms) => run_frames(
                    &settings,
                    InjectedDelay::new(storm, Duration::from_millis(ms)),
                    args.frames,
                )?,
                None => run_frames(&settings, storm, args.frames)?,
            }
        }
    }

    Ok(())
}
