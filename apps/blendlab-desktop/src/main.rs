use anyhow::{Context, Result};
use blendlab_assets::ContentLoader;
use blendlab_common::Viewport;
use blendlab_frame::{AppConfig, Flow, FrameDriver, SpriteStorm};
use blendlab_input::{InputState, Key};
use blendlab_render::{RenderContext, SpriteBatch};
use blendlab_render_wgpu::WgpuBackend;
use blendlab_tools::FrameWatchdog;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowId};

#[derive(Parser)]
#[command(name = "blendlab-desktop", about = "Blend/opacity stress demo")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Content directory, overrides the config file
    #[arg(long)]
    content_dir: Option<PathBuf>,

    /// Fixed RNG seed for the scene
    #[arg(long)]
    seed: Option<u64>,
}

type Batch = SpriteBatch<WgpuBackend>;

struct Gpu {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    config: wgpu::SurfaceConfiguration,
}

struct DesktopApp {
    settings: AppConfig,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    driver: Option<FrameDriver<Batch, SpriteStorm>>,
    input: InputState,
    failure: Option<anyhow::Error>,
}

fn map_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Escape => Some(Key::Escape),
        KeyCode::Space => Some(Key::Space),
        KeyCode::Enter => Some(Key::Enter),
        KeyCode::F1 => Some(Key::F1),
        _ => None,
    }
}

impl DesktopApp {
    fn new(settings: AppConfig) -> Self {
        Self {
            settings,
            window: None,
            gpu: None,
            driver: None,
            input: InputState::new(),
            failure: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let device_cfg = &self.settings.device;
        let mut attrs = Window::default_attributes()
            .with_title("BlendLab")
            .with_inner_size(PhysicalSize::new(device_cfg.width, device_cfg.height));
        if device_cfg.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no compatible GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("blendlab_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let present_mode = if device_cfg.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let backend = WgpuBackend::new(
            device.clone(),
            queue,
            format,
            Viewport::new(config.width, config.height),
        );
        let ctx = RenderContext::new(SpriteBatch::new(backend))
            .with_alpha_reference(self.settings.scene.alpha_reference);
        let mut driver = FrameDriver::new(
            ctx,
            SpriteStorm::new(self.settings.scene.clone()),
            ContentLoader::new(&self.settings.content_root),
        )
        .with_watchdog(FrameWatchdog::new(self.settings.slow_frame_threshold()));
        driver.load()?;

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            ?format,
            ?present_mode,
            "GPU initialized"
        );

        self.window = Some(window);
        self.gpu = Some(Gpu {
            surface,
            device,
            config,
        });
        self.driver = Some(driver);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        tracing::error!("{err:#}");
        self.failure = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self) -> Result<Flow> {
        let (Some(gpu), Some(driver)) = (&self.gpu, &mut self.driver) else {
            return Ok(Flow::Continue);
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return Ok(Flow::Continue);
            }
            Err(e) => {
                tracing::warn!("surface error: {e}");
                return Ok(Flow::Continue);
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        driver.context_mut().backend_mut().set_backbuffer(Some(view));
        let flow = driver.tick(&self.input);
        driver.context_mut().backend_mut().set_backbuffer(None);
        output.present();
        Ok(flow?)
    }
}

impl ApplicationHandler for DesktopApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.config.width = new_size.width.max(1);
                    gpu.config.height = new_size.height.max(1);
                    gpu.surface.configure(&gpu.device, &gpu.config);
                    if let Some(driver) = &mut self.driver {
                        driver
                            .context_mut()
                            .backend_mut()
                            .resize(Viewport::new(gpu.config.width, gpu.config.height));
                    }
                }
            }
            WindowEvent::Focused(false) => {
                self.input.release_all();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if let Some(key) = map_key(code) {
                    self.input.set_key(key, state == ElementState::Pressed);
                }
            }
            WindowEvent::RedrawRequested => match self.redraw() {
                Ok(Flow::Exit) => event_loop.exit(),
                Ok(Flow::Continue) => {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
                Err(err) => self.fail(event_loop, err),
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(driver) = self.driver.take() {
            let stats = driver.stats().clone();
            driver.unload();
            tracing::info!(%stats, "shutting down");
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut settings = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = cli.content_dir {
        settings.content_root = dir;
    }
    if cli.seed.is_some() {
        settings.scene.seed = cli.seed;
    }
    tracing::info!(content = %settings.content_root.display(), "blendlab-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DesktopApp::new(settings);
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
