use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use blendlab_assets::TextureData;
use blendlab_common::{Blend, BlendParams, Color, DrawMetrics, RenderTargetId, TextureId, Viewport};
use blendlab_render::{
    GraphicsBackend, RenderError, Sprite, SpriteSubmission, screen_projection, texture_runs,
};

use crate::shaders;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    alpha_ref: f32,
    alpha_test: u32,
    _pad: [u32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    corner: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct Instance {
    /// x, y, width, height in pixels before the batch transform.
    rect: [f32; 4],
    color: [f32; 4],
}

const QUAD: [Vertex; 4] = [
    Vertex { corner: [0.0, 0.0] },
    Vertex { corner: [1.0, 0.0] },
    Vertex { corner: [1.0, 1.0] },
    Vertex { corner: [0.0, 1.0] },
];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];
const INITIAL_INSTANCES: u64 = 1024;

/// Blend factors select a pipeline; the blend color does not.
type PipelineKey = [Blend; 4];

fn pipeline_key(params: &BlendParams) -> PipelineKey {
    [
        params.color_src,
        params.color_dst,
        params.alpha_src,
        params.alpha_dst,
    ]
}

fn blend_factor(blend: Blend) -> wgpu::BlendFactor {
    match blend {
        Blend::Zero => wgpu::BlendFactor::Zero,
        Blend::One => wgpu::BlendFactor::One,
        Blend::SourceAlpha => wgpu::BlendFactor::SrcAlpha,
        Blend::InverseSourceAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        Blend::BlendFactor => wgpu::BlendFactor::Constant,
        Blend::InverseBlendFactor => wgpu::BlendFactor::OneMinusConstant,
    }
}

fn blend_state(key: PipelineKey) -> wgpu::BlendState {
    let component = |src, dst| wgpu::BlendComponent {
        src_factor: blend_factor(src),
        dst_factor: blend_factor(dst),
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component(key[0], key[1]),
        alpha: component(key[2], key[3]),
    }
}

fn blend_constant(color: Color) -> wgpu::Color {
    let [r, g, b, a] = color.to_f32();
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: a as f64,
    }
}

/// Clip-space matrix for a submission. An alpha-test effect carries its
/// own projection and view; plain runs project onto `viewport`.
fn submission_view_proj(submission: &SpriteSubmission<'_>, viewport: Viewport) -> Mat4 {
    submission.effect.map_or_else(
        || screen_projection(viewport) * submission.transform,
        |effect| effect.view_projection(),
    )
}

/// Holds the first device failure from an operation that cannot return
/// one, until the next fallible call reports it.
#[derive(Debug, Default)]
struct DeferredError(Option<RenderError>);

impl DeferredError {
    fn record(&mut self, err: RenderError) {
        if self.0.is_none() {
            self.0 = Some(err);
        }
    }

    fn take(&mut self) -> Result<(), RenderError> {
        match self.0.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Expand sprites into instance data. `size` maps a texture to its pixel
/// dimensions; sprites draw at their texture's native size.
fn build_instances(
    sprites: &[Sprite],
    size: impl Fn(TextureId) -> Option<Viewport>,
) -> Result<Vec<Instance>, RenderError> {
    sprites
        .iter()
        .map(|s| {
            let dims = size(s.texture).ok_or(RenderError::UnknownTexture(s.texture))?;
            Ok(Instance {
                rect: [
                    s.position.x,
                    s.position.y,
                    dims.width as f32,
                    dims.height as f32,
                ],
                color: s.tint.to_f32(),
            })
        })
        .collect()
}

struct GpuTexture {
    size: Viewport,
    bind_group: wgpu::BindGroup,
}

struct GpuTarget {
    size: Viewport,
    view: wgpu::TextureView,
}

/// [`GraphicsBackend`] over a wgpu device.
///
/// The host binds the swapchain view for each frame with
/// [`set_backbuffer`](Self::set_backbuffer) before drawing.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    format: wgpu::TextureFormat,
    shader: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    quad_vertex_buffer: wgpu::Buffer,
    quad_index_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_capacity: u64,
    textures: Vec<GpuTexture>,
    targets: Vec<GpuTarget>,
    backbuffer: Option<wgpu::TextureView>,
    backbuffer_size: Viewport,
    blend: BlendParams,
    target: Option<RenderTargetId>,
    metrics: DrawMetrics,
    last_alpha_test: Option<bool>,
    deferred: DeferredError,
}

impl WgpuBackend {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
        size: Viewport,
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprite_uniforms"),
            contents: bytemuck::bytes_of(&Uniforms {
                view_proj: screen_projection(size).to_cols_array_2d(),
                alpha_ref: 0.0,
                alpha_test: 0,
                _pad: [0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprite_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprite_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SPRITE_SHADER.into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprite_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_vertex_buffer"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_index_buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        let instance_buffer = Self::create_instance_buffer(&device, INITIAL_INSTANCES);

        let mut backend = Self {
            device,
            queue,
            format,
            shader,
            pipeline_layout,
            pipelines: HashMap::new(),
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            sampler,
            quad_vertex_buffer,
            quad_index_buffer,
            instance_buffer,
            instance_capacity: INITIAL_INSTANCES,
            textures: Vec::new(),
            targets: Vec::new(),
            backbuffer: None,
            backbuffer_size: size,
            blend: BlendParams::ALPHA_BLEND,
            target: None,
            metrics: DrawMetrics::default(),
            last_alpha_test: None,
            deferred: DeferredError::default(),
        };
        backend.pipeline(pipeline_key(&BlendParams::ALPHA_BLEND));
        backend
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Bind the view drawn to when no offscreen target is set. Pass `None`
    /// after presenting so a stale swapchain view is never reused.
    pub fn set_backbuffer(&mut self, view: Option<wgpu::TextureView>) {
        self.backbuffer = view;
    }

    pub fn resize(&mut self, size: Viewport) {
        self.backbuffer_size = size;
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite_instance_buffer"),
            size: capacity * std::mem::size_of::<Instance>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn pipeline(&mut self, key: PipelineKey) -> &wgpu::RenderPipeline {
        let device = &self.device;
        let layout = &self.pipeline_layout;
        let shader = &self.shader;
        let format = self.format;
        self.pipelines.entry(key).or_insert_with(|| {
            tracing::debug!(?key, "building sprite pipeline");
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("sprite_pipeline"),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_sprite"),
                    compilation_options: Default::default(),
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: std::mem::size_of::<Vertex>() as u64,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                        },
                        wgpu::VertexBufferLayout {
                            array_stride: std::mem::size_of::<Instance>() as u64,
                            step_mode: wgpu::VertexStepMode::Instance,
                            attributes: &wgpu::vertex_attr_array![
                                1 => Float32x4,
                                2 => Float32x4,
                            ],
                        },
                    ],
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some("fs_sprite"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(blend_state(key)),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        })
    }

    fn target_view(&self) -> Result<&wgpu::TextureView, RenderError> {
        match self.target {
            Some(id) => self
                .targets
                .get(id.0 as usize)
                .map(|t| &t.view)
                .ok_or(RenderError::UnknownRenderTarget(id)),
            None => self
                .backbuffer
                .as_ref()
                .ok_or_else(|| RenderError::device("no back buffer bound")),
        }
    }

    fn ensure_instance_capacity(&mut self, needed: u64) {
        if needed <= self.instance_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        tracing::debug!(capacity, "growing instance buffer");
        self.instance_buffer = Self::create_instance_buffer(&self.device, capacity);
        self.instance_capacity = capacity;
    }
}

impl GraphicsBackend for WgpuBackend {
    fn clear(&mut self, color: Color) {
        let view = match self.target_view() {
            Ok(view) => view,
            Err(err) => {
                tracing::warn!(%err, "clear skipped");
                self.deferred.record(err);
                return;
            }
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear_encoder"),
            });
        {
            let [r, g, b, a] = color.to_f32();
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.metrics.clear_count += 1;
    }

    fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        self.target = target;
        self.metrics.target_count += 1;
    }

    fn render_target(&self) -> Option<RenderTargetId> {
        self.target
    }

    fn set_blend_state(&mut self, params: &BlendParams) {
        self.blend = *params;
    }

    fn blend_state(&self) -> BlendParams {
        self.blend
    }

    fn viewport(&self) -> Viewport {
        match self.target {
            Some(id) => self
                .targets
                .get(id.0 as usize)
                .map_or(self.backbuffer_size, |t| t.size),
            None => self.backbuffer_size,
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
        let size = wgpu::Extent3d {
            width: texture.width,
            height: texture.height,
            depth_or_array_layers: 1,
        };
        let gpu_texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(&texture.name),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &texture.pixels,
        );
        let view = gpu_texture.create_view(&Default::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&texture.name),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let id = TextureId(self.textures.len() as u32);
        self.textures.push(GpuTexture {
            size: Viewport::new(texture.width, texture.height),
            bind_group,
        });
        Ok(id)
    }

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<RenderTargetId, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::device(format!(
                "render target must be non-empty, got {width}x{height}"
            )));
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render_target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let id = RenderTargetId(self.targets.len() as u32);
        self.targets.push(GpuTarget {
            size: Viewport::new(width, height),
            view: texture.create_view(&Default::default()),
        });
        Ok(id)
    }

    fn submit(&mut self, submission: &SpriteSubmission<'_>) -> Result<(), RenderError> {
        self.deferred.take()?;
        if submission.sprites.is_empty() {
            return Ok(());
        }
        let instances = build_instances(submission.sprites, |id| {
            self.textures.get(id.0 as usize).map(|t| t.size)
        })?;
        self.target_view()?;

        let alpha_test = submission.effect.is_some();
        let alpha_ref = submission
            .effect
            .map_or(0.0, |e| e.reference_alpha as f32 / 255.0);
        let view_proj = submission_view_proj(submission, self.viewport());
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms {
                view_proj: view_proj.to_cols_array_2d(),
                alpha_ref,
                alpha_test: alpha_test as u32,
                _pad: [0; 2],
            }),
        );
        self.ensure_instance_capacity(instances.len() as u64);
        self.queue
            .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));

        if self.last_alpha_test != Some(alpha_test) {
            self.metrics.record_shader_switch();
            self.last_alpha_test = Some(alpha_test);
        }

        let runs: Vec<_> = texture_runs(submission.sprites).collect();
        let blend = self.blend;
        self.pipeline(pipeline_key(&blend));
        let pipeline = &self.pipelines[&pipeline_key(&blend)];
        let view = self.target_view()?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sprite_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sprite_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(pipeline);
            pass.set_blend_constant(blend_constant(blend.blend_factor));
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            pass.set_index_buffer(self.quad_index_buffer.slice(..), wgpu::IndexFormat::Uint16);

            for (texture, range) in &runs {
                let bind_group = &self.textures[texture.0 as usize].bind_group;
                pass.set_bind_group(1, bind_group, &[]);
                pass.draw_indexed(
                    0..QUAD_INDICES.len() as u32,
                    0,
                    range.start as u32..range.end as u32,
                );
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        for (_, range) in runs {
            self.metrics.record_sprite_draw(range.len() as u64);
        }
        Ok(())
    }
}
