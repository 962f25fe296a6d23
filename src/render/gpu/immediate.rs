use std::sync::Arc;

use crate::{
    foundation::{
        core::{Composition, SurfaceDesc, SurfaceFormat},
        error::{SublayError, SublayResult},
        math::premultiply_into,
    },
    render::{
        backend::{BackendKind, DrawParams, FrameRGBA, RenderBackend},
        geometry::{dest_rect, rect_xywh},
        gpu::{
            context::{
                ContextRequest, ErrorScope, GpuContext, RenderTarget, nearest_sampler,
                sampled_texture, write_texture,
            },
            shaders::{Globals, IMMEDIATE_WGSL, ImmediateParams},
        },
    },
};

const LABEL: &str = "immediate-gpu";
const TEXEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct Slot {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
    /// Pixel buffer last uploaded into `texture`.
    source: Arc<[u8]>,
}

/// Immediate GPU tier: wgpu on GL/GLES with one shared program and a uniform rewritten per draw.
///
/// Every draw is its own submission and each render ends with a blocking poll, so slot textures
/// can be freed as soon as the render returns.
pub struct ImmediateGpuBackend {
    ctx: GpuContext,
    surface: SurfaceDesc,
    target: RenderTarget,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    sampler: wgpu::Sampler,
    slots: Vec<Slot>,
    scratch: Vec<u8>,
    uploads_skipped: u64,
    destroyed: bool,
}

impl ImmediateGpuBackend {
    pub fn new(surface: SurfaceDesc) -> SublayResult<Self> {
        surface.validate()?;
        let ctx = GpuContext::new(&ContextRequest {
            label: LABEL,
            backends: wgpu::Backends::GL,
            limits: wgpu::Limits::downlevel_webgl2_defaults(),
            required_downlevel: wgpu::DownlevelFlags::empty(),
        })?;
        let device = &ctx.device;

        let scope = ErrorScope::push(device, LABEL);
        let (pipeline, layout) = build_program(device);
        let target = RenderTarget::new(device, surface.width, surface.height, TEXEL_FORMAT);
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sublay_immediate_params"),
            size: std::mem::size_of::<ImmediateParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = nearest_sampler(device, "sublay_immediate_sampler");
        scope
            .finish()
            .map_err(|e| SublayError::initialization(e.to_string()))?;
        let target = target?;
        tracing::debug!(width = surface.width, height = surface.height, "immediate gpu tier ready");

        Ok(Self {
            ctx,
            surface,
            target,
            pipeline,
            layout,
            params,
            sampler,
            slots: Vec::new(),
            scratch: Vec::new(),
            uploads_skipped: 0,
            destroyed: false,
        })
    }

    /// Uploads avoided because a slot already held the same pixel buffer.
    pub fn uploads_skipped(&self) -> u64 {
        self.uploads_skipped
    }

    fn ensure_live(&self) -> SublayResult<()> {
        if self.destroyed {
            return Err(SublayError::initialization("immediate gpu backend has been destroyed"));
        }
        Ok(())
    }

    fn new_slot(&self, comp: &Composition) -> Slot {
        let (texture, view) = sampled_texture(
            &self.ctx.device,
            "sublay_immediate_slot",
            comp.width,
            comp.height,
            TEXEL_FORMAT,
        );
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sublay_immediate_slot_bg"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        Slot {
            texture,
            bind_group,
            width: comp.width,
            height: comp.height,
            source: Arc::clone(&comp.rgba),
        }
    }

    /// Make slot `i` hold `comp`'s pixels, uploading only when the buffer changed.
    fn bind_slot(&mut self, i: usize, comp: &Composition) {
        let fits = self
            .slots
            .get(i)
            .is_some_and(|s| s.width == comp.width && s.height == comp.height);
        if fits && Arc::ptr_eq(&self.slots[i].source, &comp.rgba) {
            self.uploads_skipped += 1;
            return;
        }
        if !fits {
            let slot = self.new_slot(comp);
            if i < self.slots.len() {
                let old = std::mem::replace(&mut self.slots[i], slot);
                old.texture.destroy();
            } else {
                self.slots.push(slot);
            }
        }
        premultiply_into(&comp.rgba, &mut self.scratch, SurfaceFormat::Rgba8);
        let slot = &mut self.slots[i];
        write_texture(
            &self.ctx.queue,
            &slot.texture,
            comp.width,
            comp.height,
            &self.scratch,
        );
        slot.source = Arc::clone(&comp.rgba);
    }

    fn submit_pass(&self, load: wgpu::LoadOp<wgpu::Color>, slot: Option<usize>) {
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sublay_immediate_encoder"),
            });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sublay_immediate_rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(s) = slot.and_then(|i| self.slots.get(i)) {
                rp.set_pipeline(&self.pipeline);
                rp.set_bind_group(0, &s.bind_group, &[]);
                rp.draw(0..6, 0..1);
            }
        }
        self.ctx.queue.submit(Some(encoder.finish()));
    }

    fn wait_idle(&self) -> SublayResult<()> {
        self.ctx
            .device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| SublayError::validation(format!("wgpu poll failed: {e:?}")))
    }
}

fn build_program(device: &wgpu::Device) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("sublay_immediate_bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ImmediateParams>() as u64,
                    ),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("sublay_immediate_shader"),
        source: wgpu::ShaderSource::Wgsl(IMMEDIATE_WGSL.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("sublay_immediate_pl"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("sublay_immediate_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: TEXEL_FORMAT,
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });
    (pipeline, layout)
}

impl RenderBackend for ImmediateGpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ImmediateGpu
    }

    fn surface(&self) -> SurfaceDesc {
        self.surface
    }

    fn resize(&mut self, width: u32, height: u32) -> SublayResult<()> {
        self.ensure_live()?;
        let next = SurfaceDesc {
            width,
            height,
            ..self.surface
        };
        next.validate()?;
        if next == self.surface {
            return Ok(());
        }
        let scope = ErrorScope::push(&self.ctx.device, LABEL);
        let target = RenderTarget::new(&self.ctx.device, width, height, TEXEL_FORMAT);
        scope.finish()?;
        let old = std::mem::replace(&mut self.target, target?);
        old.destroy();
        self.surface = next;
        Ok(())
    }

    fn render(&mut self, compositions: &[Composition], params: &DrawParams) -> SublayResult<()> {
        self.ensure_live()?;
        let globals = Globals::new(self.surface.width, self.surface.height);

        let scope = ErrorScope::push(&self.ctx.device, LABEL);
        self.submit_pass(wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT), None);
        let mut live = 0;
        for comp in compositions {
            if comp.is_blank() || comp.validate().is_err() {
                continue;
            }
            self.bind_slot(live, comp);
            let block = ImmediateParams {
                globals,
                rect: rect_xywh(dest_rect(comp, params, self.surface)),
            };
            self.ctx
                .queue
                .write_buffer(&self.params, 0, bytemuck::bytes_of(&block));
            self.submit_pass(wgpu::LoadOp::Load, Some(live));
            live += 1;
        }
        for stale in self.slots.drain(live..) {
            stale.texture.destroy();
        }
        let idle = self.wait_idle();
        scope.finish()?;
        idle
    }

    fn clear(&mut self) -> SublayResult<()> {
        self.ensure_live()?;
        self.submit_pass(wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT), None);
        self.wait_idle()
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Err(e) = self.wait_idle() {
            tracing::debug!(error = %e, "immediate gpu poll failed during destroy");
        }
        for slot in self.slots.drain(..) {
            slot.texture.destroy();
        }
        self.params.destroy();
        self.target.destroy();
        self.scratch = Vec::new();
    }

    fn read_pixels(&mut self) -> SublayResult<FrameRGBA> {
        self.ensure_live()?;
        let mut data = self.target.read(&self.ctx)?;
        if self.surface.format.swaps_red_blue() {
            for px in data.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        Ok(FrameRGBA {
            width: self.surface.width,
            height: self.surface.height,
            data,
            premultiplied: true,
            format: self.surface.format,
        })
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl Drop for ImmediateGpuBackend {
    fn drop(&mut self) {
        self.destroy();
    }
}
