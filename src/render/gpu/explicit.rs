use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    foundation::{
        core::{Composition, SurfaceDesc},
        error::{SublayError, SublayResult},
        math::premultiply_into,
    },
    render::{
        backend::{BackendKind, DrawParams, FrameRGBA, RenderBackend},
        geometry::{dest_rect, rect_xywh},
        gpu::{
            context::{
                ContextRequest, ErrorScope, GpuContext, RenderTarget, nearest_sampler,
                sampled_texture, texture_format, write_texture,
            },
            shaders::{EXPLICIT_WGSL, Globals},
        },
        release::ReleaseQueue,
    },
};

const LABEL: &str = "explicit-gpu";
const RECT_BYTES: u64 = 16;

struct SlotTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// One composition slot: a storage buffer for its rect and a texture sized to its bitmap.
struct Slot {
    rect: wgpu::Buffer,
    texture: Option<SlotTexture>,
}

/// Explicit GPU tier: wgpu on Vulkan/Metal/DX12, all draws batched into one submission.
pub struct ExplicitGpuBackend {
    ctx: GpuContext,
    surface: SurfaceDesc,
    target: RenderTarget,
    pipeline: wgpu::RenderPipeline,
    globals: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    slot_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    slots: Vec<Slot>,
    scratch: Vec<u8>,
    release: ReleaseQueue<wgpu::Texture>,
    completed: Arc<AtomicU64>,
    destroyed: bool,
}

impl ExplicitGpuBackend {
    pub fn new(surface: SurfaceDesc) -> SublayResult<Self> {
        surface.validate()?;
        let ctx = GpuContext::new(&ContextRequest {
            label: LABEL,
            backends: wgpu::Backends::PRIMARY,
            limits: wgpu::Limits::downlevel_defaults(),
            required_downlevel: wgpu::DownlevelFlags::VERTEX_STORAGE,
        })?;
        let device = &ctx.device;
        let format = texture_format(surface.format);

        let scope = ErrorScope::push(device, LABEL);
        let (pipeline, globals_layout, slot_layout) = build_pipeline(device, format);
        let target = RenderTarget::new(device, surface.width, surface.height, format);
        let globals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sublay_explicit_globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sublay_explicit_globals_bg"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals.as_entire_binding(),
            }],
        });
        let sampler = nearest_sampler(device, "sublay_explicit_sampler");
        scope
            .finish()
            .map_err(|e| SublayError::initialization(e.to_string()))?;
        let target = target?;
        ctx.queue.write_buffer(
            &globals,
            0,
            bytemuck::bytes_of(&Globals::new(surface.width, surface.height)),
        );
        tracing::debug!(width = surface.width, height = surface.height, "explicit gpu tier ready");

        Ok(Self {
            ctx,
            surface,
            target,
            pipeline,
            globals,
            globals_bind_group,
            slot_layout,
            sampler,
            slots: Vec::new(),
            scratch: Vec::new(),
            release: ReleaseQueue::new(),
            completed: Arc::new(AtomicU64::new(0)),
            destroyed: false,
        })
    }

    fn ensure_live(&self) -> SublayResult<()> {
        if self.destroyed {
            return Err(SublayError::initialization("explicit gpu backend has been destroyed"));
        }
        Ok(())
    }

    /// Grow the pool to `n` slots. Slots are never removed.
    fn grow_slots(&mut self, n: usize) {
        while self.slots.len() < n {
            let rect = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sublay_explicit_rect"),
                size: RECT_BYTES,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.slots.push(Slot {
                rect,
                texture: None,
            });
        }
    }

    /// Upload `comp` into slot `i`, replacing the slot texture when the size changed.
    fn upload(&mut self, i: usize, comp: &Composition, params: &DrawParams) {
        let device = &self.ctx.device;
        let slot = &mut self.slots[i];
        let reusable = slot
            .texture
            .as_ref()
            .is_some_and(|t| t.width == comp.width && t.height == comp.height);
        if !reusable {
            if let Some(old) = slot.texture.take() {
                self.release.defer(old.texture);
            }
            let (texture, view) = sampled_texture(
                device,
                "sublay_explicit_slot",
                comp.width,
                comp.height,
                self.target.format,
            );
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("sublay_explicit_slot_bg"),
                layout: &self.slot_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: slot.rect.as_entire_binding(),
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
            slot.texture = Some(SlotTexture {
                texture,
                bind_group,
                width: comp.width,
                height: comp.height,
            });
        }

        premultiply_into(&comp.rgba, &mut self.scratch, self.surface.format);
        if let Some(t) = slot.texture.as_ref() {
            write_texture(&self.ctx.queue, &t.texture, comp.width, comp.height, &self.scratch);
        }
        let rect = rect_xywh(dest_rect(comp, params, self.surface));
        self.ctx
            .queue
            .write_buffer(&slot.rect, 0, bytemuck::bytes_of(&rect));
    }

    fn encode_and_submit(&mut self, drawn: &[usize]) {
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sublay_explicit_encoder"),
            });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sublay_explicit_rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, &self.globals_bind_group, &[]);
            for &i in drawn {
                if let Some(t) = self.slots[i].texture.as_ref() {
                    rp.set_bind_group(1, &t.bind_group, &[]);
                    rp.draw(0..6, 0..1);
                }
            }
        }
        self.ctx.queue.submit(Some(encoder.finish()));

        let generation = self.release.mark_submitted();
        let completed = Arc::clone(&self.completed);
        self.ctx.queue.on_submitted_work_done(move || {
            completed.fetch_max(generation, Ordering::Release);
        });
    }

    /// Destroy textures whose submissions have finished.
    fn collect_released(&mut self) {
        if let Err(e) = self.ctx.device.poll(wgpu::PollType::Poll) {
            tracing::debug!(error = ?e, "explicit gpu poll failed");
        }
        let done = self.completed.load(Ordering::Acquire);
        let n = self.release.release_through(done, |t| t.destroy());
        if n > 0 {
            tracing::trace!(released = n, "released slot textures");
        }
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout, wgpu::BindGroupLayout) {
    let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("sublay_explicit_globals_bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Globals>() as u64),
            },
            count: None,
        }],
    });
    let slot_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("sublay_explicit_slot_bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(RECT_BYTES),
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
        label: Some("sublay_explicit_shader"),
        source: wgpu::ShaderSource::Wgsl(EXPLICIT_WGSL.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("sublay_explicit_pl"),
        bind_group_layouts: &[&globals_layout, &slot_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("sublay_explicit_pipeline"),
        layout: Some(&layout),
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
                format,
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
    (pipeline, globals_layout, slot_layout)
}

impl RenderBackend for ExplicitGpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ExplicitGpu
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
        let target = RenderTarget::new(&self.ctx.device, width, height, self.target.format);
        scope.finish()?;
        let old = std::mem::replace(&mut self.target, target?);
        // The old target may still be referenced by an in-flight batch.
        self.release.defer(old.texture);
        self.surface = next;
        self.ctx.queue.write_buffer(
            &self.globals,
            0,
            bytemuck::bytes_of(&Globals::new(width, height)),
        );
        Ok(())
    }

    fn render(&mut self, compositions: &[Composition], params: &DrawParams) -> SublayResult<()> {
        self.ensure_live()?;
        let drawable: Vec<&Composition> = compositions
            .iter()
            .filter(|c| !c.is_blank() && c.validate().is_ok())
            .collect();

        let scope = ErrorScope::push(&self.ctx.device, LABEL);
        self.grow_slots(drawable.len());
        for (i, comp) in drawable.iter().enumerate() {
            self.upload(i, comp, params);
        }
        let drawn: Vec<usize> = (0..drawable.len()).collect();
        self.encode_and_submit(&drawn);
        let outcome = scope.finish();
        self.collect_released();
        outcome
    }

    fn clear(&mut self) -> SublayResult<()> {
        self.ensure_live()?;
        self.encode_and_submit(&[]);
        self.collect_released();
        Ok(())
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Err(e) = self.ctx.device.poll(wgpu::PollType::wait_indefinitely()) {
            tracing::debug!(error = ?e, "explicit gpu poll failed during destroy");
        }
        self.release.release_all(|t| t.destroy());
        for slot in self.slots.drain(..) {
            if let Some(t) = slot.texture {
                t.texture.destroy();
            }
            slot.rect.destroy();
        }
        self.globals.destroy();
        self.target.destroy();
        self.scratch = Vec::new();
    }

    fn read_pixels(&mut self) -> SublayResult<FrameRGBA> {
        self.ensure_live()?;
        self.target.frame(&self.ctx, self.surface.format)
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl Drop for ExplicitGpuBackend {
    fn drop(&mut self) {
        self.destroy();
    }
}
