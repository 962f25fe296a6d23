use crate::{
    foundation::{
        core::SurfaceFormat,
        error::{SublayError, SublayResult},
    },
    render::backend::FrameRGBA,
};

/// Adapter selection for one tier.
pub(crate) struct ContextRequest {
    pub label: &'static str,
    pub backends: wgpu::Backends,
    pub limits: wgpu::Limits,
    /// Downlevel capabilities the tier's shaders rely on.
    pub required_downlevel: wgpu::DownlevelFlags,
}

pub(crate) struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub fn new(req: &ContextRequest) -> SublayResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: req.backends,
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                SublayError::initialization(format!("{}: no gpu adapter available", req.label))
            }
            other => SublayError::initialization(format!(
                "{}: wgpu request_adapter failed: {other:?}",
                req.label
            )),
        })?;

        let caps = adapter.get_downlevel_capabilities();
        if !caps.flags.contains(req.required_downlevel) {
            return Err(SublayError::initialization(format!(
                "{}: adapter lacks {:?}",
                req.label,
                req.required_downlevel.difference(caps.flags)
            )));
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some(req.label),
            required_features: wgpu::Features::empty(),
            required_limits: req.limits.clone().using_resolution(adapter.limits()),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| {
            SublayError::initialization(format!("{}: wgpu request_device failed: {e:?}", req.label))
        })?;

        let adapter_info = adapter.get_info();
        tracing::debug!(
            tier = req.label,
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "gpu device ready"
        );
        Ok(Self { device, queue })
    }
}

/// Captures validation and out-of-memory errors raised between `push` and `finish`.
///
/// Out-of-memory maps to [`SublayError::ResourceExhaustion`], validation errors to
/// [`SublayError::Validation`].
pub(crate) struct ErrorScope {
    device: wgpu::Device,
    label: &'static str,
}

impl ErrorScope {
    pub fn push(device: &wgpu::Device, label: &'static str) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        Self {
            device: device.clone(),
            label,
        }
    }

    pub fn finish(self) -> SublayResult<()> {
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = oom {
            return Err(SublayError::resource_exhaustion(format!(
                "{}: {err}",
                self.label
            )));
        }
        if let Some(err) = validation {
            return Err(SublayError::validation(format!("{}: {err}", self.label)));
        }
        Ok(())
    }
}

pub(crate) fn texture_format(format: SurfaceFormat) -> wgpu::TextureFormat {
    match format {
        SurfaceFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        SurfaceFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
    }
}

pub(crate) fn sampled_texture(
    device: &wgpu::Device,
    label: &'static str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

pub(crate) fn write_texture(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
    texels: &[u8],
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        texels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

pub(crate) fn nearest_sampler(device: &wgpu::Device, label: &'static str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Offscreen color target plus its readback buffer.
pub(crate) struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    readback: wgpu::Buffer,
    padded_bytes_per_row: u32,
}

impl RenderTarget {
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> SublayResult<Self> {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sublay_target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let unpadded = width
            .checked_mul(4)
            .ok_or_else(|| SublayError::validation("render target width overflow"))?;
        let padded_bytes_per_row = align_to(unpadded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let size = u64::from(padded_bytes_per_row)
            .checked_mul(u64::from(height))
            .ok_or_else(|| SublayError::validation("readback buffer size overflow"))?;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sublay_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            texture,
            view,
            format,
            width,
            height,
            readback,
            padded_bytes_per_row,
        })
    }

    /// Copy the target back to tightly packed rows in the texture's channel order.
    pub fn read(&self, ctx: &GpuContext) -> SublayResult<Vec<u8>> {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sublay_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(Some(encoder.finish()));

        let slice = self.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        ctx.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| SublayError::validation(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| SublayError::validation("readback channel closed"))?
            .map_err(|e| SublayError::validation(format!("readback map failed: {e:?}")))?;

        let mapped = slice.get_mapped_range();
        let row_bytes = (self.width as usize) * 4;
        let padded = self.padded_bytes_per_row as usize;
        let mut out = Vec::with_capacity(row_bytes * self.height as usize);
        for row in 0..self.height as usize {
            let start = row * padded;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        self.readback.unmap();
        Ok(out)
    }

    pub fn frame(&self, ctx: &GpuContext, format: SurfaceFormat) -> SublayResult<FrameRGBA> {
        Ok(FrameRGBA {
            width: self.width,
            height: self.height,
            data: self.read(ctx)?,
            premultiplied: true,
            format,
        })
    }

    pub fn destroy(&self) {
        self.texture.destroy();
        self.readback.destroy();
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
