use crate::foundation::{
    core::{Composition, SurfaceDesc, SurfaceFormat},
    error::{SublayError, SublayResult},
    math::unpremultiply_px,
};

/// Surface pixels read back from a backend.
///
/// Bytes are in the surface's native channel order (`format`) and, for every built-in tier,
/// **premultiplied** alpha.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
    /// Channel order of `data`.
    pub format: SurfaceFormat,
}

impl FrameRGBA {
    /// Pixel at `(x, y)` reordered to RGBA, or `None` when out of bounds.
    pub fn rgba_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let px = self.data.get(i..i + 4)?;
        Some(match self.format {
            SurfaceFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
            SurfaceFormat::Bgra8 => [px[2], px[1], px[0], px[3]],
        })
    }

    /// Straight-alpha RGBA8 copy of the pixels, as image encoders expect.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(4) {
            let [r, g, b, a] = match self.format {
                SurfaceFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
                SurfaceFormat::Bgra8 => [px[2], px[1], px[0], px[3]],
            };
            if self.premultiplied {
                out.extend_from_slice(&unpremultiply_px(r, g, b, a));
            } else {
                out.extend_from_slice(&[r, g, b, a]);
            }
        }
        out
    }

    pub fn is_transparent(&self) -> bool {
        self.data.chunks_exact(4).all(|px| px[3] == 0)
    }
}

/// Caller-side placement parameters shared by every tier.
///
/// `source_*` is the presentation space compositions are positioned in; the backend maps it onto
/// its surface. `scale_*` grows each composition around its bottom-center and `offset_y` shifts
/// it vertically, in surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawParams {
    pub source_width: u32,
    pub source_height: u32,
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_y: f64,
}

impl DrawParams {
    pub fn unscaled(source_width: u32, source_height: u32) -> Self {
        Self {
            source_width,
            source_height,
            scale_x: 1.0,
            scale_y: 1.0,
            offset_y: 0.0,
        }
    }
}

/// A render tier: uploads compositions and draws them blended onto its surface.
///
/// Tiers are constructed already bound to a surface (see [`create_backend`]). Once
/// [`RenderBackend::destroy`] has run a tier rejects further rendering.
pub trait RenderBackend {
    fn kind(&self) -> BackendKind;

    fn surface(&self) -> SurfaceDesc;

    /// Resize the output surface. Contents are undefined until the next render or clear.
    fn resize(&mut self, width: u32, height: u32) -> SublayResult<()>;

    /// Clear the surface and draw `compositions` back-to-front.
    fn render(&mut self, compositions: &[Composition], params: &DrawParams) -> SublayResult<()>;

    /// Clear the surface to transparent.
    fn clear(&mut self) -> SublayResult<()>;

    /// Release every resource held by the tier.
    fn destroy(&mut self);

    /// Copy the current surface contents back to the CPU.
    fn read_pixels(&mut self) -> SublayResult<FrameRGBA>;

    /// Composition slots currently holding resources.
    fn slot_count(&self) -> usize {
        0
    }
}

/// Available render tiers, in cascade order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Explicit GPU pipeline (wgpu over Vulkan/Metal/DX12). Requires the `gpu` feature.
    ExplicitGpu,
    /// Immediate GPU pipeline (wgpu over GL/GLES). Requires the `gpu` feature.
    ImmediateGpu,
    /// CPU compositing. Always available.
    Software,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::ExplicitGpu => "explicit-gpu",
            Self::ImmediateGpu => "immediate-gpu",
            Self::Software => "software",
        }
    }

    /// Tiers compiled into this build, best first.
    pub fn default_cascade() -> Vec<Self> {
        if cfg!(feature = "gpu") {
            vec![Self::ExplicitGpu, Self::ImmediateGpu, Self::Software]
        } else {
            vec![Self::Software]
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = SublayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "explicit-gpu" | "explicit" | "wgpu" => Ok(Self::ExplicitGpu),
            "immediate-gpu" | "immediate" | "gl" => Ok(Self::ImmediateGpu),
            "software" | "cpu" => Ok(Self::Software),
            other => Err(SublayError::validation(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

/// Create a render tier bound to `surface`.
///
/// - `BackendKind::Software` is always available.
/// - GPU tiers fail with an initialization error when the `gpu` feature is off or the device
///   lacks the capabilities they need.
pub fn create_backend(
    kind: BackendKind,
    surface: SurfaceDesc,
) -> SublayResult<Box<dyn RenderBackend>> {
    surface.validate()?;
    match kind {
        BackendKind::Software => Ok(Box::new(crate::render::software::SoftwareBackend::new(
            surface,
        )?)),
        #[cfg(feature = "gpu")]
        BackendKind::ExplicitGpu => Ok(Box::new(
            crate::render::gpu::explicit::ExplicitGpuBackend::new(surface)?,
        )),
        #[cfg(feature = "gpu")]
        BackendKind::ImmediateGpu => Ok(Box::new(
            crate::render::gpu::immediate::ImmediateGpuBackend::new(surface)?,
        )),
        #[allow(unreachable_patterns)]
        _ => Err(SublayError::initialization(format!(
            "{kind} backend is not compiled into this build"
        ))),
    }
}
