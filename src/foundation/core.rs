use std::sync::Arc;

use crate::foundation::error::{SublayError, SublayResult};

pub use kurbo::Rect;

/// One positioned RGBA bitmap fragment in source presentation space.
///
/// Pixels are straight (non-premultiplied) RGBA8, row-major, tightly packed. The buffer is shared
/// behind an [`Arc`] and never mutated after the decoder produced it, which is what lets the
/// immediate GPU tier skip re-uploads by comparing buffer identity.
#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    /// Left edge in source pixels.
    pub x: u32,
    /// Top edge in source pixels.
    pub y: u32,
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// Straight-alpha RGBA8 bytes.
    pub rgba: Arc<[u8]>,
}

impl Composition {
    pub fn new(x: u32, y: u32, width: u32, height: u32, rgba: impl Into<Arc<[u8]>>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rgba: rgba.into(),
        }
    }

    /// Byte length implied by `width * height * 4`, or `None` on overflow.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(4)
    }

    pub fn validate(&self) -> SublayResult<()> {
        match self.expected_len() {
            Some(n) if n == self.rgba.len() => Ok(()),
            Some(n) => Err(SublayError::malformed_frame(format!(
                "composition {}x{} at ({}, {}) has {} bytes, expected {n}",
                self.width,
                self.height,
                self.x,
                self.y,
                self.rgba.len()
            ))),
            None => Err(SublayError::malformed_frame(format!(
                "composition {}x{} overflows the addressable size",
                self.width, self.height
            ))),
        }
    }

    /// Source-space bounds of this fragment.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x) + f64::from(self.width),
            f64::from(self.y) + f64::from(self.height),
        )
    }

    pub fn is_blank(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Everything visible at one subtitle index.
///
/// Compositions paint back-to-front in insertion order. A frame with no compositions is a valid
/// "nothing to show" result and is cached as such.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    /// Presentation width of the source coordinate space.
    pub width: u32,
    /// Presentation height of the source coordinate space.
    pub height: u32,
    pub compositions: Vec<Composition>,
}

impl Frame {
    pub fn new(width: u32, height: u32, compositions: Vec<Composition>) -> Self {
        Self {
            width,
            height,
            compositions,
        }
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self::new(width, height, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.compositions.is_empty()
    }

    pub fn composition_count(&self) -> usize {
        self.compositions.len()
    }

    pub fn composition(&self, i: usize) -> Option<&Composition> {
        self.compositions.get(i)
    }

    /// Drop compositions whose pixel buffer disagrees with their dimensions.
    ///
    /// Returns the number of compositions removed. The rest of the frame is kept.
    pub fn retain_well_formed(&mut self) -> usize {
        let before = self.compositions.len();
        self.compositions.retain(|c| match c.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed composition");
                false
            }
        });
        before - self.compositions.len()
    }
}

/// Native channel order of a render surface.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceFormat {
    #[default]
    Rgba8,
    Bgra8,
}

impl SurfaceFormat {
    /// Whether RGBA source texels must have red and blue swapped on upload.
    pub fn swaps_red_blue(self) -> bool {
        matches!(self, Self::Bgra8)
    }
}

/// Output surface dimensions in pixels plus its channel order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceDesc {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub format: SurfaceFormat,
}

impl SurfaceDesc {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: SurfaceFormat::Rgba8,
        }
    }

    pub fn with_format(mut self, format: SurfaceFormat) -> Self {
        self.format = format;
        self
    }

    pub fn validate(&self) -> SublayResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SublayError::validation(format!(
                "surface must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    pub fn byte_len(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }
}
