use crate::{
    foundation::{
        core::{Composition, SurfaceDesc},
        error::{SublayError, SublayResult},
        math::premultiply_into,
    },
    render::{
        backend::{BackendKind, DrawParams, FrameRGBA, RenderBackend},
        composite::{PremulImage, blit_over},
        geometry::dest_rect,
    },
};

/// CPU compositing tier.
///
/// The surface is a premultiplied buffer in the surface's channel order. Each composition is
/// premultiplied into one reusable scratch buffer, then scaled onto the surface.
pub struct SoftwareBackend {
    surface: SurfaceDesc,
    target: Vec<u8>,
    scratch: Vec<u8>,
    slots: usize,
    destroyed: bool,
}

impl SoftwareBackend {
    pub fn new(surface: SurfaceDesc) -> SublayResult<Self> {
        surface.validate()?;
        Ok(Self {
            surface,
            target: vec![0u8; surface.byte_len()],
            scratch: Vec::new(),
            slots: 0,
            destroyed: false,
        })
    }

    fn ensure_live(&self) -> SublayResult<()> {
        if self.destroyed {
            return Err(SublayError::initialization(
                "software backend has been destroyed",
            ));
        }
        Ok(())
    }

    fn draw_one(&mut self, comp: &Composition, params: &DrawParams) -> SublayResult<()> {
        if comp.is_blank() {
            return Ok(());
        }
        if let Err(e) = comp.validate() {
            tracing::warn!(error = %e, "skipping malformed composition");
            return Ok(());
        }
        premultiply_into(&comp.rgba, &mut self.scratch, self.surface.format);
        let dest = dest_rect(comp, params, self.surface);
        blit_over(
            &mut self.target,
            self.surface.width,
            self.surface.height,
            PremulImage {
                width: comp.width,
                height: comp.height,
                data: &self.scratch,
            },
            dest,
        )
    }
}

impl RenderBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn surface(&self) -> SurfaceDesc {
        self.surface
    }

    fn resize(&mut self, width: u32, height: u32) -> SublayResult<()> {
        self.ensure_live()?;
        let next = SurfaceDesc { width, height, ..self.surface };
        next.validate()?;
        self.surface = next;
        self.target.clear();
        self.target.resize(next.byte_len(), 0);
        Ok(())
    }

    fn render(&mut self, compositions: &[Composition], params: &DrawParams) -> SublayResult<()> {
        self.ensure_live()?;
        self.target.fill(0);
        for comp in compositions {
            self.draw_one(comp, params)?;
        }
        self.slots = compositions.len();
        Ok(())
    }

    fn clear(&mut self) -> SublayResult<()> {
        self.ensure_live()?;
        self.target.fill(0);
        Ok(())
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.slots = 0;
        self.target = Vec::new();
        self.scratch = Vec::new();
    }

    fn read_pixels(&mut self) -> SublayResult<FrameRGBA> {
        self.ensure_live()?;
        Ok(FrameRGBA {
            width: self.surface.width,
            height: self.surface.height,
            data: self.target.clone(),
            premultiplied: true,
            format: self.surface.format,
        })
    }

    fn slot_count(&self) -> usize {
        self.slots
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/software.rs"]
mod tests;
