use crate::{
    foundation::core::{Composition, Rect, SurfaceDesc},
    render::backend::DrawParams,
};

/// Scale `unscaled` by `(scale_x, scale_y)`, keeping it horizontally centered on the original box
/// and its bottom edge anchored, then shift vertically by `offset_y` pixels.
///
/// Subtitles grow outward from their center and upward from their baseline.
pub fn anchored_scale(unscaled: Rect, scale_x: f64, scale_y: f64, offset_y: f64) -> Rect {
    let w = unscaled.width();
    let h = unscaled.height();
    let sw = w * scale_x;
    let sh = h * scale_y;
    let x = unscaled.x0 + (w - sw) * 0.5;
    let y = unscaled.y0 + h - sh + offset_y;
    Rect::new(x, y, x + sw, y + sh)
}

/// Map a source-space box into surface pixels.
pub fn source_to_surface(bounds: Rect, params: &DrawParams, surface: SurfaceDesc) -> Rect {
    let sx = axis_ratio(surface.width, params.source_width);
    let sy = axis_ratio(surface.height, params.source_height);
    Rect::new(
        bounds.x0 * sx,
        bounds.y0 * sy,
        bounds.x1 * sx,
        bounds.y1 * sy,
    )
}

/// Destination rectangle of `comp` on `surface`, in surface pixels.
pub fn dest_rect(comp: &Composition, params: &DrawParams, surface: SurfaceDesc) -> Rect {
    anchored_scale(
        source_to_surface(comp.bounds(), params, surface),
        params.scale_x,
        params.scale_y,
        params.offset_y,
    )
}

fn axis_ratio(surface: u32, source: u32) -> f64 {
    if source == 0 {
        1.0
    } else {
        f64::from(surface) / f64::from(source)
    }
}

/// Rect packed as `[x, y, w, h]` for shader upload.
pub fn rect_xywh(rect: Rect) -> [f32; 4] {
    [
        rect.x0 as f32,
        rect.y0 as f32,
        rect.width() as f32,
        rect.height() as f32,
    ]
}

#[cfg(test)]
#[path = "../../tests/unit/render/geometry.rs"]
mod tests;
