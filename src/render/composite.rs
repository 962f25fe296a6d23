use crate::foundation::{
    core::Rect,
    error::{SublayError, SublayResult},
    math::mul_div255_u8,
};

pub type PremulRgba8 = [u8; 4];

/// Premultiplied source-over: `dst * (1 - src.a) + src`.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    match src[3] {
        0 => dst,
        255 => src,
        sa => {
            let inv = 255u16 - u16::from(sa);
            let mut out = src;
            for (o, d) in out.iter_mut().zip(dst) {
                *o = o.saturating_add(mul_div255_u8(u16::from(d), inv));
            }
            out
        }
    }
}

/// Premultiplied source image handed to [`blit_over`].
#[derive(Clone, Copy, Debug)]
pub struct PremulImage<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

/// Nearest-neighbour scale `src` into `dest` on a `dst_width x dst_height` target, blending with
/// [`over`]. Pixels whose centers fall outside `dest` or the target are left untouched.
pub fn blit_over(
    dst: &mut [u8],
    dst_width: u32,
    dst_height: u32,
    src: PremulImage<'_>,
    dest: Rect,
) -> SublayResult<()> {
    let expected_dst = (dst_width as usize) * (dst_height as usize) * 4;
    let expected_src = (src.width as usize) * (src.height as usize) * 4;
    if dst.len() != expected_dst || src.data.len() != expected_src {
        return Err(SublayError::validation(
            "blit_over expects buffers matching width*height*4",
        ));
    }
    if src.width == 0 || src.height == 0 || dest.width() <= 0.0 || dest.height() <= 0.0 {
        return Ok(());
    }

    let (x_start, x_end) = center_span(dest.x0, dest.x1, dst_width);
    let (y_start, y_end) = center_span(dest.y0, dest.y1, dst_height);
    let u_step = f64::from(src.width) / dest.width();
    let v_step = f64::from(src.height) / dest.height();

    for y in y_start..y_end {
        let v = ((f64::from(y) + 0.5 - dest.y0) * v_step).floor();
        let sy = (v.max(0.0) as u32).min(src.height - 1) as usize;
        let src_row = sy * src.width as usize * 4;
        let dst_row = (y as usize) * (dst_width as usize) * 4;
        for x in x_start..x_end {
            let u = ((f64::from(x) + 0.5 - dest.x0) * u_step).floor();
            let sx = (u.max(0.0) as u32).min(src.width - 1) as usize;
            let si = src_row + sx * 4;
            let di = dst_row + (x as usize) * 4;
            let s = [
                src.data[si],
                src.data[si + 1],
                src.data[si + 2],
                src.data[si + 3],
            ];
            let d = [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]];
            dst[di..di + 4].copy_from_slice(&over(d, s));
        }
    }
    Ok(())
}

/// Half-open range of target pixels whose centers lie in `[lo, hi)`, clipped to `[0, limit)`.
fn center_span(lo: f64, hi: f64, limit: u32) -> (u32, u32) {
    let clip = |v: f64| v.clamp(0.0, f64::from(limit)) as u32;
    let start = clip((lo - 0.5).ceil());
    let end = clip((hi - 0.5).ceil());
    (start, end.max(start))
}
