use crate::foundation::core::SurfaceFormat;

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Premultiply one straight-alpha texel: `c * a / 255`, rounded half-up.
#[inline]
pub fn premultiply_px(r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
    match a {
        255 => [r, g, b, a],
        0 => [0, 0, 0, 0],
        _ => {
            let a16 = u16::from(a);
            [
                mul_div255_u8(u16::from(r), a16),
                mul_div255_u8(u16::from(g), a16),
                mul_div255_u8(u16::from(b), a16),
                a,
            ]
        }
    }
}

/// Inverse of [`premultiply_px`], up to rounding. Transparent texels become `(0, 0, 0, 0)`.
#[inline]
pub fn unpremultiply_px(r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
    match a {
        255 => [r, g, b, a],
        0 => [0, 0, 0, 0],
        _ => {
            let a32 = u32::from(a);
            let un = |c: u8| ((u32::from(c) * 255 + a32 / 2) / a32).min(255) as u8;
            [un(r), un(g), un(b), a]
        }
    }
}

/// Premultiply a straight RGBA8 buffer into `dst`, writing texels in `format` channel order.
///
/// `dst` is a scratch buffer; it is resized to `src.len()` and fully overwritten.
pub fn premultiply_into(src: &[u8], dst: &mut Vec<u8>, format: SurfaceFormat) {
    dst.resize(src.len(), 0);
    let swap = format.swaps_red_blue();
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let [r, g, b, a] = premultiply_px(s[0], s[1], s[2], s[3]);
        if swap {
            d.copy_from_slice(&[b, g, r, a]);
        } else {
            d.copy_from_slice(&[r, g, b, a]);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
