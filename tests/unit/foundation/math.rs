use super::*;

fn reference(c: u8, a: u8) -> u8 {
    ((f64::from(c) * f64::from(a) / 255.0) + 0.5).floor() as u8
}

#[test]
fn mul_div255_variants_align() {
    for x in [0u16, 1, 127, 255] {
        for y in [0u16, 1, 127, 255] {
            assert_eq!(u16::from(mul_div255_u8(x, y)), mul_div255_u16(x, y));
        }
    }
}

#[test]
fn opaque_texels_pass_through() {
    assert_eq!(premultiply_px(12, 200, 99, 255), [12, 200, 99, 255]);
}

#[test]
fn transparent_texels_collapse_to_zero() {
    assert_eq!(premultiply_px(255, 128, 7, 0), [0, 0, 0, 0]);
}

#[test]
fn premultiply_matches_rounded_reference() {
    for a in [1u8, 2, 64, 127, 128, 200, 254] {
        for c in [0u8, 1, 3, 100, 128, 201, 255] {
            let [r, g, b, out_a] = premultiply_px(c, c, c, a);
            assert_eq!(out_a, a);
            assert_eq!(r, reference(c, a), "c={c} a={a}");
            assert_eq!(g, r);
            assert_eq!(b, r);
        }
    }
}

#[test]
fn premultiply_into_swaps_for_bgra_surfaces() {
    let src = [200u8, 100, 50, 128, 10, 20, 30, 255];
    let mut dst = Vec::new();

    premultiply_into(&src, &mut dst, SurfaceFormat::Rgba8);
    assert_eq!(dst, vec![100, 50, 25, 128, 10, 20, 30, 255]);

    premultiply_into(&src, &mut dst, SurfaceFormat::Bgra8);
    assert_eq!(dst, vec![25, 50, 100, 128, 30, 20, 10, 255]);
}

#[test]
fn premultiply_into_reuses_and_shrinks_scratch() {
    let mut dst = vec![9u8; 64];
    premultiply_into(&[1, 2, 3, 255], &mut dst, SurfaceFormat::Rgba8);
    assert_eq!(dst, vec![1, 2, 3, 255]);
}

#[test]
fn unpremultiply_inverts_within_rounding() {
    assert_eq!(unpremultiply_px(0, 0, 0, 0), [0, 0, 0, 0]);
    assert_eq!(unpremultiply_px(4, 5, 6, 255), [4, 5, 6, 255]);
    for a in [3u8, 64, 128, 200] {
        for c in [0u8, 90, 255] {
            let [r, _, _, _] = premultiply_px(c, c, c, a);
            let [back, _, _, out_a] = unpremultiply_px(r, r, r, a);
            assert_eq!(out_a, a);
            assert!(
                (i16::from(back) - i16::from(c)).abs() <= (255 / i16::from(a)) + 1,
                "c={c} a={a} back={back}"
            );
        }
    }
}
