use super::*;
use crate::foundation::core::SurfaceFormat;

fn solid(x: u32, y: u32, w: u32, h: u32, px: [u8; 4]) -> Composition {
    Composition::new(x, y, w, h, px.repeat((w * h) as usize))
}

#[test]
fn renders_premultiplied_compositions_at_source_scale() {
    let mut be = SoftwareBackend::new(SurfaceDesc::new(8, 8)).unwrap();
    let comp = solid(2, 2, 2, 2, [200, 100, 50, 128]);
    be.render(&[comp], &DrawParams::unscaled(8, 8)).unwrap();

    let frame = be.read_pixels().unwrap();
    assert!(frame.premultiplied);
    assert_eq!(frame.rgba_at(2, 2), Some([100, 50, 25, 128]));
    assert_eq!(frame.rgba_at(3, 3), Some([100, 50, 25, 128]));
    assert_eq!(frame.rgba_at(1, 1), Some([0, 0, 0, 0]));
    assert_eq!(frame.rgba_at(4, 4), Some([0, 0, 0, 0]));
    assert_eq!(be.slot_count(), 1);
}

#[test]
fn later_compositions_paint_over_earlier_ones() {
    let mut be = SoftwareBackend::new(SurfaceDesc::new(4, 1)).unwrap();
    let back = solid(0, 0, 4, 1, [0, 0, 255, 255]);
    let front = solid(1, 0, 2, 1, [255, 0, 0, 255]);
    be.render(&[back, front], &DrawParams::unscaled(4, 1))
        .unwrap();

    let frame = be.read_pixels().unwrap();
    assert_eq!(frame.rgba_at(0, 0), Some([0, 0, 255, 255]));
    assert_eq!(frame.rgba_at(1, 0), Some([255, 0, 0, 255]));
    assert_eq!(frame.rgba_at(3, 0), Some([0, 0, 255, 255]));
}

#[test]
fn bgra_surfaces_store_swapped_channels() {
    let surface = SurfaceDesc::new(1, 1).with_format(SurfaceFormat::Bgra8);
    let mut be = SoftwareBackend::new(surface).unwrap();
    be.render(
        &[solid(0, 0, 1, 1, [10, 20, 30, 255])],
        &DrawParams::unscaled(1, 1),
    )
    .unwrap();

    let frame = be.read_pixels().unwrap();
    assert_eq!(frame.data, vec![30, 20, 10, 255]);
    assert_eq!(frame.rgba_at(0, 0), Some([10, 20, 30, 255]));
}

#[test]
fn source_space_is_mapped_onto_a_smaller_surface() {
    let mut be = SoftwareBackend::new(SurfaceDesc::new(4, 4)).unwrap();
    // Bottom-right quadrant of an 8x8 source.
    be.render(
        &[solid(4, 4, 4, 4, [0, 255, 0, 255])],
        &DrawParams::unscaled(8, 8),
    )
    .unwrap();
    let frame = be.read_pixels().unwrap();
    assert_eq!(frame.rgba_at(2, 2), Some([0, 255, 0, 255]));
    assert_eq!(frame.rgba_at(1, 1), Some([0, 0, 0, 0]));
}

#[test]
fn render_clears_previous_contents() {
    let mut be = SoftwareBackend::new(SurfaceDesc::new(2, 2)).unwrap();
    let params = DrawParams::unscaled(2, 2);
    be.render(&[solid(0, 0, 2, 2, [9, 9, 9, 255])], &params)
        .unwrap();
    be.render(&[], &params).unwrap();
    assert!(be.read_pixels().unwrap().is_transparent());
    assert_eq!(be.slot_count(), 0);
}

#[test]
fn malformed_compositions_are_skipped_not_fatal() {
    let mut be = SoftwareBackend::new(SurfaceDesc::new(2, 1)).unwrap();
    let bad = Composition::new(0, 0, 1, 1, vec![255u8; 3]);
    let good = solid(1, 0, 1, 1, [255, 255, 255, 255]);
    be.render(&[bad, good], &DrawParams::unscaled(2, 1))
        .unwrap();
    let frame = be.read_pixels().unwrap();
    assert_eq!(frame.rgba_at(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(frame.rgba_at(1, 0), Some([255, 255, 255, 255]));
}

#[test]
fn resize_reallocates_and_clears() {
    let mut be = SoftwareBackend::new(SurfaceDesc::new(2, 2)).unwrap();
    be.render(
        &[solid(0, 0, 2, 2, [1, 1, 1, 255])],
        &DrawParams::unscaled(2, 2),
    )
    .unwrap();
    be.resize(3, 5).unwrap();
    let frame = be.read_pixels().unwrap();
    assert_eq!((frame.width, frame.height), (3, 5));
    assert_eq!(frame.data.len(), 3 * 5 * 4);
    assert!(frame.is_transparent());
    assert!(be.resize(0, 5).is_err());
}

#[test]
fn destroyed_backend_rejects_work() {
    let mut be = SoftwareBackend::new(SurfaceDesc::new(2, 2)).unwrap();
    be.destroy();
    assert!(be.render(&[], &DrawParams::unscaled(2, 2)).is_err());
    assert!(be.clear().is_err());
    assert!(be.read_pixels().is_err());
}
