use super::*;

fn assert_rect(r: Rect, x: f64, y: f64, w: f64, h: f64) {
    let eps = 1e-9;
    assert!((r.x0 - x).abs() < eps, "x0 {} != {x}", r.x0);
    assert!((r.y0 - y).abs() < eps, "y0 {} != {y}", r.y0);
    assert!((r.width() - w).abs() < eps, "w {} != {w}", r.width());
    assert!((r.height() - h).abs() < eps, "h {} != {h}", r.height());
}

#[test]
fn scale_grows_from_center_and_bottom() {
    let r = anchored_scale(Rect::new(0.0, 0.0, 100.0, 40.0), 2.0, 1.0, 0.0);
    assert_rect(r, -50.0, 0.0, 200.0, 40.0);
}

#[test]
fn vertical_scale_grows_upward() {
    let r = anchored_scale(Rect::new(10.0, 100.0, 110.0, 140.0), 1.0, 1.5, 0.0);
    assert_rect(r, 10.0, 80.0, 100.0, 60.0);
    assert!((r.y1 - 140.0).abs() < 1e-9);
}

#[test]
fn offset_shifts_vertically_only() {
    let r = anchored_scale(Rect::new(0.0, 0.0, 100.0, 40.0), 1.0, 1.0, -25.0);
    assert_rect(r, 0.0, -25.0, 100.0, 40.0);
}

#[test]
fn identity_scale_is_a_noop() {
    let src = Rect::new(3.0, 7.0, 30.0, 70.0);
    assert_eq!(anchored_scale(src, 1.0, 1.0, 0.0), src);
}

#[test]
fn source_space_maps_onto_surface() {
    let comp = Composition::new(960, 900, 480, 90, vec![0u8; 480 * 90 * 4]);
    let params = DrawParams::unscaled(1920, 1080);
    let r = dest_rect(&comp, &params, SurfaceDesc::new(960, 540));
    assert_rect(r, 480.0, 450.0, 240.0, 45.0);
}

#[test]
fn zero_source_size_falls_back_to_identity_mapping() {
    let comp = Composition::new(4, 5, 2, 2, vec![0u8; 16]);
    let params = DrawParams::unscaled(0, 0);
    let r = dest_rect(&comp, &params, SurfaceDesc::new(64, 64));
    assert_rect(r, 4.0, 5.0, 2.0, 2.0);
}

#[test]
fn rect_xywh_packs_origin_and_size() {
    assert_eq!(
        rect_xywh(Rect::new(-50.0, 0.0, 150.0, 40.0)),
        [-50.0, 0.0, 200.0, 40.0]
    );
}
