use std::sync::Arc;

use super::*;

fn source(json: &str, base_dir: PathBuf) -> SubtitleSource {
    SubtitleSource::Manifest {
        json: json.to_string(),
        base_dir,
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sublay-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn cues_are_sorted_and_timestamps_reported() {
    let mut dec = ManifestDecoder::new();
    let json = r#"{
        "width": 640, "height": 360,
        "cues": [
            { "start_ms": 900 },
            { "start_ms": 100, "compositions": [{ "x": 1, "y": 2, "width": 2, "height": 1, "fill": [255, 0, 0, 255] }] },
            { "start_ms": 500 }
        ]
    }"#;
    assert_eq!(dec.load(&source(json, PathBuf::new())).unwrap(), 3);
    assert_eq!(dec.timestamps(), vec![100.0, 500.0, 900.0]);
    assert_eq!(dec.find_index(450.0), Some(0));
    assert_eq!(dec.find_index(50.0), None);
}

#[test]
fn fill_compositions_render_solid_pixels() {
    let mut dec = ManifestDecoder::new();
    let json = r#"{ "width": 10, "height": 10, "cues": [
        { "start_ms": 0, "compositions": [{ "x": 3, "y": 4, "width": 2, "height": 2, "fill": [1, 2, 3, 4] }] },
        { "start_ms": 50 }
    ] }"#;
    dec.load(&source(json, PathBuf::new())).unwrap();

    let frame = dec.render_at(0).unwrap().unwrap();
    assert_eq!((frame.width, frame.height), (10, 10));
    let comp = frame.composition(0).unwrap();
    assert_eq!((comp.x, comp.y, comp.width, comp.height), (3, 4, 2, 2));
    assert_eq!(&comp.rgba[..], &[1u8, 2, 3, 4].repeat(4)[..]);

    let blank = dec.render_at(1).unwrap().unwrap();
    assert!(blank.is_empty());
    assert!(dec.render_at(2).unwrap().is_none());
}

#[test]
fn oversized_fills_are_decode_errors() {
    let mut dec = ManifestDecoder::new();
    let json = r#"{ "width": 10, "height": 10, "cues": [
        { "start_ms": 0, "compositions": [{ "x": 0, "y": 0, "width": 4294967295, "height": 4294967295, "fill": [1, 2, 3, 4] }] },
        { "start_ms": 50, "compositions": [{ "x": 0, "y": 0, "width": 65536, "height": 65536, "fill": [1, 2, 3, 4] }] }
    ] }"#;
    dec.load(&source(json, PathBuf::new())).unwrap();

    assert!(matches!(dec.render_at(0), Err(SublayError::Decode(_))));
    assert!(matches!(dec.render_at(1), Err(SublayError::Decode(_))));
}

#[test]
fn rendered_frames_are_cached_until_cleared() {
    let mut dec = ManifestDecoder::new();
    let json = r#"{ "width": 4, "height": 4, "cues": [
        { "start_ms": 0, "compositions": [{ "x": 0, "y": 0, "width": 1, "height": 1, "fill": [9, 9, 9, 9] }] }
    ] }"#;
    dec.load(&source(json, PathBuf::new())).unwrap();
    let a = dec.render_at(0).unwrap().unwrap();
    let b = dec.render_at(0).unwrap().unwrap();
    assert!(Arc::ptr_eq(&a.compositions[0].rgba, &b.compositions[0].rgba));

    dec.clear_cache();
    let c = dec.render_at(0).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&a.compositions[0].rgba, &c.compositions[0].rgba));
    assert_eq!(a, c);
}

#[test]
fn png_images_resolve_relative_to_base_dir() {
    let dir = scratch_dir("manifest-png");
    let img = image::RgbaImage::from_raw(2, 1, vec![10, 20, 30, 255, 40, 50, 60, 128]).unwrap();
    img.save(dir.join("line.png")).unwrap();

    let mut dec = ManifestDecoder::new();
    let json = r#"{ "width": 100, "height": 50, "cues": [
        { "start_ms": 0, "compositions": [{ "x": 5, "y": 6, "image": "line.png" }] }
    ] }"#;
    dec.load(&source(json, dir.clone())).unwrap();
    let frame = dec.render_at(0).unwrap().unwrap();
    let comp = frame.composition(0).unwrap();
    assert_eq!((comp.width, comp.height), (2, 1));
    assert_eq!(&comp.rgba[..], &[10u8, 20, 30, 255, 40, 50, 60, 128]);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn missing_image_is_an_error() {
    let mut dec = ManifestDecoder::new();
    let json = r#"{ "width": 1, "height": 1, "cues": [
        { "start_ms": 0, "compositions": [{ "x": 0, "y": 0, "image": "does-not-exist.png" }] }
    ] }"#;
    dec.load(&source(json, scratch_dir("manifest-missing")))
        .unwrap();
    assert!(dec.render_at(0).is_err());
}

#[test]
fn other_formats_are_rejected() {
    let mut dec = ManifestDecoder::new();
    let err = dec
        .load(&SubtitleSource::Pgs {
            data: Arc::from(vec![0u8; 4]),
        })
        .unwrap_err();
    assert!(matches!(err, SublayError::Decode(_)));
}

#[test]
fn malformed_json_is_a_serde_error() {
    let mut dec = ManifestDecoder::new();
    let err = dec.load(&source("{ not json", PathBuf::new())).unwrap_err();
    assert!(matches!(err, SublayError::Serde(_)));
}

#[test]
fn load_replaces_previous_content() {
    let mut dec = ManifestDecoder::new();
    dec.load(&source(
        r#"{ "width": 1, "height": 1, "cues": [{ "start_ms": 0 }, { "start_ms": 1 }] }"#,
        PathBuf::new(),
    ))
    .unwrap();
    dec.load(&source(r#"{ "width": 1, "height": 1 }"#, PathBuf::new()))
        .unwrap();
    assert!(dec.timestamps().is_empty());
    dec.dispose();
    assert!(dec.manifest().is_none());
}
