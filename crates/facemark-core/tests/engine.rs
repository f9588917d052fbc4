use facemark_core::{
    compare, compare_fallback, extract_descriptor, CancelFlag, FaceEngine, FaceMaterial,
    FaceRecord, MatchConfig, RawImage, ScanError, ScoreMethod,
};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

fn encode(img: &RgbImage) -> RawImage {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    RawImage::new(buf.into_inner())
}

fn solid(color: [u8; 3]) -> RawImage {
    encode(&RgbImage::from_pixel(128, 128, Rgb(color)))
}

/// A face-like test pattern: bright oval on a dark background with two
/// darker "eye" patches.
fn pattern(width: u32, height: u32, brightness: u8) -> RawImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let nx = x as f32 / width as f32 - 0.5;
        let ny = y as f32 / height as f32 - 0.5;
        let inside = nx * nx / 0.12 + ny * ny / 0.2 < 1.0;
        let eye = (ny + 0.1).abs() < 0.05 && ((nx - 0.12).abs() < 0.06 || (nx + 0.12).abs() < 0.06);
        let v = if eye {
            brightness / 4
        } else if inside {
            brightness
        } else {
            20
        };
        Rgb([v, v, v])
    });
    encode(&img)
}

fn record(identity: &str, material: FaceMaterial) -> FaceRecord {
    FaceRecord {
        identity: identity.into(),
        material,
    }
}

#[test]
fn identical_images_score_maximal() {
    let a = pattern(200, 240, 220);
    let b = RawImage::new(a.as_bytes().to_vec());
    let da = extract_descriptor(&a).unwrap();
    let db = extract_descriptor(&b).unwrap();
    assert_eq!(compare(&da, &db), 100.0);
}

#[test]
fn black_and_white_squares_score_far_below_threshold() {
    let black = extract_descriptor(&solid([0, 0, 0])).unwrap();
    let white = extract_descriptor(&solid([255, 255, 255])).unwrap();
    let score = compare(&black, &white);
    assert!(score < 50.0, "score {score}");
}

#[test]
fn resolution_does_not_change_descriptor_much() {
    let small = extract_descriptor(&pattern(256, 256, 200)).unwrap();
    let large = extract_descriptor(&pattern(512, 512, 200)).unwrap();
    assert!(compare(&small, &large) > 90.0);
}

#[tokio::test]
async fn compare_images_uses_descriptors_when_decodable() {
    let engine = FaceEngine::default();
    let a = pattern(160, 160, 230);
    let similarity = engine.compare_images(&a, &a.clone()).await;
    assert_eq!(similarity.method, ScoreMethod::Descriptor);
    assert_eq!(similarity.percent, 100.0);
}

#[tokio::test]
async fn decode_failure_on_both_sides_falls_back() {
    let engine = FaceEngine::default();
    let a = RawImage::from("data:image/jpeg;base64,corrupted-payload-AAAAAAAAAAAAAAAAAAAA");
    let b = RawImage::from("data:image/jpeg;base64,corrupted-payload-AAAAAAAAAAAAAAAAAAAB");

    let fraction = compare_fallback(&a, &b);
    assert!((0.0..=1.0).contains(&fraction));

    let similarity = engine.compare_images(&a, &b).await;
    assert_eq!(similarity.method, ScoreMethod::Fallback);
    assert!((similarity.percent - fraction * 100.0).abs() < 1e-4);
    assert!(similarity.is_low_confidence());
}

#[tokio::test]
async fn enrollment_rejects_same_face() {
    let engine = FaceEngine::default();
    let face = pattern(200, 200, 210);
    let stored = extract_descriptor(&face).unwrap();
    let records = vec![
        record("legacy@example.com", FaceMaterial::Missing),
        record("other@example.com", FaceMaterial::Descriptor(
            extract_descriptor(&solid([0, 0, 0])).unwrap(),
        )),
        record("owner@example.com", FaceMaterial::Descriptor(stored)),
    ];

    let check = engine
        .check_enrollment(&face, &records, &CancelFlag::new())
        .await
        .unwrap();
    assert!(check.duplicate);
    assert_eq!(check.conflicting_identity.as_deref(), Some("owner@example.com"));
    assert_eq!(check.masked_identity().as_deref(), Some("own***@example.com"));
}

#[tokio::test]
async fn enrollment_allows_new_face() {
    let engine = FaceEngine::default();
    let records = vec![record(
        "dark@example.com",
        FaceMaterial::Descriptor(extract_descriptor(&solid([0, 0, 0])).unwrap()),
    )];
    let check = engine
        .check_enrollment(&solid([255, 255, 255]), &records, &CancelFlag::new())
        .await
        .unwrap();
    assert!(!check.duplicate);
    assert_eq!(check.scanned, 1);
}

#[tokio::test]
async fn enrollment_with_undecodable_capture_uses_stored_images() {
    let engine = FaceEngine::default();
    let capture = RawImage::from("data:image/png;base64,not-really-an-image-0123456789");
    let records = vec![
        record("blob@example.com", FaceMaterial::Image(capture.clone())),
        // Descriptor-only records have nothing to compare a raw payload with.
        record("desc@example.com", FaceMaterial::Descriptor(
            extract_descriptor(&solid([9, 9, 9])).unwrap(),
        )),
    ];
    let check = engine
        .check_enrollment(&capture, &records, &CancelFlag::new())
        .await
        .unwrap();
    assert!(check.duplicate);
    assert_eq!(check.best.unwrap().method, ScoreMethod::Fallback);
}

#[tokio::test]
async fn login_picks_best_identity() {
    let engine = FaceEngine::default();
    let bright = pattern(200, 200, 240);
    let records = vec![
        record("dark@example.com", FaceMaterial::Descriptor(
            extract_descriptor(&solid([0, 0, 0])).unwrap(),
        )),
        record("stored-image@example.com", FaceMaterial::Image(bright.clone())),
        record("legacy@example.com", FaceMaterial::Missing),
    ];

    let result = engine
        .match_login(&bright, &records, &CancelFlag::new())
        .await
        .unwrap();
    assert!(result.matched);
    assert_eq!(result.identity.as_deref(), Some("stored-image@example.com"));
    assert_eq!(result.best_score, 100.0);
    assert_eq!(result.best_method, Some(ScoreMethod::Descriptor));
    assert_eq!(result.scanned, 2);
}

#[tokio::test]
async fn login_without_match_reports_best_score() {
    let config = MatchConfig {
        match_threshold: 99.5,
        ..MatchConfig::default()
    };
    let engine = FaceEngine::new(config);
    let records = vec![record(
        "similar@example.com",
        FaceMaterial::Descriptor(extract_descriptor(&pattern(200, 200, 200)).unwrap()),
    )];
    let result = engine
        .match_login(&pattern(200, 200, 150), &records, &CancelFlag::new())
        .await
        .unwrap();
    assert!(!result.matched);
    assert!(result.identity.is_none());
    assert!(result.best_score > 0.0 && result.best_score < 99.5);
}

#[tokio::test]
async fn cancelled_login_discards_results() {
    let engine = FaceEngine::default();
    let face = solid([128, 128, 128]);
    let records = vec![record(
        "x@example.com",
        FaceMaterial::Descriptor(extract_descriptor(&face).unwrap()),
    )];
    let cancel = CancelFlag::new();
    cancel.cancel();
    let result = engine.match_login(&face, &records, &cancel).await;
    assert_eq!(result.unwrap_err(), ScanError::Cancelled);
}
