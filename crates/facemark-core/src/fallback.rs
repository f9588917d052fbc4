//! Degraded-mode similarity on raw encoded payloads.
//!
//! Only used when a payload cannot be decoded. It compares encoded bytes,
//! not pixels, so results are low confidence. The return value is a 0–1
//! fraction; convert with
//! [`Similarity::from_fallback_fraction`](crate::types::Similarity::from_fallback_fraction)
//! before mixing it with descriptor scores.

use crate::types::RawImage;

/// Number of windows the shorter payload is split into.
const WINDOWS: usize = 10;

/// Payloads whose lengths differ by more than this fraction of the longer
/// one are treated as unrelated.
const MAX_LENGTH_DELTA: f32 = 0.1;

/// Byte stride used when sampling inside a window.
const SAMPLE_STRIDE: usize = 1;

/// Fraction of matching windows between two payloads, in [0, 1].
pub fn compare_fallback(a: &RawImage, b: &RawImage) -> f32 {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let delta = (longer.len() - shorter.len()) as f32 / longer.len() as f32;
    if delta > MAX_LENGTH_DELTA {
        tracing::debug!(
            len_a = a.len(),
            len_b = b.len(),
            "fallback: payload lengths too far apart"
        );
        return 0.0;
    }

    let window = shorter.len() / WINDOWS;
    if window == 0 {
        return 0.0;
    }

    let matches = (0..WINDOWS)
        .filter(|i| {
            let range = i * window..(i + 1) * window;
            windows_match(&a[range.clone()], &b[range])
        })
        .count();

    let similarity = matches as f32 / WINDOWS as f32;
    tracing::debug!(matches, windows = WINDOWS, similarity, "fallback comparison");
    similarity
}

fn windows_match(a: &[u8], b: &[u8]) -> bool {
    a.iter()
        .step_by(SAMPLE_STRIDE)
        .zip(b.iter().step_by(SAMPLE_STRIDE))
        .all(|(x, y)| x == y)
}
