//! Regional intensity/texture descriptor extraction.
//!
//! The raster is split into an 8×8 grid. For each region (row-major) the
//! extractor records the mean normalized intensity `(R+G+B)/3/255` in the
//! first half of the descriptor and the variance of per-sample intensity
//! around that mean in the second half.

use crate::raster::{self, DecodeFailure, Raster};
use crate::types::{Descriptor, RawImage, DESCRIPTOR_LEN};

/// Regions per grid side.
const GRID: u32 = 8;
const REGION_COUNT: usize = (GRID * GRID) as usize;

/// Compute the 128-value descriptor of a decoded raster.
///
/// Regions that contain no readable samples (raster smaller than the grid,
/// or a truncated pixel buffer) keep zeroed features.
pub fn extract(raster: &Raster) -> Descriptor {
    let mut values = vec![0.0f32; DESCRIPTOR_LEN];
    let region_w = raster.width / GRID;
    let region_h = raster.height / GRID;

    for gy in 0..GRID {
        for gx in 0..GRID {
            let region = (gy * GRID + gx) as usize;
            let samples = region_samples(raster, gx * region_w, gy * region_h, region_w, region_h);
            if samples.is_empty() {
                continue;
            }

            let n = samples.len() as f32;
            let mean = samples.iter().sum::<f32>() / n;
            let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;

            values[region] = mean;
            values[REGION_COUNT + region] = variance;
        }
    }

    // Every value is a mean or variance of samples in [0, 1].
    Descriptor::from_finite(values)
}

/// Decode and extract in one step.
pub fn extract_descriptor(image: &RawImage) -> Result<Descriptor, DecodeFailure> {
    let raster = raster::decode(image)?;
    Ok(extract(&raster))
}

/// Normalized intensities of every readable sample in a region.
fn region_samples(raster: &Raster, x0: u32, y0: u32, w: u32, h: u32) -> Vec<f32> {
    let mut samples = Vec::with_capacity((w * h) as usize);
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            if let Some([r, g, b]) = raster.sample(x, y) {
                samples.push((r as f32 + g as f32 + b as f32) / (3.0 * 255.0));
            }
        }
    }
    samples
}
