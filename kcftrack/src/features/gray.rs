//! Raw intensity features

use super::FeatureExtractor;
use crate::image::Frame;
use ndarray::Array3;

/// Single channel of gray levels scaled to `[-0.5, 0.5]`
#[derive(Debug, Clone, Copy, Default)]
pub struct RawIntensity;

impl FeatureExtractor for RawIntensity {
    fn extract(&self, patch: &Frame) -> Array3<f32> {
        let gray = patch.to_gray();
        let (width, height) = gray.dimensions();
        Array3::from_shape_fn((1, height as usize, width as usize), |(_, i, j)| {
            gray.get_pixel(j as u32, i as u32)[0] as f32 / 255.0 - 0.5
        })
    }

    fn cell_size(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "raw"
    }
}
