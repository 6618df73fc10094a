//! Colour-cluster histograms appended to the FHOG channels
//!
//! Every pixel of an interior cell is mapped to CIE-Lab (8-bit encoding) and
//! votes for the nearest of a fixed set of colour centroids. The histograms
//! share the FHOG grid, so the two maps are stacked channel-wise.

use super::{FeatureExtractor, Fhog, FHOG_CHANNELS};
use crate::image::Frame;
use ndarray::{s, Array3};
use std::sync::Arc;

const LAB_CENTROIDS: [[f32; 3]; 15] = [
    [161.317504, 127.223401, 128.609333],
    [142.922425, 128.666965, 127.532319],
    [67.879757, 127.721830, 135.903311],
    [92.705062, 129.965717, 137.399500],
    [120.172257, 128.279647, 127.036493],
    [195.470568, 127.857070, 129.345415],
    [41.257102, 130.059468, 132.675336],
    [12.014861, 129.480555, 127.064714],
    [226.567086, 127.567831, 136.345727],
    [154.664210, 131.676606, 156.481669],
    [121.180447, 137.020793, 153.433743],
    [87.042204, 137.211742, 98.614874],
    [113.809537, 106.577104, 157.818094],
    [81.083293, 170.051905, 148.904079],
    [45.015485, 138.543124, 102.402528],
];

/// Fixed colour palette in 8-bit Lab coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct ColorCentroids {
    centroids: Vec<[f32; 3]>,
}

impl Default for ColorCentroids {
    fn default() -> Self {
        Self {
            centroids: LAB_CENTROIDS.to_vec(),
        }
    }
}

impl ColorCentroids {
    pub fn new(centroids: Vec<[f32; 3]>) -> Self {
        assert!(!centroids.is_empty(), "colour palette must not be empty");
        Self { centroids }
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Index of the centroid closest (squared Euclidean) to `lab`; first wins on ties
    pub fn nearest(&self, lab: [u8; 3]) -> usize {
        let lab = [lab[0] as f32, lab[1] as f32, lab[2] as f32];
        let mut best = (0, f32::INFINITY);
        for (idx, c) in self.centroids.iter().enumerate() {
            let d = (lab[0] - c[0]).powi(2) + (lab[1] - c[1]).powi(2) + (lab[2] - c[2]).powi(2);
            if d < best.1 {
                best = (idx, d);
            }
        }
        best.0
    }
}

/// sRGB to CIE-Lab with every component scaled into `0..=255`
pub fn rgb_to_lab(rgb: [u8; 3]) -> [u8; 3] {
    fn linearize(v: u8) -> f32 {
        let v = v as f32 / 255.0;
        if v <= 0.04045 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    }

    fn f(t: f32) -> f32 {
        if t > 0.008856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    }

    let [r, g, b] = rgb.map(linearize);
    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / 0.950456;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / 1.088754;

    let (fx, fy, fz) = (f(x), f(y), f(z));
    let l = if y > 0.008856 { 116.0 * fy - 16.0 } else { 903.3 * y };
    let a = 500.0 * (fx - fy) + 128.0;
    let bb = 200.0 * (fy - fz) + 128.0;

    let to_u8 = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    [to_u8(l * 255.0 / 100.0), to_u8(a), to_u8(bb)]
}

/// FHOG channels followed by one histogram channel per colour centroid
#[derive(Debug, Clone)]
pub struct HogColorFeatures {
    hog: Fhog,
    centroids: Arc<ColorCentroids>,
}

impl HogColorFeatures {
    pub fn new(hog: Fhog, centroids: Arc<ColorCentroids>) -> Self {
        Self { hog, centroids }
    }

    pub fn channels(&self) -> usize {
        FHOG_CHANNELS + self.centroids.len()
    }

    /// Per-cell centroid histograms on the interior cell grid, `(k, rows, cols)`
    fn histograms(&self, patch: &Frame, rows: usize, cols: usize) -> Array3<f32> {
        let cell = self.hog.cell_size();
        let mut hist = Array3::<f32>::zeros((self.centroids.len(), rows, cols));
        let vote = 1.0 / (cell * cell) as f32;
        let height = patch.height() as usize;
        let width = patch.width() as usize;

        for (cy_idx, cy) in (cell..height.saturating_sub(cell)).step_by(cell).enumerate() {
            if cy_idx >= rows {
                break;
            }
            for (cx_idx, cx) in (cell..width.saturating_sub(cell)).step_by(cell).enumerate() {
                if cx_idx >= cols {
                    break;
                }
                for y in cy..cy + cell {
                    for x in cx..cx + cell {
                        let lab = rgb_to_lab(patch.rgb(x as u32, y as u32));
                        let idx = self.centroids.nearest(lab);
                        hist[(idx, cy_idx, cx_idx)] += vote;
                    }
                }
            }
        }

        hist
    }
}

impl FeatureExtractor for HogColorFeatures {
    fn extract(&self, patch: &Frame) -> Array3<f32> {
        let hog = self.hog.extract(patch);
        let (_, rows, cols) = hog.dim();
        let hist = self.histograms(patch, rows, cols);

        let mut features = Array3::<f32>::zeros((self.channels(), rows, cols));
        features.slice_mut(s![..FHOG_CHANNELS, .., ..]).assign(&hog);
        features.slice_mut(s![FHOG_CHANNELS.., .., ..]).assign(&hist);
        features
    }

    fn cell_size(&self) -> usize {
        self.hog.cell_size()
    }

    fn name(&self) -> &str {
        "fhog+color"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_lab_reference_colours() {
        assert_eq!(rgb_to_lab([0, 0, 0]), [0, 128, 128]);
        assert_eq!(rgb_to_lab([255, 255, 255]), [255, 128, 128]);

        let red = rgb_to_lab([255, 0, 0]);
        // L ~ 53.2 -> 136, a ~ +80, b ~ +67
        assert!((134..=138).contains(&red[0]));
        assert!(red[1] > 200);
        assert!(red[2] > 180);
    }

    #[test]
    fn test_nearest_centroid() {
        let palette = ColorCentroids::default();
        assert_eq!(palette.len(), 15);
        // Exact centroid positions map back to themselves
        assert_eq!(palette.nearest([12, 129, 127]), 7);
        assert_eq!(palette.nearest([227, 128, 136]), 8);
        assert_eq!(palette.nearest([81, 170, 149]), 13);
    }

    #[test]
    fn test_histograms_stack_on_hog_grid() {
        let patch = Frame::Rgb(RgbImage::from_fn(40, 32, |x, y| {
            if x < 20 {
                Rgb([10, 10, 10])
            } else {
                Rgb([200, 40, (y * 4) as u8])
            }
        }));
        let extractor = HogColorFeatures::new(Fhog::new(4), Arc::new(ColorCentroids::default()));
        let features = extractor.extract(&patch);
        assert_eq!(features.dim(), (FHOG_CHANNELS + 15, 6, 8));

        // Every interior cell distributes exactly one unit of colour mass
        for i in 0..6 {
            for j in 0..8 {
                let mass: f32 = (FHOG_CHANNELS..FHOG_CHANNELS + 15).map(|c| features[(c, i, j)]).sum();
                assert_abs_diff_eq!(mass, 1.0, epsilon = 1e-5);
            }
        }

        // The dark half falls into the darkest centroid
        let dark = ColorCentroids::default().nearest(rgb_to_lab([10, 10, 10]));
        assert_abs_diff_eq!(features[(FHOG_CHANNELS + dark, 2, 0)], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_gray_patch_is_colourless() {
        let patch = Frame::Gray(image::GrayImage::from_pixel(24, 24, image::Luma([128])));
        let extractor = HogColorFeatures::new(Fhog::new(4), Arc::new(ColorCentroids::default()));
        let features = extractor.extract(&patch);
        let bin = ColorCentroids::default().nearest(rgb_to_lab([128, 128, 128]));
        assert_abs_diff_eq!(features[(FHOG_CHANNELS + bin, 1, 1)], 1.0, epsilon = 1e-5);
    }
}
