//! Windows, regression targets and peak helpers shared by both filters

use ndarray::{Array1, Array2};
use std::f32::consts::PI;

/// Symmetric Hann window of length `len`
pub fn hann_1d(len: usize) -> Array1<f32> {
    if len <= 1 {
        return Array1::ones(len);
    }
    let denom = (len - 1) as f32;
    Array1::from_shape_fn(len, |i| 0.5 * (1.0 - (2.0 * PI * i as f32 / denom).cos()))
}

/// Separable Hann window (outer product of a column and a row window)
pub fn hann_2d(rows: usize, cols: usize) -> Array2<f32> {
    let col_window = hann_1d(rows);
    let row_window = hann_1d(cols);
    Array2::from_shape_fn((rows, cols), |(i, j)| col_window[i] * row_window[j])
}

/// Gaussian peak centred at `(rows/2, cols/2)`.
///
/// The bandwidth is `sqrt(rows*cols) / padding * output_sigma_factor`.
pub fn gaussian_peak(rows: usize, cols: usize, padding: f32, output_sigma_factor: f32) -> Array2<f32> {
    let half_rows = (rows / 2) as f32;
    let half_cols = (cols / 2) as f32;
    let output_sigma = ((rows * cols) as f32).sqrt() / padding * output_sigma_factor;
    let mult = -0.5 / (output_sigma * output_sigma);

    Array2::from_shape_fn((rows, cols), |(i, j)| {
        let di = i as f32 - half_rows;
        let dj = j as f32 - half_cols;
        (mult * (di * di + dj * dj)).exp()
    })
}

/// 1-D Gaussian over the scale axis, peaking at index `ceil(n/2) - 1`
pub fn scale_gaussian(n_scales: usize, sigma_factor: f32) -> Array1<f32> {
    let n = n_scales as f32;
    let sigma = n / n.sqrt() * sigma_factor;
    let sigma2 = sigma * sigma;
    let center = (n / 2.0).ceil();

    Array1::from_shape_fn(n_scales, |i| {
        let d = i as f32 + 1.0 - center;
        (-0.5 * d * d / sigma2).exp()
    })
}

/// Parabolic refinement of a peak from its two neighbours.
///
/// Returns the offset (in samples) to add to the integer peak position, or 0
/// when the three samples are collinear.
pub fn subpixel_peak(left: f32, center: f32, right: f32) -> f32 {
    let divisor = 2.0 * center - right - left;
    if divisor == 0.0 {
        return 0.0;
    }
    0.5 * (right - left) / divisor
}

/// Position and value of the largest element; the first one wins on ties
pub fn argmax_2d(data: &Array2<f32>) -> ((usize, usize), f32) {
    let mut best = ((0, 0), f32::NEG_INFINITY);
    for (idx, &value) in data.indexed_iter() {
        if value > best.1 {
            best = (idx, value);
        }
    }
    best
}

pub fn argmax_1d(data: &Array1<f32>) -> (usize, f32) {
    let mut best = (0, f32::NEG_INFINITY);
    for (idx, &value) in data.iter().enumerate() {
        if value > best.1 {
            best = (idx, value);
        }
    }
    best
}
