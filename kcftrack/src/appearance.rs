//! Kernelized correlation filter over translations
//!
//! The filter is a kernel ridge regressor trained on every cyclic shift of
//! the windowed template at once: with a Gaussian kernel the Gram matrix is
//! circulant, so training and detection reduce to elementwise operations in
//! the Fourier domain.

use crate::config::TrackerConfig;
use crate::fft::{complex_div_offset, complex_mul, complex_mul_conj, rearrange, Fft2d};
use crate::window::{argmax_2d, gaussian_peak, hann_2d, subpixel_peak};
use ndarray::{Array2, Array3, Axis, Zip};
use rayon::prelude::*;
use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

/// Translation estimate from one detection step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Peak position relative to the template centre, in feature cells `(x, y)`
    pub offset: (f32, f32),
    /// Response value at the integer peak
    pub peak: f32,
}

#[derive(Debug, Clone)]
pub struct AppearanceFilter {
    /// Windowed feature template, `(channels, rows, cols)`
    template: Array3<f32>,
    /// Dual coefficients in the Fourier domain
    alphaf: Array2<Complex32>,
    /// Spectrum of the Gaussian regression target
    yf: Array2<Complex32>,
    hann: Array2<f32>,
    plan: Fft2d,
    sigma: f32,
    lambda: f32,
}

impl AppearanceFilter {
    /// Build the filter around the first feature map and fit it with rate 1
    pub fn new(features: &Array3<f32>, config: &TrackerConfig) -> Self {
        let (channels, rows, cols) = features.dim();
        assert!(rows > 0 && cols > 0, "feature map must not be empty");

        let mut planner = FftPlanner::new();
        let plan = Fft2d::new(&mut planner, rows, cols);
        let label = gaussian_peak(rows, cols, config.padding, config.output_sigma_factor);
        let yf = plan.forward_real(label.view());

        let mut filter = Self {
            template: Array3::zeros((channels, rows, cols)),
            alphaf: Array2::zeros((rows, cols)),
            yf,
            hann: hann_2d(rows, cols),
            plan,
            sigma: config.sigma,
            lambda: config.lambda,
        };
        filter.train(features, 1.0);
        filter
    }

    /// `(channels, rows, cols)` of the feature maps this filter accepts
    pub fn shape(&self) -> (usize, usize, usize) {
        self.template.dim()
    }

    pub fn template(&self) -> &Array3<f32> {
        &self.template
    }

    pub fn alphaf(&self) -> &Array2<Complex32> {
        &self.alphaf
    }

    /// Multiply every channel by the 2-D Hann window
    pub fn apply_window(&self, mut features: Array3<f32>) -> Array3<f32> {
        self.check_shape(&features);
        for mut plane in features.axis_iter_mut(Axis(0)) {
            plane *= &self.hann;
        }
        features
    }

    /// Gaussian kernel between `x1` and every cyclic shift of `x2`.
    ///
    /// The zero shift sits at `(rows/2, cols/2)` of the returned surface.
    pub fn gaussian_correlation(&self, x1: &Array3<f32>, x2: &Array3<f32>) -> Array2<f32> {
        let (channels, rows, cols) = x1.dim();
        assert_eq!(x1.dim(), x2.dim(), "correlated feature maps differ in shape");

        let planes: Vec<Array2<f32>> = (0..channels)
            .into_par_iter()
            .map(|c| {
                let f1 = self.plan.forward_real(x1.index_axis(Axis(0), c));
                let f2 = self.plan.forward_real(x2.index_axis(Axis(0), c));
                self.plan.inverse_real(complex_mul_conj(&f1, &f2))
            })
            .collect();

        let mut cross = Array2::<f32>::zeros((rows, cols));
        for plane in &planes {
            cross += plane;
        }
        let cross = rearrange(&cross);

        let norm1: f32 = x1.iter().map(|v| v * v).sum();
        let norm2: f32 = x2.iter().map(|v| v * v).sum();
        let count = (channels * rows * cols) as f32;
        let sigma2 = self.sigma * self.sigma;

        cross.mapv(|c| {
            let d = ((norm1 + norm2 - 2.0 * c) / count).max(0.0);
            (-d / sigma2).exp()
        })
    }

    /// Dual coefficients fitting windowed features `x` to the Gaussian target
    fn solve_dual(&self, x: &Array3<f32>) -> Array2<Complex32> {
        let k = self.gaussian_correlation(x, x);
        let kf = self.plan.forward_real(k.view());
        complex_div_offset(&self.yf, &kf, self.lambda)
    }

    /// Blend a newly fitted model into the current one with learning rate `rate`
    pub fn train(&mut self, features: &Array3<f32>, rate: f32) {
        let x = self.apply_window(features.clone());
        let alphaf = self.solve_dual(&x);

        Zip::from(&mut self.template)
            .and(&x)
            .for_each(|t, &v| *t = (1.0 - rate) * *t + rate * v);
        Zip::from(&mut self.alphaf)
            .and(&alphaf)
            .for_each(|a, &v| *a = *a * (1.0 - rate) + v * rate);
    }

    /// Locate the template inside a candidate feature map
    pub fn detect(&self, features: &Array3<f32>) -> Detection {
        let z = self.apply_window(features.clone());
        let k = self.gaussian_correlation(&z, &self.template);
        let kf = self.plan.forward_real(k.view());
        let response = self.plan.inverse_real(complex_mul(&self.alphaf, &kf));

        let (rows, cols) = response.dim();
        let ((pi, pj), peak) = argmax_2d(&response);

        let mut x = pj as f32;
        let mut y = pi as f32;
        if pj > 0 && pj + 1 < cols {
            x += subpixel_peak(response[(pi, pj - 1)], peak, response[(pi, pj + 1)]);
        }
        if pi > 0 && pi + 1 < rows {
            y += subpixel_peak(response[(pi - 1, pj)], peak, response[(pi + 1, pj)]);
        }

        let offset = (x - (cols / 2) as f32, y - (rows / 2) as f32);
        log::trace!("Appearance peak {:.4} at offset ({:.2}, {:.2})", peak, offset.0, offset.1);

        Detection { offset, peak }
    }

    fn check_shape(&self, features: &Array3<f32>) {
        assert_eq!(
            features.dim(),
            self.template.dim(),
            "feature map shape does not match the trained template"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerFlags;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn raw_config() -> TrackerConfig {
        TrackerConfig::from_flags(TrackerFlags {
            gradient_features: false,
            fixed_window: false,
            multiscale: false,
            color_features: false,
        })
    }

    fn random_features(seed: u64, shape: (usize, usize, usize)) -> Array3<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array3::from_shape_fn(shape, |_| rng.random_range(-0.5..0.5))
    }

    fn roll(x: &Array3<f32>, dy: usize, dx: usize) -> Array3<f32> {
        let (_, rows, cols) = x.dim();
        Array3::from_shape_fn(x.dim(), |(c, i, j)| {
            x[(c, (i + rows - dy) % rows, (j + cols - dx) % cols)]
        })
    }

    fn blob(size: usize, cy: f32, cx: f32, sigma: f32) -> Array3<f32> {
        Array3::from_shape_fn((1, size, size), |(_, i, j)| {
            let d2 = (i as f32 - cy).powi(2) + (j as f32 - cx).powi(2);
            (-0.5 * d2 / (sigma * sigma)).exp()
        })
    }

    #[test]
    fn test_initial_training_copies_windowed_template() {
        let x = random_features(1, (2, 16, 20));
        let filter = AppearanceFilter::new(&x, &raw_config());
        let windowed = filter.apply_window(x.clone());
        assert_eq!(filter.shape(), (2, 16, 20));
        for (a, b) in filter.template().iter().zip(windowed.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_training_is_an_exponential_moving_average() {
        let config = raw_config();
        let x0 = random_features(2, (3, 12, 12));
        let x1 = random_features(3, (3, 12, 12));
        let mut filter = AppearanceFilter::new(&x0, &config);

        let old_template = filter.template().clone();
        let old_alphaf = filter.alphaf().clone();
        let fresh_alphaf = filter.solve_dual(&filter.apply_window(x1.clone()));
        let windowed = filter.apply_window(x1.clone());

        filter.train(&x1, 0.3);

        for ((t, o), n) in filter.template().iter().zip(old_template.iter()).zip(windowed.iter()) {
            assert_abs_diff_eq!(*t, 0.7 * o + 0.3 * n, epsilon = 1e-5);
        }
        for ((a, o), n) in filter.alphaf().iter().zip(old_alphaf.iter()).zip(fresh_alphaf.iter()) {
            let expected = *o * 0.7 + *n * 0.3;
            assert_abs_diff_eq!(a.re, expected.re, epsilon = 1e-3);
            assert_abs_diff_eq!(a.im, expected.im, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_gaussian_correlation_peaks_at_cyclic_shift() {
        let x = random_features(4, (3, 16, 16));
        let filter = AppearanceFilter::new(&x, &raw_config());

        let k = filter.gaussian_correlation(&x, &x);
        let ((r, c), v) = argmax_2d(&k);
        assert_eq!((r, c), (8, 8));
        assert_abs_diff_eq!(v, 1.0, epsilon = 1e-4);
        assert!(k.iter().all(|&v| v > 0.0 && v <= 1.0 + 1e-6));

        let shifted = roll(&x, 2, 3);
        let k = filter.gaussian_correlation(&shifted, &x);
        let ((r, c), _) = argmax_2d(&k);
        assert_eq!((r, c), (8 + 2, 8 + 3));
    }

    #[test]
    fn test_detect_on_training_sample_is_centered() {
        let x = random_features(5, (2, 24, 24));
        let filter = AppearanceFilter::new(&x, &raw_config());
        let detection = filter.detect(&x);
        assert!(detection.offset.0.abs() < 0.5);
        assert!(detection.offset.1.abs() < 0.5);
        assert!(detection.peak > 0.5);
    }

    #[test]
    fn test_detect_follows_translation() {
        let config = raw_config();
        let filter = AppearanceFilter::new(&blob(48, 24.0, 24.0, 1.5), &config);
        let detection = filter.detect(&blob(48, 26.0, 27.0, 1.5));
        assert_abs_diff_eq!(detection.offset.0, 3.0, epsilon = 0.75);
        assert_abs_diff_eq!(detection.offset.1, 2.0, epsilon = 0.75);
    }

    #[test]
    #[should_panic(expected = "does not match the trained template")]
    fn test_detect_rejects_mismatched_shape() {
        let filter = AppearanceFilter::new(&random_features(6, (1, 8, 8)), &raw_config());
        filter.detect(&random_features(7, (1, 8, 10)));
    }
}
