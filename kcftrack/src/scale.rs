//! One-dimensional correlation filter over a scale pyramid
//!
//! Each pyramid level is a crop of the target at `base_size * factor[i] *
//! current_scale`, resized to a fixed model size and described by a flattened
//! FHOG vector. Stacking the levels as columns gives a `(features, n_scales)`
//! matrix; the filter correlates along the scale axis only.

use crate::config::ScaleConfig;
use crate::features::{FeatureExtractor, Fhog};
use crate::fft::Fft1d;
use crate::image::Frame;
use crate::window::{argmax_1d, hann_1d, scale_gaussian};
use ndarray::{Array1, Array2, Axis, Zip};
use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

/// Scale factors `step^(ceil(n/2) - i - 1)`, largest first
pub fn scale_factors(n_scales: usize, step: f32) -> Array1<f32> {
    let center = (n_scales as f32 / 2.0).ceil();
    Array1::from_shape_fn(n_scales, |i| step.powf(center - i as f32 - 1.0))
}

/// Admissible `(min, max)` scale multipliers for a target of `base` size
/// inside a `frame` of the given size
pub fn scale_bounds(base: (f32, f32), frame: (u32, u32), step: f32, padding: f32) -> (f32, f32) {
    let (base_w, base_h) = base;
    let (frame_w, frame_h) = (frame.0 as f32, frame.1 as f32);
    let log_step = step.ln();

    let smallest = (5.0 / base_w).max(5.0 / base_h) * (1.0 + padding);
    let largest = (frame_h / base_h).min(frame_w / base_w);

    let min_scale = step.powf((smallest.ln() / log_step).ceil());
    let max_scale = step.powf((largest.ln() / log_step).floor());
    (min_scale, max_scale)
}

#[derive(Debug, Clone)]
pub struct ScaleFilter {
    base_size: (f32, f32),
    model_size: (u32, u32),
    factors: Array1<f32>,
    window: Array1<f32>,
    yf: Array1<Complex32>,
    plan: Fft1d,
    hog: Fhog,
    num: Array2<Complex32>,
    den: Array1<f32>,
    trained: bool,
    current: f32,
    min_scale: f32,
    max_scale: f32,
    learning_rate: f32,
    lambda: f32,
}

impl ScaleFilter {
    /// Build the filter for a target of `base_size` centred at `center` and
    /// fit it to the first pyramid
    pub fn new(
        frame: &Frame,
        center: (f32, f32),
        base_size: (f32, f32),
        cell_size: usize,
        config: &ScaleConfig,
    ) -> Self {
        let n = config.n_scales;
        let mut planner = FftPlanner::new();
        let plan = Fft1d::new(&mut planner, n);
        let yf = plan.forward_real(&scale_gaussian(n, config.sigma_factor));

        let (base_w, base_h) = base_size;
        let area = base_w * base_h;
        let model_factor = if area > config.max_area {
            (config.max_area / area).sqrt()
        } else {
            1.0
        };
        let model_size = (
            ((base_w * model_factor) as u32).max(1),
            ((base_h * model_factor) as u32).max(1),
        );

        let (min_scale, max_scale) = scale_bounds(
            base_size,
            (frame.width(), frame.height()),
            config.scale_step,
            config.padding,
        );

        let mut filter = Self {
            base_size,
            model_size,
            factors: scale_factors(n, config.scale_step),
            window: hann_1d(n),
            yf,
            plan,
            hog: Fhog::new(cell_size),
            num: Array2::zeros((0, n)),
            den: Array1::zeros(n),
            trained: false,
            current: 1.0,
            min_scale,
            max_scale,
            learning_rate: config.learning_rate,
            lambda: config.lambda,
        };

        log::debug!(
            "Scale filter: {} levels, model {}x{}, bounds [{:.3}, {:.3}]",
            n,
            model_size.0,
            model_size.1,
            min_scale,
            max_scale
        );

        match filter.sample(frame, center) {
            Some(pyramid) => filter.train(&pyramid, true),
            None => log::warn!("Initial scale pyramid is degenerate; scale filter left untrained"),
        }
        filter
    }

    pub fn current_scale(&self) -> f32 {
        self.current
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.min_scale, self.max_scale)
    }

    pub fn base_size(&self) -> (f32, f32) {
        self.base_size
    }

    pub fn model_size(&self) -> (u32, u32) {
        self.model_size
    }

    /// Spectrum of the scale pyramid around `center`, `(features, n_scales)`.
    ///
    /// Levels whose crop falls outside the frame stay zero; `None` when no
    /// level yields features or the whole pyramid has no gradient energy.
    pub fn sample(&self, frame: &Frame, center: (f32, f32)) -> Option<Array2<Complex32>> {
        let n = self.factors.len();
        let mut columns: Vec<Option<Array1<f32>>> = Vec::with_capacity(n);

        for (i, &factor) in self.factors.iter().enumerate() {
            let scale = factor * self.current;
            let column = frame
                .crop_centered(center.0, center.1, self.base_size.0 * scale, self.base_size.1 * scale)
                .map(|patch| {
                    let patch = patch.resize(self.model_size.0, self.model_size.1);
                    let features = self.hog.extract(&patch);
                    let flat = Array1::from_iter(features.iter().copied());
                    flat * self.window[i]
                });
            columns.push(column);
        }

        let degenerate = columns.iter().filter(|c| c.is_none()).count();
        let len = columns.iter().flatten().map(|c| c.len()).next()?;
        if len == 0 {
            return None;
        }
        // A flat pyramid gives an all-zero response, which carries no scale evidence
        if columns.iter().flatten().all(|c| c.iter().all(|&v| v == 0.0)) {
            return None;
        }
        if degenerate > 0 {
            log::trace!("{} of {} scale levels fell outside the frame", degenerate, n);
        }

        let mut pyramid = Array2::<Complex32>::zeros((len, n));
        for (i, column) in columns.into_iter().enumerate() {
            if let Some(column) = column {
                pyramid
                    .column_mut(i)
                    .assign(&column.mapv(|v| Complex32::new(v, 0.0)));
            }
        }
        self.plan.forward_rows(&mut pyramid);
        Some(pyramid)
    }

    /// Numerator and denominator fitted to a single pyramid
    fn fit(&self, pyramid: &Array2<Complex32>) -> (Array2<Complex32>, Array1<f32>) {
        let mut num = pyramid.mapv(|v| v.conj());
        for row in num.axis_iter_mut(Axis(0)) {
            Zip::from(row).and(&self.yf).for_each(|v, &y| *v = y * *v);
        }
        let den = pyramid.map(|v| v.norm_sqr()).sum_axis(Axis(0));
        (num, den)
    }

    /// Assign (`init`) or blend the accumulators towards `pyramid`
    pub fn train(&mut self, pyramid: &Array2<Complex32>, init: bool) {
        let (num, den) = self.fit(pyramid);
        if init || !self.trained || self.num.dim() != num.dim() {
            self.num = num;
            self.den = den;
            self.trained = true;
            return;
        }

        let rate = self.learning_rate;
        Zip::from(&mut self.num)
            .and(&num)
            .for_each(|a, &b| *a = *a * (1.0 - rate) + b * rate);
        Zip::from(&mut self.den)
            .and(&den)
            .for_each(|a, &b| *a = (1.0 - rate) * *a + rate * b);
    }

    /// Scale response over the pyramid levels
    fn response(&self, pyramid: &Array2<Complex32>) -> Array1<f32> {
        let summed = (&self.num * pyramid).sum_axis(Axis(0));
        let spectrum = Zip::from(&summed)
            .and(&self.den)
            .map_collect(|&s, &d| s / (d + self.lambda));
        self.plan.inverse_real(&spectrum)
    }

    /// Best pyramid level around `center` and its response, `None` when the
    /// pyramid is degenerate or the filter was never trained
    pub fn detect(&self, frame: &Frame, center: (f32, f32)) -> Option<(usize, f32)> {
        if !self.trained {
            return None;
        }
        let pyramid = self.sample(frame, center)?;
        if pyramid.nrows() != self.num.nrows() {
            return None;
        }
        Some(argmax_1d(&self.response(&pyramid)))
    }

    /// Multiply the current scale by `factor[index]`, clamped to the bounds
    fn rescale(&mut self, index: usize) {
        self.current = (self.current * self.factors[index]).clamp(self.min_scale, self.max_scale);
    }

    /// Detect the scale change around `center`, apply it and retrain.
    ///
    /// Returns the new scale multiplier; degenerate pyramids leave the scale
    /// and the model untouched.
    pub fn update(&mut self, frame: &Frame, center: (f32, f32)) -> f32 {
        if !self.trained {
            match self.sample(frame, center) {
                Some(pyramid) => self.train(&pyramid, true),
                None => log::warn!("Scale pyramid is degenerate; keeping scale {:.3}", self.current),
            }
            return self.current;
        }

        let Some((index, peak)) = self.detect(frame, center) else {
            log::warn!("Scale pyramid is degenerate; keeping scale {:.3}", self.current);
            return self.current;
        };

        let previous = self.current;
        self.rescale(index);
        log::trace!(
            "Scale level {} (peak {:.4}): {:.4} -> {:.4}",
            index,
            peak,
            previous,
            self.current
        );

        match self.sample(frame, center) {
            Some(pyramid) => self.train(&pyramid, false),
            None => log::warn!("Scale pyramid is degenerate after rescaling; skipping training"),
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{GrayImage, Luma};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise_frame(size: u32, seed: u64) -> Frame {
        let mut rng = StdRng::seed_from_u64(seed);
        Frame::Gray(GrayImage::from_fn(size, size, |_, _| Luma([rng.random_range(0..=255u8)])))
    }

    fn filter_on(frame: &Frame) -> ScaleFilter {
        ScaleFilter::new(frame, (50.0, 50.0), (24.0, 24.0), 4, &ScaleConfig::default())
    }

    #[test]
    fn test_factors_are_centered_on_unit_scale() {
        let factors = scale_factors(5, 2.0);
        let expected = [4.0, 2.0, 1.0, 0.5, 0.25];
        for (f, e) in factors.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*f, *e, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(scale_factors(33, 1.05)[16], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bounds_follow_target_and_frame_size() {
        let (min, max) = scale_bounds((20.0, 20.0), (100, 100), 1.05, 1.0);
        // ceil(ln 0.5 / ln 1.05) = -14, floor(ln 5 / ln 1.05) = 32
        assert_abs_diff_eq!(min, 1.05f32.powi(-14), epsilon = 1e-5);
        assert_abs_diff_eq!(max, 1.05f32.powi(32), epsilon = 1e-3);
        assert!(min < 1.0 && max > 1.0);
    }

    #[test]
    fn test_model_size_is_capped_by_area() {
        let frame = noise_frame(100, 1);
        let filter = ScaleFilter::new(&frame, (50.0, 50.0), (64.0, 32.0), 4, &ScaleConfig::default());
        // sqrt(512 / 2048) = 0.5
        assert_eq!(filter.model_size(), (32, 16));
        assert_eq!(filter_on(&frame).model_size(), (22, 22));
    }

    #[test]
    fn test_static_target_keeps_unit_scale() {
        let frame = noise_frame(100, 2);
        let mut filter = filter_on(&frame);
        let (index, _) = filter.detect(&frame, (50.0, 50.0)).unwrap();
        assert_eq!(index, 16);

        let scale = filter.update(&frame, (50.0, 50.0));
        assert_abs_diff_eq!(scale, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_training_is_an_exponential_moving_average() {
        let frame = noise_frame(100, 3);
        let other = noise_frame(100, 4);
        let mut filter = filter_on(&frame);

        let old_num = filter.num.clone();
        let old_den = filter.den.clone();
        let pyramid = filter.sample(&other, (50.0, 50.0)).unwrap();
        let (new_num, new_den) = filter.fit(&pyramid);

        filter.train(&pyramid, false);

        let rate = ScaleConfig::default().learning_rate;
        for ((a, o), n) in filter.num.iter().zip(old_num.iter()).zip(new_num.iter()) {
            let expected = *o * (1.0 - rate) + *n * rate;
            assert_abs_diff_eq!(a.re, expected.re, epsilon = 1e-3);
            assert_abs_diff_eq!(a.im, expected.im, epsilon = 1e-3);
        }
        for ((a, o), n) in filter.den.iter().zip(old_den.iter()).zip(new_den.iter()) {
            assert_abs_diff_eq!(*a, (1.0 - rate) * o + rate * n, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_rescale_stays_within_bounds() {
        let frame = noise_frame(100, 5);
        let mut filter = filter_on(&frame);
        let (min, max) = filter.bounds();

        for _ in 0..100 {
            filter.rescale(0);
            assert!(filter.current_scale() <= max);
        }
        assert_abs_diff_eq!(filter.current_scale(), max);

        for _ in 0..100 {
            filter.rescale(32);
            assert!(filter.current_scale() >= min);
        }
        assert_abs_diff_eq!(filter.current_scale(), min);
    }

    #[test]
    fn test_degenerate_pyramid_leaves_scale_unchanged() {
        let frame = noise_frame(100, 6);
        let mut filter = filter_on(&frame);
        let far_away = (-500.0, -500.0);

        assert!(filter.sample(&frame, far_away).is_none());
        assert!(filter.detect(&frame, far_away).is_none());

        let den = filter.den.clone();
        assert_abs_diff_eq!(filter.update(&frame, far_away), 1.0);
        assert_eq!(filter.den, den);
    }

    #[test]
    fn test_flat_frame_never_changes_scale() {
        let frame = Frame::Gray(GrayImage::from_pixel(100, 100, Luma([0])));
        let mut filter = filter_on(&frame);

        assert!(filter.sample(&frame, (50.0, 50.0)).is_none());
        assert!(filter.detect(&frame, (50.0, 50.0)).is_none());
        for _ in 0..3 {
            assert_abs_diff_eq!(filter.update(&frame, (50.0, 50.0)), 1.0);
        }
    }

    #[test]
    fn test_flat_region_after_training_keeps_scale() {
        let mut textured = noise_frame(100, 8);
        if let Frame::Gray(img) = &mut textured {
            for y in 0..50 {
                for x in 0..50 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        let mut filter = ScaleFilter::new(&textured, (75.0, 75.0), (20.0, 20.0), 4, &ScaleConfig::default());
        let den = filter.den.clone();

        assert_abs_diff_eq!(filter.update(&textured, (20.0, 20.0)), 1.0);
        assert_eq!(filter.den, den);
    }

    #[test]
    fn test_tiny_target_yields_no_features() {
        let frame = noise_frame(100, 7);
        let filter = ScaleFilter::new(&frame, (50.0, 50.0), (6.0, 6.0), 4, &ScaleConfig::default());
        assert!(filter.sample(&frame, (50.0, 50.0)).is_none());
        assert!(filter.detect(&frame, (50.0, 50.0)).is_none());
    }
}
