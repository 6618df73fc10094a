//! Single-target tracker combining the appearance and scale filters

use crate::appearance::AppearanceFilter;
use crate::bbox::BoundingBox;
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::features::{extractor_for, FeatureExtractor};
use crate::image::Frame;
use crate::scale::ScaleFilter;
use ndarray::Array3;

/// Size of the feature window and its relation to frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
struct TemplateGeometry {
    /// Template size in pixels `(width, height)` after resizing
    size: (u32, u32),
    /// Frame pixels per template pixel at unit scale
    scale: f32,
}

impl TemplateGeometry {
    fn new(roi: &BoundingBox, config: &TrackerConfig) -> Self {
        let padded_w = (roi.width * config.padding) as u32;
        let padded_h = (roi.height * config.padding) as u32;

        let (mut width, mut height, scale) = if config.template_size > 1 {
            let template = config.template_size;
            let longest = padded_w.max(padded_h);
            if longest == 0 {
                (0, 0, 1.0)
            } else {
                // The longer side maps onto exactly `template_size` pixels
                let shrink = |side: u32| (side as u64 * template as u64 / longest as u64) as u32;
                (shrink(padded_w), shrink(padded_h), longest as f32 / template as f32)
            }
        } else {
            (padded_w, padded_h, 1.0)
        };

        if config.feature_kind.is_gradient() {
            // Even number of cells plus one border cell on each side
            let block = 2 * config.cell_size as u32;
            width = (width / block) * block + block;
            height = (height / block) * block + block;
        } else {
            width = ((width / 2) * 2).max(2);
            height = ((height / 2) * 2).max(2);
        }

        Self {
            size: (width, height),
            scale,
        }
    }
}

#[derive(Debug)]
struct TrackState {
    roi: BoundingBox,
    geometry: TemplateGeometry,
    appearance: AppearanceFilter,
    scale: Option<ScaleFilter>,
    last_peak: f32,
}

impl TrackState {
    fn current_scale(&self) -> f32 {
        self.scale.as_ref().map_or(1.0, ScaleFilter::current_scale)
    }
}

/// Kernelized correlation filter tracker for one target
#[derive(Debug)]
pub struct KcfTracker {
    config: TrackerConfig,
    extractor: Box<dyn FeatureExtractor>,
    state: Option<TrackState>,
}

impl KcfTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let extractor = extractor_for(&config);
        log::debug!(
            "KCF tracker: {} features, cell {}, multiscale {}",
            extractor.name(),
            extractor.cell_size(),
            config.multiscale
        );
        Ok(Self {
            config,
            extractor,
            state: None,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Current target box, `None` before `init`
    pub fn roi(&self) -> Option<BoundingBox> {
        self.state.as_ref().map(|s| s.roi)
    }

    /// Scale multiplier relative to the initial box (1 without a scale filter)
    pub fn current_scale(&self) -> f32 {
        self.state.as_ref().map_or(1.0, TrackState::current_scale)
    }

    /// `(min, max)` scale multipliers when the scale filter is active
    pub fn scale_bounds(&self) -> Option<(f32, f32)> {
        self.state
            .as_ref()
            .and_then(|s| s.scale.as_ref())
            .map(ScaleFilter::bounds)
    }

    /// Appearance response peak of the last `update`
    pub fn last_peak(&self) -> Option<f32> {
        self.state.as_ref().map(|s| s.last_peak)
    }

    /// Start tracking `roi` in `frame`, discarding any previous model.
    ///
    /// # Panics
    ///
    /// Panics when the box has a negative width or height.
    pub fn init(&mut self, roi: BoundingBox, frame: &Frame) {
        assert!(
            roi.width >= 0.0 && roi.height >= 0.0,
            "initial box must have non-negative size, got {}",
            roi
        );

        let geometry = TemplateGeometry::new(&roi, &self.config);
        let (cx, cy) = roi.center();
        let features = self.features_at(frame, &geometry, cx, cy, 1.0);
        let appearance = AppearanceFilter::new(&features, &self.config);

        let scale = self.config.multiscale.then(|| {
            ScaleFilter::new(
                frame,
                (cx, cy),
                (roi.width, roi.height),
                self.config.cell_size,
                &self.config.scale,
            )
        });

        log::debug!(
            "Tracker initialised at {}: template {}x{}, features {:?}",
            roi,
            geometry.size.0,
            geometry.size.1,
            appearance.shape()
        );

        self.state = Some(TrackState {
            roi,
            geometry,
            appearance,
            scale,
            last_peak: 1.0,
        });
    }

    /// Start tracking the box spanned by two corner points, clipped to the frame
    pub fn init_from_corners(&mut self, p1: (f32, f32), p2: (f32, f32), frame: &Frame) {
        let frame_box = BoundingBox::new(0.0, 0.0, frame.width() as f32, frame.height() as f32);
        let roi = BoundingBox::from_corners(p1, p2).intersect(&frame_box);
        self.init(roi, frame);
    }

    /// Locate the target in the next frame and adapt the model.
    ///
    /// # Panics
    ///
    /// Panics when called before [`KcfTracker::init`].
    pub fn update(&mut self, frame: &Frame) -> BoundingBox {
        let mut state = self
            .state
            .take()
            .expect("KcfTracker::update called before init");
        let (frame_w, frame_h) = (frame.width(), frame.height());

        state.roi.clamp_before_search(frame_w, frame_h);

        let (cx, cy) = state.roi.center();
        let current = state.current_scale();
        let candidate = self.features_at(frame, &state.geometry, cx, cy, current);
        let detection = state.appearance.detect(&candidate);
        state.last_peak = detection.peak;

        let step = self.config.cell_size as f32 * state.geometry.scale * current;
        state.roi.x = cx - state.roi.width / 2.0 + detection.offset.0 * step;
        state.roi.y = cy - state.roi.height / 2.0 + detection.offset.1 * step;
        state.roi.clamp_after_move(frame_w, frame_h);

        if let Some(scale) = state.scale.as_mut() {
            let center = state.roi.center();
            let factor = scale.update(frame, center);
            let (base_w, base_h) = scale.base_size();
            state.roi = BoundingBox::from_center(center.0, center.1, base_w * factor, base_h * factor);
        }
        state.roi.clamp_after_move(frame_w, frame_h);

        let (cx, cy) = state.roi.center();
        let current = state.current_scale();
        let features = self.features_at(frame, &state.geometry, cx, cy, current);
        state.appearance.train(&features, self.config.interp_factor);

        log::trace!(
            "Tracked {} (peak {:.3}, scale {:.3})",
            state.roi,
            detection.peak,
            current
        );

        let roi = state.roi;
        self.state = Some(state);
        roi
    }

    /// Feature map of the window centred at `(cx, cy)` at `scale`, resized to
    /// the template size
    fn features_at(
        &self,
        frame: &Frame,
        geometry: &TemplateGeometry,
        cx: f32,
        cy: f32,
        scale: f32,
    ) -> Array3<f32> {
        let extent = geometry.scale * scale;
        let width = ((extent * geometry.size.0 as f32) as u32).max(1);
        let height = ((extent * geometry.size.1 as f32) as u32).max(1);
        let x = (cx - width as f32 / 2.0).round() as i64;
        let y = (cy - height as f32 / 2.0).round() as i64;

        let patch = frame
            .subwindow(x, y, width, height)
            .resize(geometry.size.0, geometry.size.1);
        self.extractor.extract(&patch)
    }
}
