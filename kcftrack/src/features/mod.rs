//! Dense feature extraction from image patches
//!
//! Every extractor returns an `Array3<f32>` laid out as
//! `(channels, rows, cols)` so each channel plane is contiguous.

pub mod color;
pub mod fhog;
pub mod gray;

use crate::config::{FeatureKind, TrackerConfig};
use crate::image::Frame;
use ndarray::Array3;
use std::fmt;
use std::sync::Arc;

pub use color::{ColorCentroids, HogColorFeatures};
pub use fhog::{Fhog, FHOG_CHANNELS};
pub use gray::RawIntensity;

/// Common interface for patch feature extractors
pub trait FeatureExtractor: Send + Sync + fmt::Debug {
    /// Features of `patch`, shaped `(channels, rows, cols)`
    fn extract(&self, patch: &Frame) -> Array3<f32>;

    /// Pixels per feature cell along each axis
    fn cell_size(&self) -> usize;

    /// Extractor name (for logging)
    fn name(&self) -> &str;
}

/// Build the extractor selected by `config`
pub fn extractor_for(config: &TrackerConfig) -> Box<dyn FeatureExtractor> {
    match config.feature_kind {
        FeatureKind::Raw => Box::new(RawIntensity),
        FeatureKind::Hog => Box::new(Fhog::new(config.cell_size)),
        FeatureKind::HogColor => Box::new(HogColorFeatures::new(
            Fhog::new(config.cell_size),
            Arc::new(ColorCentroids::default()),
        )),
    }
}
