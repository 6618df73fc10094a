//! Tracker configuration
//!
//! Every tunable is derived from four mode flags, which are coupled:
//! multiscale forces a fixed window and colour features need gradient
//! features. [`TrackerConfig::from_flags`] resolves them; the resulting struct
//! can then be tweaked field by field before the tracker is built.

use crate::error::{KcfError, Result};
use serde::{Deserialize, Serialize};

/// Mode flags the tunables are derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerFlags {
    /// FHOG features (otherwise raw intensity)
    pub gradient_features: bool,
    /// Fixed-size template window (otherwise the window follows the ROI size)
    pub fixed_window: bool,
    /// Enable the scale filter; forces `fixed_window`
    pub multiscale: bool,
    /// Append colour-cluster histograms to the FHOG channels
    pub color_features: bool,
}

impl Default for TrackerFlags {
    fn default() -> Self {
        Self {
            gradient_features: true,
            fixed_window: true,
            multiscale: true,
            color_features: true,
        }
    }
}

/// Which feature extractor the appearance filter runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Single channel of centred gray levels, one cell per pixel
    Raw,
    /// 31-channel FHOG
    Hog,
    /// FHOG followed by the colour-cluster histogram channels
    HogColor,
}

impl FeatureKind {
    pub fn is_gradient(self) -> bool {
        matches!(self, FeatureKind::Hog | FeatureKind::HogColor)
    }
}

/// Scale filter tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Ratio between neighbouring pyramid levels; 1 disables scale search
    pub scale_step: f32,
    /// Number of pyramid levels
    pub n_scales: usize,
    /// EMA rate of the numerator/denominator accumulators
    pub learning_rate: f32,
    /// Regulariser added to the denominator
    pub lambda: f32,
    /// Bandwidth of the 1-D Gaussian label, relative to `sqrt(n_scales)`
    pub sigma_factor: f32,
    /// Context around the target used when deriving the minimum scale
    pub padding: f32,
    /// Largest area (in pixels) a pyramid sample is resized to
    pub max_area: f32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            scale_step: 1.05,
            n_scales: 33,
            learning_rate: 0.025,
            lambda: 0.01,
            sigma_factor: 0.25,
            padding: 1.0,
            max_area: 512.0,
        }
    }
}

/// Fully resolved tracker tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub feature_kind: FeatureKind,
    pub fixed_window: bool,
    pub multiscale: bool,
    /// Ridge regression regulariser
    pub lambda: f32,
    /// Gaussian kernel bandwidth
    pub sigma: f32,
    /// Linear interpolation factor for model adaptation
    pub interp_factor: f32,
    /// Feature cell size in pixels
    pub cell_size: usize,
    /// Search area around the target, relative to its size
    pub padding: f32,
    /// Bandwidth of the Gaussian regression target
    pub output_sigma_factor: f32,
    /// Template size in pixels; values <= 1 use the padded ROI size
    pub template_size: u32,
    pub scale: ScaleConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_flags(TrackerFlags::default())
    }
}

impl TrackerConfig {
    /// Derive every tunable from the mode flags
    pub fn from_flags(flags: TrackerFlags) -> Self {
        let mut config = Self {
            feature_kind: FeatureKind::Raw,
            fixed_window: flags.fixed_window,
            multiscale: flags.multiscale,
            lambda: 0.0001,
            sigma: 0.2,
            interp_factor: 0.075,
            cell_size: 1,
            padding: 2.5,
            output_sigma_factor: 0.125,
            template_size: 1,
            scale: ScaleConfig {
                scale_step: 1.0,
                ..ScaleConfig::default()
            },
        };

        if flags.gradient_features {
            config.feature_kind = FeatureKind::Hog;
            config.interp_factor = 0.012;
            config.sigma = 0.6;
            config.cell_size = 4;

            if flags.color_features {
                config.feature_kind = FeatureKind::HogColor;
                config.interp_factor = 0.005;
                config.sigma = 0.4;
                config.output_sigma_factor = 0.1;
            }
        } else if flags.color_features {
            log::warn!("Colour features require gradient features; using raw intensity only");
        }

        if flags.multiscale {
            config.template_size = 96;
            config.scale = ScaleConfig::default();
            if !flags.fixed_window {
                log::debug!("Multiscale tracking needs a fixed window; enabling it");
                config.fixed_window = true;
            }
        } else if flags.fixed_window {
            config.template_size = 96;
        }

        config
    }

    /// Reject tunables the filters cannot work with
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f32) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(KcfError::config(format!(
                    "{} must be finite and positive, got {}",
                    name, value
                )))
            }
        }

        fn rate(name: &str, value: f32) -> Result<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(KcfError::config(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )))
            }
        }

        positive("lambda", self.lambda)?;
        positive("sigma", self.sigma)?;
        positive("padding", self.padding)?;
        positive("output_sigma_factor", self.output_sigma_factor)?;
        rate("interp_factor", self.interp_factor)?;

        if self.cell_size == 0 {
            return Err(KcfError::config("cell_size must be at least 1"));
        }
        if self.feature_kind == FeatureKind::Raw && self.cell_size != 1 {
            return Err(KcfError::config("raw features use a cell size of 1"));
        }

        if self.multiscale {
            if !self.fixed_window {
                return Err(KcfError::config("multiscale tracking needs a fixed window"));
            }
            positive("scale_step", self.scale.scale_step)?;
            positive("scale lambda", self.scale.lambda)?;
            positive("scale sigma_factor", self.scale.sigma_factor)?;
            positive("scale max_area", self.scale.max_area)?;
            rate("scale learning_rate", self.scale.learning_rate)?;
            if self.scale.n_scales == 0 {
                return Err(KcfError::config("n_scales must be at least 1"));
            }
            if self.scale.padding < 0.0 || !self.scale.padding.is_finite() {
                return Err(KcfError::config("scale padding must be non-negative"));
            }
        }

        Ok(())
    }
}
