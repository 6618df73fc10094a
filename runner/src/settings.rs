//! JSON runner settings

use crate::error::Result;
use kcftrack::{FeatureKind, TrackerConfig, TrackerFlags};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tracker mode flags plus optional overrides of the derived tunables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub flags: TrackerFlags,
    pub overrides: Overrides,
}

/// Every field left `None` keeps the value derived from the flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    pub feature_kind: Option<FeatureKind>,
    pub lambda: Option<f32>,
    pub sigma: Option<f32>,
    pub interp_factor: Option<f32>,
    pub cell_size: Option<usize>,
    pub padding: Option<f32>,
    pub output_sigma_factor: Option<f32>,
    pub template_size: Option<u32>,
    pub scale_step: Option<f32>,
    pub n_scales: Option<usize>,
    pub scale_learning_rate: Option<f32>,
    pub scale_lambda: Option<f32>,
    pub scale_sigma_factor: Option<f32>,
    pub scale_padding: Option<f32>,
    pub scale_max_area: Option<f32>,
}

impl RunnerSettings {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Resolve the flags, then apply the overrides
    pub fn into_config(self) -> TrackerConfig {
        let mut config = TrackerConfig::from_flags(self.flags);
        let o = self.overrides;

        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut config.feature_kind, o.feature_kind);
        set(&mut config.lambda, o.lambda);
        set(&mut config.sigma, o.sigma);
        set(&mut config.interp_factor, o.interp_factor);
        set(&mut config.cell_size, o.cell_size);
        set(&mut config.padding, o.padding);
        set(&mut config.output_sigma_factor, o.output_sigma_factor);
        set(&mut config.template_size, o.template_size);
        set(&mut config.scale.scale_step, o.scale_step);
        set(&mut config.scale.n_scales, o.n_scales);
        set(&mut config.scale.learning_rate, o.scale_learning_rate);
        set(&mut config.scale.lambda, o.scale_lambda);
        set(&mut config.scale.sigma_factor, o.scale_sigma_factor);
        set(&mut config.scale.padding, o.scale_padding);
        set(&mut config.scale.max_area, o.scale_max_area);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_empty_json_uses_default_flags() {
        let settings: RunnerSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, RunnerSettings::default());
        assert_eq!(settings.into_config(), TrackerConfig::default());
    }

    #[test]
    fn test_overrides_apply_after_flags() {
        let json = r#"{
            "flags": {
                "gradient_features": true,
                "fixed_window": true,
                "multiscale": false,
                "color_features": false
            },
            "overrides": { "interp_factor": 0.02, "template_size": 64, "n_scales": 17 }
        }"#;
        let config: TrackerConfig = serde_json::from_str::<RunnerSettings>(json)
            .unwrap()
            .into_config();

        assert_eq!(config.feature_kind, FeatureKind::Hog);
        assert!(!config.multiscale);
        assert_abs_diff_eq!(config.interp_factor, 0.02);
        assert_eq!(config.template_size, 64);
        assert_eq!(config.scale.n_scales, 17);
        assert_abs_diff_eq!(config.sigma, 0.6);
    }

    #[test]
    fn test_unknown_override_is_rejected() {
        let json = r#"{ "overrides": { "kernel": "linear" } }"#;
        assert!(serde_json::from_str::<RunnerSettings>(json).is_err());
    }

    #[test]
    fn test_settings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = RunnerSettings::default();
        settings.flags.color_features = false;
        settings.overrides.sigma = Some(0.5);
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();

        let loaded = RunnerSettings::from_json_file(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_abs_diff_eq!(loaded.into_config().sigma, 0.5);
    }
}
