use crate::generator::array::ArrayConfig;
use crate::generator::scenario::ScenarioConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use trackcore::prelude::{EstimationConfig, EstimatorKind, PositionSearchConfig};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub estimator: EstimatorKind,
    pub quality_threshold: Option<f64>,
    /// Tracking window width in seconds.
    pub window: f64,
    /// Spacing of window centres in seconds.
    pub step: f64,
    /// Cross-site overlap tolerance; the snapshot duration when unset.
    pub tolerance: Option<f64>,
    pub normalize_spectrum: bool,
    pub workers: Option<usize>,
    pub search: PositionSearchConfig,
    pub array: ArrayConfig,
    pub scenario: ScenarioConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorKind::Bartlett,
            quality_threshold: Some(0.4),
            window: 1.0,
            step: 1.0,
            tolerance: None,
            normalize_spectrum: true,
            workers: None,
            search: PositionSearchConfig::default(),
            array: ArrayConfig::default(),
            scenario: ScenarioConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(estimator: EstimatorKind, window: f64, step: f64, seed: u64) -> Self {
        let mut config = Self {
            estimator,
            window,
            step,
            ..Default::default()
        };
        config.scenario.seed = seed;
        config
    }

    pub fn to_estimation_config(&self) -> EstimationConfig {
        let mut config = EstimationConfig {
            estimator: self.estimator,
            quality_threshold: self.quality_threshold,
            normalize_spectrum: self.normalize_spectrum,
            workers: self.workers,
            position: self.search.clone(),
            ..Default::default()
        };
        if let Some(tolerance) = self.tolerance {
            config.snapshot_duration = tolerance;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_produces_estimation_config() {
        let cfg = WorkflowConfig::from_args(EstimatorKind::MaximumLikelihood, 2.0, 0.5, 11);
        let estimation = cfg.to_estimation_config();
        assert_eq!(estimation.estimator, EstimatorKind::MaximumLikelihood);
        assert_eq!(estimation.quality_threshold, Some(0.4));
        assert_eq!(cfg.scenario.seed, 11);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"estimator: maximum_likelihood\nwindow: 2.5\ntolerance: 0.1\nsearch:\n  levels: 2\nscenario:\n  pulses: 10\n  sites:\n    - { id: 4, name: a, x: 0.0, y: 0.0 }\n    - { id: 5, name: b, x: 500.0, y: 0.0 }\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.estimator, EstimatorKind::MaximumLikelihood);
        assert_eq!(cfg.window, 2.5);
        assert_eq!(cfg.search.levels, 2);
        assert_eq!(cfg.search.half_span, 15);
        assert_eq!(cfg.scenario.site_ids(), vec![4, 5]);
        assert_eq!(cfg.to_estimation_config().snapshot_duration, 0.1);
    }
}
