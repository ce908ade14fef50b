use crate::generator::array::calibration_bytes;
use crate::generator::scenario::build_records;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use log::info;
use serde::Serialize;
use trackcore::estimation::CancellationFlag;
use trackcore::telemetry::MetricsSnapshot;
use trackcore::{CalibrationStore, InMemoryRecordSet, TrackingSession};

/// One window's fix compared against the scenario's true emitter track.
#[derive(Debug, Clone, Serialize)]
pub struct FixSummary {
    pub start: f64,
    pub end: f64,
    pub x: f64,
    pub y: f64,
    pub residual: f64,
    pub sites: usize,
    pub refined: bool,
    pub activity: Option<f64>,
    pub error_m: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub windows: usize,
    pub fixes: Vec<FixSummary>,
    pub failures: Vec<String>,
    /// Sites left out of a window, with the reason.
    pub skipped: Vec<String>,
    pub record_failures: usize,
    pub mean_error_m: Option<f64>,
    pub metrics: MetricsSnapshot,
    pub cancelled: bool,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Calibration for every scenario site, passed through the binary table format.
    pub fn build_store(&self) -> anyhow::Result<CalibrationStore> {
        let bytes = calibration_bytes(&self.config.array)?;
        let mut store = CalibrationStore::new();
        for site in &self.config.scenario.sites {
            store
                .load_site(site.to_site(), &bytes)
                .with_context(|| format!("loading calibration for site {}", site.id))?;
        }
        Ok(store)
    }

    pub fn synthesize_records(&self) -> InMemoryRecordSet {
        build_records(&self.config.scenario, &self.config.array)
    }

    pub fn execute(
        &self,
        records: &InMemoryRecordSet,
        cancel: CancellationFlag,
    ) -> anyhow::Result<WorkflowResult> {
        let store = self.build_store()?;
        let sites = self.config.scenario.site_ids();
        let span = records
            .time_span(&sites)
            .context("record set holds no pulses for the configured sites")?;

        let session = TrackingSession::new(&store, records, self.config.to_estimation_config())
            .with_cancellation(cancel);
        let report = session.track(
            &sites,
            span,
            self.config.window,
            self.config.step,
            self.config.tolerance,
        );

        let fixes: Vec<FixSummary> = report
            .fixes()
            .map(|fix| {
                let truth = self.config.scenario.emitter.position_at(fix.window.centre());
                FixSummary {
                    start: fix.window.start,
                    end: fix.window.end,
                    x: fix.estimate.x,
                    y: fix.estimate.y,
                    residual: fix.residual,
                    sites: fix.contributing_sites.len(),
                    refined: fix.refined,
                    activity: fix.activity,
                    error_m: fix.estimate.distance(&truth),
                }
            })
            .collect();
        let failures: Vec<String> = report
            .failures()
            .map(|(window, err)| format!("[{:.2}, {:.2}] {}", window.start, window.end, err))
            .collect();
        let skipped: Vec<String> = report
            .windows
            .iter()
            .flat_map(|outcome| {
                outcome.skipped_sites.iter().map(move |skip| {
                    format!(
                        "[{:.2}, {:.2}] site {} {:?}",
                        outcome.window.start, outcome.window.end, skip.site_id, skip.reason
                    )
                })
            })
            .collect();
        let record_failures: usize = report
            .windows
            .iter()
            .map(|outcome| outcome.record_failures.len())
            .sum();
        let mean_error_m = if fixes.is_empty() {
            None
        } else {
            Some(fixes.iter().map(|f| f.error_m).sum::<f64>() / fixes.len() as f64)
        };

        info!(
            "workflow finished: {} windows, {} fixes, {} failures",
            report.windows.len(),
            fixes.len(),
            failures.len()
        );

        Ok(WorkflowResult {
            windows: report.windows.len(),
            fixes,
            failures,
            skipped,
            record_failures,
            mean_error_m,
            metrics: session.metrics(),
            cancelled: report.cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackcore::prelude::EstimatorKind;

    #[test]
    fn runner_tracks_synthetic_emitter() {
        for estimator in [EstimatorKind::Bartlett, EstimatorKind::MaximumLikelihood] {
            let cfg = WorkflowConfig::from_args(estimator, 1.0, 1.0, 3);
            let runner = Runner::new(cfg);
            let records = runner.synthesize_records();
            let result = runner.execute(&records, CancellationFlag::new()).unwrap();

            assert!(!result.cancelled);
            assert!(result.windows > 0);
            assert!(result.failures.is_empty(), "{:?}", result.failures);
            assert_eq!(result.record_failures, 0);
            assert_eq!(result.fixes.len(), result.windows);
            assert!(result.fixes.iter().all(|f| f.sites >= 2));
            assert!(result.mean_error_m.unwrap() < 150.0);
            assert!(result.metrics.filtered > 0);
        }
    }

    #[test]
    fn empty_record_set_is_an_error() {
        let runner = Runner::new(WorkflowConfig::default());
        assert!(runner
            .execute(&InMemoryRecordSet::new(), CancellationFlag::new())
            .is_err());
    }
}
