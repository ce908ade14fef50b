use crate::estimation::bearing::BearingLikelihoodEstimator;
use crate::estimation::pool::{CancellationFlag, WorkerPool};
use crate::estimation::position::{CrossSitePositionEstimator, SiteEvidence};
use crate::estimation::window::{overlap_group, step_windows};
use crate::interface::output::{BearingBatch, SkipReason, SkippedSite, TrackReport, WindowOutcome};
use crate::interface::record::SignalRecordSource;
use crate::interface::site::CalibrationSource;
use crate::prelude::{EstimationConfig, EstimationError, EstimationResult, SiteId, TimeWindow};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, MetricsSnapshot};
use std::collections::BTreeMap;

/// Request-scoped entry point over a calibration store and a record source.
///
/// Holds no estimation state between calls; only counters accumulate.
pub struct TrackingSession<'a, C: CalibrationSource, R: SignalRecordSource> {
    calibration: &'a C,
    records: &'a R,
    config: EstimationConfig,
    pool: WorkerPool,
    cancel: CancellationFlag,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl<'a, C: CalibrationSource, R: SignalRecordSource> TrackingSession<'a, C, R> {
    pub fn new(calibration: &'a C, records: &'a R, config: EstimationConfig) -> Self {
        let pool = WorkerPool::new(config.workers);
        Self {
            calibration,
            records,
            config,
            pool,
            cancel: CancellationFlag::new(),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("session"),
        }
    }

    /// Shares `flag` with the caller so work can be abandoned between items.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn config(&self) -> &EstimationConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// One bearing estimate per eligible record of `site_id` inside `window`.
    ///
    /// `quality_threshold` overrides the configured threshold; with neither
    /// set nothing is filtered. An unknown site is an error the caller may
    /// choose to skip.
    pub fn estimate_bearings(
        &self,
        site_id: SiteId,
        window: TimeWindow,
        quality_threshold: Option<f64>,
    ) -> EstimationResult<BearingBatch> {
        let model = self.calibration.pattern_for_site(site_id)?;
        let records = self.records.records_for_site(site_id, &window)?;
        let estimator = BearingLikelihoodEstimator::new(site_id, model, self.config.estimator);
        let batch = estimator.run_batch(
            records,
            quality_threshold.or(self.config.quality_threshold),
            &self.pool,
            &self.cancel,
        );

        self.metrics
            .record_batch(batch.estimates.len(), batch.filtered, batch.failures.len());
        if !batch.degenerate.is_empty() {
            self.metrics.record_degenerate(batch.degenerate.len());
        }
        Ok(batch)
    }

    /// Fuses the sites whose windows overlap (within `tolerance`, default the
    /// snapshot duration) into one position fix.
    ///
    /// Estimation failures, skipped sites and unscorable records are reported
    /// on the returned outcome. The call itself fails only for an empty
    /// request or a record source error.
    pub fn estimate_position(
        &self,
        site_windows: &BTreeMap<SiteId, TimeWindow>,
        tolerance: Option<f64>,
    ) -> EstimationResult<WindowOutcome> {
        let tolerance = tolerance.unwrap_or(self.config.snapshot_duration);
        self.fuse(site_windows, tolerance)
    }

    /// Windowed tracking over `span`: windows of `width` seconds centred on
    /// multiples of `step`. Windows without any record are left out, as are
    /// windows interrupted by cancellation.
    pub fn track(
        &self,
        sites: &[SiteId],
        span: TimeWindow,
        width: f64,
        step: f64,
        tolerance: Option<f64>,
    ) -> TrackReport {
        let tolerance = tolerance.unwrap_or(self.config.snapshot_duration);
        if sites.is_empty() {
            return TrackReport::default();
        }
        let windows = step_windows(span, width, step);
        self.logger.record(&format!(
            "tracking {} sites over {} windows on {} threads",
            sites.len(),
            windows.len(),
            self.pool.threads()
        ));

        let partial = self.pool.map(&windows, &self.cancel, |window| {
            let site_windows: BTreeMap<SiteId, TimeWindow> =
                sites.iter().map(|&id| (id, *window)).collect();
            match self.fuse(&site_windows, tolerance) {
                Ok(outcome) if outcome.cancelled || !outcome.has_records() => None,
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    let mut outcome = WindowOutcome::new(*window);
                    outcome.fix = Err(err);
                    Some(outcome)
                }
            }
        });

        let cancelled = partial.cancelled || self.cancel.is_cancelled();
        let report = TrackReport {
            windows: partial.items.into_iter().flatten().collect(),
            cancelled,
        };
        self.logger.record(&format!(
            "tracked {} windows: {} fixes{}",
            report.windows.len(),
            report.fixes().count(),
            if cancelled { ", cancelled" } else { "" }
        ));
        report
    }

    /// Errors only for an empty request or a failing record source;
    /// everything else lands on the outcome.
    fn fuse(
        &self,
        site_windows: &BTreeMap<SiteId, TimeWindow>,
        tolerance: f64,
    ) -> EstimationResult<WindowOutcome> {
        let (group, span) = overlap_group(site_windows, tolerance)
            .ok_or(EstimationError::InsufficientSites { found: 0 })?;
        let mut outcome = WindowOutcome::new(span);
        let mut evidence = Vec::new();

        for (&site_id, window) in site_windows {
            if !group.contains(&site_id) {
                outcome.skipped_sites.push(SkippedSite {
                    site_id,
                    reason: SkipReason::NoTemporalOverlap,
                });
                continue;
            }

            let (site, model) = match (
                self.calibration.site(site_id),
                self.calibration.pattern_for_site(site_id),
            ) {
                (Ok(site), Ok(model)) => (site, model),
                (Err(err), _) | (_, Err(err)) => {
                    self.logger.warn(&format!("skipping site {}: {}", site_id, err));
                    outcome.skipped_sites.push(SkippedSite {
                        site_id,
                        reason: SkipReason::UnknownSite,
                    });
                    continue;
                }
            };

            let batch = self.estimate_bearings(site_id, *window, None)?;
            let estimator = BearingLikelihoodEstimator::new(site_id, model, self.config.estimator);
            match estimator.aggregate(&batch, span.centre()) {
                Some(mut aggregate) => {
                    if let Some(spectrum) = aggregate.spectrum.take() {
                        let weight = if self.config.normalize_spectrum {
                            1.0
                        } else {
                            spectrum.count as f64
                        };
                        evidence.push(SiteEvidence {
                            site,
                            angles: model.angles(),
                            spectrum,
                            activity: aggregate.activity,
                            weight,
                        });
                    }
                    outcome.bearings.push(aggregate);
                }
                None => outcome.skipped_sites.push(SkippedSite {
                    site_id,
                    reason: SkipReason::NoEligibleRecords,
                }),
            }

            outcome.cancelled |= batch.cancelled;
            outcome.filtered += batch.filtered;
            outcome.record_failures.extend(batch.failures);
            if !batch.degenerate.is_empty() {
                outcome.degenerate.insert(site_id, batch.degenerate);
            }
        }

        for skip in &outcome.skipped_sites {
            self.logger.detail(&format!(
                "window [{:.3}, {:.3}]: site {} skipped ({:?})",
                span.start, span.end, skip.site_id, skip.reason
            ));
        }

        let estimator = CrossSitePositionEstimator::new(self.config.position.clone());
        outcome.fix = estimator.estimate(span, &evidence);
        match &outcome.fix {
            Ok(_) => self.metrics.record_fix(),
            Err(err) => {
                self.metrics.record_failed_window();
                self.logger.warn(&format!(
                    "window [{:.3}, {:.3}]: {}",
                    span.start, span.end, err
                ));
            }
        }
        Ok(outcome)
    }
}
