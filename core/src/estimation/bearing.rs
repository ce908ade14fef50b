use crate::estimation::estimator::SpectrumEstimator;
use crate::estimation::pattern::AntennaPatternModel;
use crate::estimation::pool::{CancellationFlag, WorkerPool};
use crate::interface::output::{BearingBatch, BearingEstimate, BearingSpectrum, RecordFailure};
use crate::interface::record::SignalRecord;
use crate::math::stats::StatsHelper;
use crate::prelude::{EstimationError, EstimationResult, EstimatorKind, SiteId};
use crate::telemetry::log::LogManager;

/// Turns one site's snapshots into bearing spectra against its pattern model.
pub struct BearingLikelihoodEstimator<'a> {
    site_id: SiteId,
    model: &'a AntennaPatternModel,
    kind: EstimatorKind,
    logger: LogManager,
}

impl<'a> BearingLikelihoodEstimator<'a> {
    pub fn new(site_id: SiteId, model: &'a AntennaPatternModel, kind: EstimatorKind) -> Self {
        Self {
            site_id,
            model,
            kind,
            logger: LogManager::new("bearing"),
        }
    }

    pub fn spectrum(&self, record: &SignalRecord) -> EstimationResult<BearingSpectrum> {
        let scores = self.kind.estimate(&record.channels, self.model)?;
        Ok(BearingSpectrum {
            site_id: self.site_id,
            timestamp: record.timestamp,
            external_id: Some(record.external_id),
            orientation: self.kind.orientation(),
            scores,
            excluded: self.model.degenerate_rows().to_vec(),
            count: 1,
        })
    }

    /// Best bearing for one record, spectrum attached.
    pub fn estimate(&self, record: &SignalRecord) -> EstimationResult<BearingEstimate> {
        let spectrum = self.spectrum(record)?;
        let mut estimate = spectrum
            .estimate(self.model.angles())
            .ok_or(EstimationError::SilentSnapshot)?;
        estimate.spectrum = Some(spectrum);
        Ok(estimate)
    }

    /// Estimates every record passing `quality_threshold` (inclusive), in
    /// timestamp order. Per-record failures are collected, not fatal.
    pub fn run_batch(
        &self,
        mut records: Vec<SignalRecord>,
        quality_threshold: Option<f64>,
        pool: &WorkerPool,
        cancel: &CancellationFlag,
    ) -> BearingBatch {
        let total = records.len();
        records.retain(|record| record.passes(quality_threshold));
        records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let filtered = total - records.len();

        let outcome = pool.map(&records, cancel, |record| {
            self.estimate(record)
                .map(|estimate| (estimate, record.power()))
                .map_err(|error| RecordFailure {
                    site_id: self.site_id,
                    external_id: record.external_id,
                    timestamp: record.timestamp,
                    error,
                })
        });

        let mut batch = BearingBatch {
            site_id: self.site_id,
            filtered,
            cancelled: outcome.cancelled,
            degenerate: self.model.degenerate_errors(),
            ..Default::default()
        };
        for result in outcome.items {
            match result {
                Ok((estimate, power)) => {
                    batch.estimates.push(estimate);
                    batch.powers.push(power);
                }
                Err(failure) => {
                    self.logger.warn(&format!(
                        "site {} record {}: {}",
                        failure.site_id, failure.external_id, failure.error
                    ));
                    batch.failures.push(failure);
                }
            }
        }

        self.logger.detail(&format!(
            "site {}: {} spectra, {} filtered, {} failed{}",
            self.site_id,
            batch.estimates.len(),
            batch.filtered,
            batch.failures.len(),
            if batch.cancelled { ", cancelled" } else { "" }
        ));
        batch
    }

    /// Window aggregate of a batch: mean spectrum, its best bearing and the
    /// snapshot-power activity. `None` for an empty batch.
    pub fn aggregate(&self, batch: &BearingBatch, timestamp: f64) -> Option<BearingEstimate> {
        let spectra: Vec<BearingSpectrum> = batch.spectra().cloned().collect();
        let spectrum = BearingSpectrum::aggregate(self.site_id, timestamp, &spectra)?;
        let mut estimate = spectrum.estimate(self.model.angles())?;
        estimate.activity = StatsHelper::coefficient_of_variation(&batch.powers);
        estimate.spectrum = Some(spectrum);
        Some(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::calibration::SteeringVectorTable;
    use crate::prelude::Complex32;

    fn model() -> AntennaPatternModel {
        AntennaPatternModel::new(SteeringVectorTable::circular_array(4, 0.35, 1.0).unwrap())
            .unwrap()
    }

    fn record(model: &AntennaPatternModel, angle: usize, timestamp: f64, quality: f64) -> SignalRecord {
        SignalRecord::new(
            1,
            timestamp,
            model.table().response(angle).to_vec(),
            quality,
            (timestamp * 100.0) as u64,
        )
    }

    #[test]
    fn batch_filters_by_inclusive_threshold() {
        let model = model();
        let estimator = BearingLikelihoodEstimator::new(1, &model, EstimatorKind::Bartlett);
        let records = vec![
            record(&model, 10, 0.1, 0.1),
            record(&model, 20, 0.2, 0.5),
            record(&model, 30, 0.3, 0.9),
        ];
        let batch = estimator.run_batch(
            records,
            Some(0.5),
            &WorkerPool::new(Some(2)),
            &CancellationFlag::new(),
        );
        let bearings: Vec<f64> = batch.estimates.iter().map(|e| e.bearing_deg).collect();
        assert_eq!(bearings, vec![20.0, 30.0]);
        assert_eq!(batch.filtered, 1);
    }

    #[test]
    fn batch_is_sorted_and_reports_bad_records() {
        let model = model();
        let estimator =
            BearingLikelihoodEstimator::new(1, &model, EstimatorKind::MaximumLikelihood);
        let mut bad = record(&model, 0, 0.15, 1.0);
        bad.channels.truncate(2);
        let records = vec![record(&model, 90, 0.3, 1.0), bad, record(&model, 45, 0.1, 1.0)];
        let batch = estimator.run_batch(records, None, &WorkerPool::new(None), &CancellationFlag::new());

        let times: Vec<f64> = batch.estimates.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![0.1, 0.3]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(
            batch.failures[0].error,
            EstimationError::ChannelMismatch {
                expected: 4,
                found: 2
            }
        );
    }

    #[test]
    fn empty_input_yields_empty_batch() {
        let model = model();
        let estimator = BearingLikelihoodEstimator::new(1, &model, EstimatorKind::Bartlett);
        let batch = estimator.run_batch(Vec::new(), None, &WorkerPool::new(Some(1)), &CancellationFlag::new());
        assert!(batch.is_empty());
        assert!(batch.failures.is_empty());
        assert!(!batch.cancelled);
    }

    #[test]
    fn aggregate_reports_activity_and_bearing() {
        let model = model();
        let estimator = BearingLikelihoodEstimator::new(1, &model, EstimatorKind::Bartlett);
        let mut loud = record(&model, 200, 0.2, 1.0);
        loud.channels = loud.channels.iter().map(|v| *v * Complex32::new(3.0, 0.0)).collect();
        let records = vec![record(&model, 200, 0.1, 1.0), loud];
        let batch = estimator.run_batch(
            records,
            None,
            &WorkerPool::new(Some(1)),
            &CancellationFlag::new(),
        );
        let aggregate = estimator.aggregate(&batch, 0.15).unwrap();
        assert_eq!(aggregate.bearing_deg, 200.0);
        assert!(aggregate.confidence > 0.999);
        assert!(aggregate.activity.unwrap() > 0.0);
        assert_eq!(aggregate.spectrum.unwrap().count, 2);
    }
}
