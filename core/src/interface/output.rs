use crate::math::geometry::{periodic_interp, PlanarPoint};
use crate::math::stats::StatsHelper;
use crate::prelude::{EstimationError, EstimationResult, Orientation, SiteId, TimeWindow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Score per calibrated angle of one site, for one snapshot or a window aggregate.
///
/// `scores` are per-snapshot values (the mean when `count > 1`). Rows listed in
/// `excluded` come from degenerate steering vectors and never win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BearingSpectrum {
    pub site_id: SiteId,
    pub timestamp: f64,
    pub external_id: Option<u64>,
    pub orientation: Orientation,
    pub scores: Vec<f64>,
    pub excluded: Vec<usize>,
    pub count: usize,
}

impl BearingSpectrum {
    /// Element-wise mean of spectra from the same site and calibration grid.
    pub fn aggregate(
        site_id: SiteId,
        timestamp: f64,
        spectra: &[BearingSpectrum],
    ) -> Option<BearingSpectrum> {
        let first = spectra.first()?;
        let total: usize = spectra.iter().map(|s| s.count).sum();
        let mut scores = vec![0.0; first.scores.len()];
        let mut excluded: BTreeSet<usize> = BTreeSet::new();

        for spectrum in spectra {
            debug_assert_eq!(spectrum.orientation, first.orientation);
            debug_assert_eq!(spectrum.scores.len(), scores.len());
            let weight = spectrum.count as f64;
            for (acc, value) in scores.iter_mut().zip(&spectrum.scores) {
                *acc += weight * value;
            }
            excluded.extend(spectrum.excluded.iter().copied());
        }
        for value in scores.iter_mut() {
            *value /= total.max(1) as f64;
        }

        Some(BearingSpectrum {
            site_id,
            timestamp,
            external_id: None,
            orientation: first.orientation,
            scores,
            excluded: excluded.into_iter().collect(),
            count: total,
        })
    }

    pub fn best_index(&self) -> Option<usize> {
        StatsHelper::arg_best(&self.scores, self.orientation, &self.excluded)
    }

    /// Agreement with the steering vector in `[0, 1]`: the Bartlett value, or
    /// one minus the ML cost.
    pub fn confidence_at(&self, index: usize) -> f64 {
        let value = self.scores[index];
        let confidence = match self.orientation {
            Orientation::HigherIsBetter => value,
            Orientation::LowerIsBetter => 1.0 - value,
        };
        confidence.clamp(0.0, 1.0)
    }

    /// Interpolated score at an arbitrary bearing.
    pub fn value_at(&self, angles: &[f32], bearing_deg: f64) -> f64 {
        periodic_interp(angles, &self.scores, bearing_deg)
    }

    /// Interpolated score mapped to higher-is-better.
    pub fn likelihood_at(&self, angles: &[f32], bearing_deg: f64) -> f64 {
        self.orientation
            .to_likelihood(self.value_at(angles, bearing_deg))
    }

    /// Interpolated residual (the ML cost, or one minus the Bartlett value).
    pub fn residual_at(&self, angles: &[f32], bearing_deg: f64) -> f64 {
        let value = self.value_at(angles, bearing_deg);
        match self.orientation {
            Orientation::HigherIsBetter => 1.0 - value,
            Orientation::LowerIsBetter => value,
        }
    }

    /// Arg-extremum of this spectrum, without the spectrum attached.
    pub fn estimate(&self, angles: &[f32]) -> Option<BearingEstimate> {
        let index = self.best_index()?;
        Some(BearingEstimate {
            site_id: self.site_id,
            timestamp: self.timestamp,
            bearing_deg: angles[index] as f64,
            confidence: self.confidence_at(index),
            activity: None,
            spectrum: None,
        })
    }
}

/// Most likely bearing at a site, optionally carrying its spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BearingEstimate {
    pub site_id: SiteId,
    pub timestamp: f64,
    pub bearing_deg: f64,
    pub confidence: f64,
    /// Power variation across the window's snapshots, for window aggregates.
    pub activity: Option<f64>,
    pub spectrum: Option<BearingSpectrum>,
}

/// Record that could not be scored; the rest of its batch is unaffected.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub site_id: SiteId,
    pub external_id: u64,
    pub timestamp: f64,
    pub error: EstimationError,
}

/// Result of estimating every eligible record of one site and window.
#[derive(Debug, Clone, Default)]
pub struct BearingBatch {
    pub site_id: SiteId,
    /// One estimate per scored record, ascending timestamp, spectrum attached.
    pub estimates: Vec<BearingEstimate>,
    /// Snapshot power `|s|^2` of each estimated record, parallel to `estimates`.
    pub powers: Vec<f64>,
    pub failures: Vec<RecordFailure>,
    /// Calibration rows excluded from every estimate in this batch.
    pub degenerate: Vec<EstimationError>,
    /// Records dropped by the quality threshold.
    pub filtered: usize,
    pub cancelled: bool,
}

impl BearingBatch {
    pub fn spectra(&self) -> impl Iterator<Item = &BearingSpectrum> + '_ {
        self.estimates.iter().filter_map(|e| e.spectrum.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }
}

/// Why a requested site did not contribute to a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownSite,
    NoEligibleRecords,
    NoTemporalOverlap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSite {
    pub site_id: SiteId,
    pub reason: SkipReason,
}

/// Planar position estimate fused from two or more sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub window: TimeWindow,
    pub estimate: PlanarPoint,
    /// Summed per-site residual at the estimate; smaller is better.
    pub residual: f64,
    /// Summed sign-normalized likelihood at the estimate; larger is better.
    pub likelihood: f64,
    pub contributing_sites: BTreeSet<SiteId>,
    /// Mean activity over contributing sites.
    pub activity: Option<f64>,
    /// False when the estimate came from the exhaustive fallback search.
    pub refined: bool,
    pub iterations: usize,
}

/// Everything one window's fusion produced, whether or not a fix came out.
#[derive(Debug, Clone)]
pub struct WindowOutcome {
    /// Union of the overlapping site windows.
    pub window: TimeWindow,
    /// Window-aggregated bearing per site that had eligible records.
    pub bearings: Vec<BearingEstimate>,
    pub skipped_sites: Vec<SkippedSite>,
    /// Records that could not be scored, across every contributing site.
    pub record_failures: Vec<RecordFailure>,
    /// Excluded calibration rows, per site that reported any.
    pub degenerate: BTreeMap<SiteId, Vec<EstimationError>>,
    /// Records dropped by the quality threshold.
    pub filtered: usize,
    /// Set when a batch was cut short; the fix then rests on partial evidence.
    pub cancelled: bool,
    pub fix: EstimationResult<PositionFix>,
}

impl WindowOutcome {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            bearings: Vec::new(),
            skipped_sites: Vec::new(),
            record_failures: Vec::new(),
            degenerate: BTreeMap::new(),
            filtered: 0,
            cancelled: false,
            fix: Err(EstimationError::InsufficientSites { found: 0 }),
        }
    }

    /// Whether any site had a record inside the window, scored or not.
    pub fn has_records(&self) -> bool {
        !self.bearings.is_empty() || !self.record_failures.is_empty() || self.filtered > 0
    }

    pub fn skip_reason(&self, site_id: SiteId) -> Option<SkipReason> {
        self.skipped_sites
            .iter()
            .find(|skip| skip.site_id == site_id)
            .map(|skip| skip.reason)
    }
}

/// Output of windowed tracking; windows after a cancellation are absent.
#[derive(Debug, Clone, Default)]
pub struct TrackReport {
    pub windows: Vec<WindowOutcome>,
    pub cancelled: bool,
}

impl TrackReport {
    pub fn fixes(&self) -> impl Iterator<Item = &PositionFix> + '_ {
        self.windows.iter().filter_map(|w| w.fix.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&TimeWindow, &EstimationError)> + '_ {
        self.windows
            .iter()
            .filter_map(|w| w.fix.as_ref().err().map(|e| (&w.window, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(orientation: Orientation, scores: Vec<f64>) -> BearingSpectrum {
        BearingSpectrum {
            site_id: 1,
            timestamp: 0.0,
            external_id: Some(7),
            orientation,
            scores,
            excluded: Vec::new(),
            count: 1,
        }
    }

    #[test]
    fn aggregate_weights_by_snapshot_count() {
        let mut a = spectrum(Orientation::HigherIsBetter, vec![1.0, 0.0]);
        a.count = 3;
        let mut b = spectrum(Orientation::HigherIsBetter, vec![0.0, 1.0]);
        b.excluded = vec![1];
        let merged = BearingSpectrum::aggregate(1, 5.0, &[a, b]).unwrap();
        assert_eq!(merged.scores, vec![0.75, 0.25]);
        assert_eq!(merged.count, 4);
        assert_eq!(merged.excluded, vec![1]);
        assert!(BearingSpectrum::aggregate(1, 0.0, &[]).is_none());
    }

    #[test]
    fn cost_spectrum_estimate_uses_minimum() {
        let angles = [0.0, 90.0, 180.0, 270.0];
        let cost = spectrum(Orientation::LowerIsBetter, vec![0.5, 0.1, 0.9, 0.7]);
        let estimate = cost.estimate(&angles).unwrap();
        assert_eq!(estimate.bearing_deg, 90.0);
        assert!((estimate.confidence - 0.9).abs() < 1e-12);
        assert!((cost.residual_at(&angles, 90.0) - 0.1).abs() < 1e-12);
        assert!((cost.likelihood_at(&angles, 90.0) + 0.1).abs() < 1e-12);
    }

    #[test]
    fn bartlett_residual_complements_value() {
        let angles = [0.0, 180.0];
        let power = spectrum(Orientation::HigherIsBetter, vec![0.8, 0.2]);
        assert!((power.residual_at(&angles, 0.0) - 0.2).abs() < 1e-12);
        assert!((power.likelihood_at(&angles, 90.0) - 0.5).abs() < 1e-12);
    }
}
