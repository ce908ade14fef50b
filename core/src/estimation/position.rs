use crate::interface::output::{BearingSpectrum, PositionFix};
use crate::interface::site::Site;
use crate::math::geometry::{intersect_bearings, PlanarPoint};
use crate::math::grid::{CandidateGrid, GridOptimum};
use crate::math::stats::StatsHelper;
use crate::prelude::{EstimationError, EstimationResult, PositionSearchConfig, TimeWindow};
use crate::telemetry::log::LogManager;
use std::collections::BTreeSet;

/// One site's contribution to a fix: where it is, its calibrated angle grid,
/// and its window-aggregated spectrum.
#[derive(Debug, Clone)]
pub struct SiteEvidence<'a> {
    pub site: &'a Site,
    pub angles: &'a [f32],
    pub spectrum: BearingSpectrum,
    pub activity: Option<f64>,
    /// Multiplier on this site's terms; the snapshot count when spectra are summed.
    pub weight: f64,
}

impl SiteEvidence<'_> {
    fn bearing_to(&self, candidate: &PlanarPoint) -> f64 {
        self.site.location.bearing_to(candidate)
    }

    fn likelihood(&self, candidate: &PlanarPoint) -> f64 {
        self.weight * self.spectrum.likelihood_at(self.angles, self.bearing_to(candidate))
    }

    fn residual(&self, candidate: &PlanarPoint) -> f64 {
        self.weight * self.spectrum.residual_at(self.angles, self.bearing_to(candidate))
    }
}

/// Fuses per-site bearing spectra into a planar position.
///
/// Each candidate scores the sum of every site's sign-normalized spectrum at
/// the bearing from that site to the candidate; the best candidate wins, ties
/// going to the one nearest the centroid of the contributing sites.
pub struct CrossSitePositionEstimator {
    config: PositionSearchConfig,
    logger: LogManager,
}

struct SearchOutcome {
    optimum: GridOptimum,
    iterations: usize,
    refined: bool,
}

impl CrossSitePositionEstimator {
    pub fn new(config: PositionSearchConfig) -> Self {
        Self {
            config,
            logger: LogManager::new("position"),
        }
    }

    pub fn config(&self) -> &PositionSearchConfig {
        &self.config
    }

    pub fn estimate(
        &self,
        window: TimeWindow,
        evidence: &[SiteEvidence<'_>],
    ) -> EstimationResult<PositionFix> {
        let contributing: BTreeSet<_> = evidence.iter().map(|e| e.site.id).collect();
        if contributing.len() < 2 {
            return Err(EstimationError::InsufficientSites {
                found: contributing.len(),
            });
        }

        let locations: Vec<PlanarPoint> = evidence.iter().map(|e| e.site.location).collect();
        let centroid = PlanarPoint::centroid(&locations).unwrap_or_default();
        let initial = self.initial_guess(evidence).unwrap_or(centroid);
        let objective = |p: &PlanarPoint| evidence.iter().map(|e| e.likelihood(p)).sum::<f64>();

        let outcome = match self.refine(initial, &centroid, &objective) {
            Ok(outcome) => outcome,
            Err(err) if self.config.fallback_to_grid => {
                self.logger
                    .warn(&format!("{}; falling back to exhaustive grid search", err));
                self.exhaustive(&locations, &centroid, &objective)?
            }
            Err(err) => return Err(err),
        };

        let estimate = outcome.optimum.point;
        let residual = evidence.iter().map(|e| e.residual(&estimate)).sum();
        let activities: Vec<f64> = evidence.iter().filter_map(|e| e.activity).collect();

        self.logger.detail(&format!(
            "fix ({:.1}, {:.1}) from {} sites, residual {:.4}, {} iterations",
            estimate.x,
            estimate.y,
            contributing.len(),
            residual,
            outcome.iterations
        ));

        Ok(PositionFix {
            window,
            estimate,
            residual,
            likelihood: outcome.optimum.value,
            contributing_sites: contributing,
            activity: StatsHelper::mean(&activities),
            refined: outcome.refined,
            iterations: outcome.iterations,
        })
    }

    /// Least-squares crossing of each site's best line of bearing.
    fn initial_guess(&self, evidence: &[SiteEvidence<'_>]) -> Option<PlanarPoint> {
        let lines: Vec<(PlanarPoint, f64)> = evidence
            .iter()
            .filter_map(|e| {
                e.spectrum
                    .estimate(e.angles)
                    .map(|best| (e.site.location, best.bearing_deg))
            })
            .collect();
        intersect_bearings(&lines)
    }

    /// Coarse-to-fine grid search. At each scale the grid is re-centred while
    /// the optimum sits on its border, at most `max_iterations` times.
    fn refine<F>(
        &self,
        initial: PlanarPoint,
        anchor: &PlanarPoint,
        objective: &F,
    ) -> EstimationResult<SearchOutcome>
    where
        F: Fn(&PlanarPoint) -> f64,
    {
        let mut center = initial;
        let mut iterations = 0;
        let mut optimum = None;

        for scale in self.config.scales() {
            let mut attempts = 0;
            loop {
                attempts += 1;
                iterations += 1;
                let grid = CandidateGrid::centred(center, scale, self.config.half_span, objective);
                let best = grid
                    .optimum(anchor)
                    .ok_or(EstimationError::DivergentEstimate { iterations, scale })?;
                center = best.point;
                optimum = Some(best);
                if !best.on_border {
                    break;
                }
                if attempts >= self.config.max_iterations.max(1) {
                    return Err(EstimationError::DivergentEstimate {
                        iterations: attempts,
                        scale,
                    });
                }
            }
        }

        let optimum = optimum.ok_or(EstimationError::DivergentEstimate {
            iterations,
            scale: self.config.coarse_scale,
        })?;
        Ok(SearchOutcome {
            optimum,
            iterations,
            refined: true,
        })
    }

    /// Deterministic search over the site bounding box, padded by the widest
    /// baseline, then one local pass per finer scale without re-centring.
    fn exhaustive<F>(
        &self,
        locations: &[PlanarPoint],
        anchor: &PlanarPoint,
        objective: &F,
    ) -> EstimationResult<SearchOutcome>
    where
        F: Fn(&PlanarPoint) -> f64,
    {
        let mut baseline: f64 = 0.0;
        for (i, a) in locations.iter().enumerate() {
            for b in &locations[i + 1..] {
                baseline = baseline.max(a.distance(b));
            }
        }
        if baseline == 0.0 {
            baseline = self.config.coarse_scale * self.config.half_span.max(1) as f64;
        }

        let first = locations.first().copied().unwrap_or(*anchor);
        let (mut min, mut max) = (first, first);
        for p in locations {
            min = PlanarPoint::new(min.x.min(p.x), min.y.min(p.y));
            max = PlanarPoint::new(max.x.max(p.x), max.y.max(p.y));
        }
        let min = min.offset(-baseline, -baseline);
        let max = max.offset(baseline, baseline);

        let cells = self.config.fallback_cells.max(3);
        let step = (max.x - min.x).max(max.y - min.y) / (cells - 1) as f64;
        let grid = CandidateGrid::spanning(min, max, cells, objective);
        let mut optimum = grid.optimum(anchor).ok_or(EstimationError::DivergentEstimate {
            iterations: 1,
            scale: step,
        })?;
        let mut iterations = 1;

        for scale in self.config.scales().into_iter().filter(|&s| s < step) {
            let local = CandidateGrid::centred(optimum.point, scale, self.config.half_span, objective);
            if let Some(best) = local.optimum(anchor) {
                if best.improves_on(&optimum, anchor) {
                    optimum = best;
                }
            }
            iterations += 1;
        }

        Ok(SearchOutcome {
            optimum,
            iterations,
            refined: false,
        })
    }
}
