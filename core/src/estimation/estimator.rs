use crate::estimation::pattern::AntennaPatternModel;
use crate::prelude::{Complex32, EstimationResult, EstimatorKind, Orientation};

/// Capability shared by the bearing estimators: score a snapshot against
/// every calibrated angle of a site.
///
/// Spectra are indexed by the model's angle grid; nothing is interpolated.
pub trait SpectrumEstimator: Send + Sync {
    fn orientation(&self) -> Orientation;

    fn estimate(
        &self,
        snapshot: &[Complex32],
        model: &AntennaPatternModel,
    ) -> EstimationResult<Vec<f64>>;
}

/// Normalized beamformer power. Fast, assumes far-field plane waves.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bartlett;

impl SpectrumEstimator for Bartlett {
    fn orientation(&self) -> Orientation {
        Orientation::HigherIsBetter
    }

    fn estimate(
        &self,
        snapshot: &[Complex32],
        model: &AntennaPatternModel,
    ) -> EstimationResult<Vec<f64>> {
        model.bartlett(snapshot)
    }
}

/// Orthogonal-complement residual cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaximumLikelihood;

impl SpectrumEstimator for MaximumLikelihood {
    fn orientation(&self) -> Orientation {
        Orientation::LowerIsBetter
    }

    fn estimate(
        &self,
        snapshot: &[Complex32],
        model: &AntennaPatternModel,
    ) -> EstimationResult<Vec<f64>> {
        model.score(snapshot)
    }
}

impl SpectrumEstimator for EstimatorKind {
    fn orientation(&self) -> Orientation {
        EstimatorKind::orientation(*self)
    }

    fn estimate(
        &self,
        snapshot: &[Complex32],
        model: &AntennaPatternModel,
    ) -> EstimationResult<Vec<f64>> {
        match self {
            EstimatorKind::Bartlett => Bartlett.estimate(snapshot, model),
            EstimatorKind::MaximumLikelihood => MaximumLikelihood.estimate(snapshot, model),
        }
    }
}
