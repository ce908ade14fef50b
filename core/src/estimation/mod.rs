pub mod bearing;
pub mod estimator;
pub mod pattern;
pub mod pool;
pub mod position;
pub mod window;

pub use bearing::BearingLikelihoodEstimator;
pub use estimator::{Bartlett, MaximumLikelihood, SpectrumEstimator};
pub use pattern::AntennaPatternModel;
pub use pool::{CancellationFlag, Partial, WorkerPool};
pub use position::{CrossSitePositionEstimator, SiteEvidence};
pub use window::{overlap_group, step_windows};
