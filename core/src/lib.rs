//! Bearing and position estimation core for the radio-tracking platform.
//!
//! Calibrated antenna patterns turn multi-channel snapshots into bearing
//! spectra per site; spectra from sites observing the same window are fused
//! into a planar position fix.

pub mod estimation;
pub mod interface;
pub mod math;
pub mod prelude;
pub mod session;
pub mod telemetry;

pub use estimation::{AntennaPatternModel, CancellationFlag, CrossSitePositionEstimator};
pub use interface::{
    BearingBatch, BearingEstimate, BearingSpectrum, CalibrationSource, CalibrationStore,
    InMemoryRecordSet, PositionFix, RecordFailure, SignalRecord, SignalRecordSource, Site,
    SkipReason, SkippedSite, SteeringVectorTable, TrackReport, WindowOutcome,
};
pub use prelude::{EstimationConfig, EstimationError, EstimationResult, EstimatorKind, TimeWindow};
pub use session::TrackingSession;
