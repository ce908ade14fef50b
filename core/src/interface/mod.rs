pub mod calibration;
pub mod output;
pub mod record;
pub mod site;

pub use calibration::SteeringVectorTable;
pub use output::{
    BearingBatch, BearingEstimate, BearingSpectrum, PositionFix, RecordFailure, SkipReason,
    SkippedSite, TrackReport, WindowOutcome,
};
pub use record::{InMemoryRecordSet, SignalRecord, SignalRecordSource};
pub use site::{CalibrationSource, CalibrationStore, Site};
