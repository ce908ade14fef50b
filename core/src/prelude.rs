use serde::{Deserialize, Serialize};

pub use num_complex::Complex32;

/// Identifier of a fixed receiving site.
pub type SiteId = u32;

/// Nominal duration of one detected pulse, used as the default overlap tolerance.
pub const DEFAULT_SNAPSHOT_DURATION_S: f64 = 0.02;

/// Closed time interval `[start, end]` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Window of width `width` centred on `centre`.
    pub fn centred(centre: f64, width: f64) -> Self {
        Self::new(centre - width / 2.0, centre + width / 2.0)
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn centre(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    /// True when the windows intersect once each is widened by `tolerance`.
    pub fn overlaps(&self, other: &TimeWindow, tolerance: f64) -> bool {
        self.start <= other.end + tolerance && other.start <= self.end + tolerance
    }

    /// Smallest window covering both.
    pub fn union(&self, other: &TimeWindow) -> TimeWindow {
        TimeWindow::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Which direction of a spectrum counts as "more likely".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    HigherIsBetter,
    LowerIsBetter,
}

impl Orientation {
    /// Strict comparison in this orientation.
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Orientation::HigherIsBetter => candidate > incumbent,
            Orientation::LowerIsBetter => candidate < incumbent,
        }
    }

    /// Maps a score onto the higher-is-better scale used for cross-site sums.
    pub fn to_likelihood(self, value: f64) -> f64 {
        match self {
            Orientation::HigherIsBetter => value,
            Orientation::LowerIsBetter => -value,
        }
    }

    /// Worst possible score for this orientation.
    pub fn worst(self) -> f64 {
        match self {
            Orientation::HigherIsBetter => f64::NEG_INFINITY,
            Orientation::LowerIsBetter => f64::INFINITY,
        }
    }
}

/// Bearing estimator strategy, selected explicitly by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    /// Normalized beamformer power; higher is better.
    #[default]
    Bartlett,
    /// Orthogonal-complement residual; lower is better.
    MaximumLikelihood,
}

impl EstimatorKind {
    pub fn orientation(self) -> Orientation {
        match self {
            EstimatorKind::Bartlett => Orientation::HigherIsBetter,
            EstimatorKind::MaximumLikelihood => Orientation::LowerIsBetter,
        }
    }
}

/// Parameters for the multi-scale position search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSearchConfig {
    /// Candidates per side of a grid are `2 * half_span + 1`.
    pub half_span: usize,
    /// Grid spacing of the first refinement level, in metres.
    pub coarse_scale: f64,
    /// Ratio between consecutive refinement levels.
    pub delta: f64,
    pub levels: usize,
    /// Maximum grid evaluations per level before the search is declared divergent.
    pub max_iterations: usize,
    pub fallback_to_grid: bool,
    /// Candidates per side of the exhaustive fallback grid.
    pub fallback_cells: usize,
}

impl Default for PositionSearchConfig {
    fn default() -> Self {
        Self {
            half_span: 15,
            coarse_scale: 100.0,
            delta: 10.0,
            levels: 3,
            max_iterations: 10,
            fallback_to_grid: true,
            fallback_cells: 101,
        }
    }
}

impl PositionSearchConfig {
    /// Grid spacing for each refinement level, coarsest first.
    pub fn scales(&self) -> Vec<f64> {
        (0..self.levels.max(1))
            .map(|level| self.coarse_scale / self.delta.powi(level as i32))
            .collect()
    }
}

/// Shared configuration for an estimation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    pub estimator: EstimatorKind,
    /// Records scoring strictly below this are dropped; `None` keeps everything.
    pub quality_threshold: Option<f64>,
    /// Overlap tolerance between site windows, in seconds.
    pub snapshot_duration: f64,
    /// Average rather than sum a site's spectra within a window.
    pub normalize_spectrum: bool,
    /// Worker threads; `None` uses one per available core.
    pub workers: Option<usize>,
    pub position: PositionSearchConfig,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorKind::default(),
            quality_threshold: None,
            snapshot_duration: DEFAULT_SNAPSHOT_DURATION_S,
            normalize_spectrum: true,
            workers: None,
            position: PositionSearchConfig::default(),
        }
    }
}

/// Common error type for calibration loading and estimation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error("malformed calibration: {0}")]
    MalformedCalibration(String),
    #[error("no calibration for site {0}")]
    UnknownSite(SiteId),
    #[error("degenerate steering vector at {angle_deg} deg (row {index})")]
    DegenerateSteeringVector { index: usize, angle_deg: f32 },
    #[error("snapshot has {found} channels, calibration expects {expected}")]
    ChannelMismatch { expected: usize, found: usize },
    #[error("snapshot carries no energy")]
    SilentSnapshot,
    #[error("need at least 2 contributing sites, found {found}")]
    InsufficientSites { found: usize },
    #[error("position refinement did not converge after {iterations} iterations at {scale} m")]
    DivergentEstimate { iterations: usize, scale: f64 },
}

pub type EstimationResult<T> = Result<T, EstimationError>;
