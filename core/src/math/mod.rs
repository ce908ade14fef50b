pub mod complex;
pub mod geometry;
pub mod grid;
pub mod stats;

pub use complex::ComplexHelper;
pub use geometry::PlanarPoint;
pub use grid::CandidateGrid;
pub use stats::StatsHelper;
