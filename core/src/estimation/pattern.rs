use crate::interface::calibration::SteeringVectorTable;
use crate::math::complex::ComplexHelper;
use crate::math::stats::StatsHelper;
use crate::prelude::{Complex32, EstimationError, EstimationResult, Orientation};
use crate::telemetry::log::LogManager;

/// One site's calibrated array response, scoring snapshots against every angle.
///
/// Rows whose steering vector has zero norm are excluded: they score as the
/// worst possible value (Bartlett 0, cost 1) and never win an arg-extremum.
#[derive(Debug, Clone)]
pub struct AntennaPatternModel {
    table: SteeringVectorTable,
    energies: Vec<f64>,
    degenerate: Vec<usize>,
}

impl AntennaPatternModel {
    pub fn new(table: SteeringVectorTable) -> EstimationResult<Self> {
        let energies: Vec<f64> = (0..table.len())
            .map(|idx| ComplexHelper::energy(table.response(idx)))
            .collect();
        let degenerate: Vec<usize> = energies
            .iter()
            .enumerate()
            .filter(|(_, &energy)| energy == 0.0 || !energy.is_finite())
            .map(|(idx, _)| idx)
            .collect();

        if degenerate.len() == table.len() {
            return Err(EstimationError::MalformedCalibration(
                "every steering vector is degenerate".into(),
            ));
        }
        if !degenerate.is_empty() {
            LogManager::new("pattern").warn(&format!(
                "{} of {} steering vectors are degenerate and excluded",
                degenerate.len(),
                table.len()
            ));
        }

        Ok(Self {
            table,
            energies,
            degenerate,
        })
    }

    /// Parses the binary calibration layout.
    pub fn load(bytes: &[u8]) -> EstimationResult<Self> {
        Self::new(SteeringVectorTable::from_bytes(bytes)?)
    }

    /// Serializes the table; `load(save())` reproduces identical bytes.
    pub fn save(&self) -> EstimationResult<Vec<u8>> {
        self.table.to_bytes()
    }

    pub fn table(&self) -> &SteeringVectorTable {
        &self.table
    }

    pub fn angles(&self) -> &[f32] {
        self.table.angles()
    }

    pub fn channels(&self) -> usize {
        self.table.channels()
    }

    /// Row indices excluded from every arg-extremum.
    pub fn degenerate_rows(&self) -> &[usize] {
        &self.degenerate
    }

    /// One `DegenerateSteeringVector` error per excluded row.
    pub fn degenerate_errors(&self) -> Vec<EstimationError> {
        self.degenerate
            .iter()
            .map(|&index| EstimationError::DegenerateSteeringVector {
                index,
                angle_deg: self.table.angles()[index],
            })
            .collect()
    }

    /// Normalized projection `|p . s*|^2 / (|p|^2 |s|^2)` for every angle.
    fn projections(&self, snapshot: &[Complex32]) -> EstimationResult<Vec<f64>> {
        let snapshot_energy = self.check_snapshot(snapshot)?;
        Ok((0..self.table.len())
            .map(|idx| {
                if self.degenerate.contains(&idx) {
                    0.0
                } else {
                    ComplexHelper::normalized_projection(
                        self.table.response(idx),
                        self.energies[idx],
                        snapshot,
                        snapshot_energy,
                    )
                }
            })
            .collect())
    }

    /// Maximum-likelihood cost per angle: the share of snapshot energy left
    /// after projecting out the steering vector, `1 - |p . s*|^2 / (|p|^2 |s|^2)`.
    ///
    /// Lower is more consistent with the angle. Invariant under any non-zero
    /// complex scaling of the snapshot.
    pub fn score(&self, snapshot: &[Complex32]) -> EstimationResult<Vec<f64>> {
        Ok(self
            .projections(snapshot)?
            .into_iter()
            .map(|projection| 1.0 - projection)
            .collect())
    }

    /// Bartlett power per angle, normalized to `[0, 1]`. Higher is better.
    pub fn bartlett(&self, snapshot: &[Complex32]) -> EstimationResult<Vec<f64>> {
        self.projections(snapshot)
    }

    /// Angle at the arg-min of [`AntennaPatternModel::score`].
    pub fn best_bearing(&self, snapshot: &[Complex32]) -> EstimationResult<f32> {
        let scores = self.score(snapshot)?;
        let index = StatsHelper::arg_best(&scores, Orientation::LowerIsBetter, &self.degenerate)
            .ok_or(EstimationError::SilentSnapshot)?;
        Ok(self.table.angles()[index])
    }

    fn check_snapshot(&self, snapshot: &[Complex32]) -> EstimationResult<f64> {
        if snapshot.len() != self.table.channels() {
            return Err(EstimationError::ChannelMismatch {
                expected: self.table.channels(),
                found: snapshot.len(),
            });
        }
        let energy = ComplexHelper::energy(snapshot);
        if energy == 0.0 || !energy.is_finite() {
            return Err(EstimationError::SilentSnapshot);
        }
        Ok(energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> AntennaPatternModel {
        AntennaPatternModel::new(SteeringVectorTable::circular_array(4, 0.35, 1.0).unwrap())
            .unwrap()
    }

    #[test]
    fn calibrated_snapshot_scores_zero_cost_at_its_angle() {
        let model = model();
        let snapshot = model.table().response(123).to_vec();
        let scores = model.score(&snapshot).unwrap();
        assert!(scores[123] < 1e-9);
        assert_eq!(model.best_bearing(&snapshot).unwrap(), 123.0);
    }

    #[test]
    fn cost_and_bartlett_are_complementary() {
        let model = model();
        let snapshot = vec![
            Complex32::new(0.3, -1.0),
            Complex32::new(1.0, 0.2),
            Complex32::new(-0.4, 0.1),
            Complex32::new(0.0, 0.9),
        ];
        let cost = model.score(&snapshot).unwrap();
        let power = model.bartlett(&snapshot).unwrap();
        for (c, p) in cost.iter().zip(&power) {
            assert!((c + p - 1.0).abs() < 1e-12);
            assert!((0.0..=1.0).contains(c));
        }
    }

    #[test]
    fn wrong_channel_count_is_rejected() {
        let model = model();
        let err = model.score(&[Complex32::new(1.0, 0.0)]).unwrap_err();
        assert_eq!(
            err,
            EstimationError::ChannelMismatch {
                expected: 4,
                found: 1
            }
        );
    }

    #[test]
    fn silent_snapshot_is_rejected() {
        let model = model();
        let err = model.bartlett(&[Complex32::new(0.0, 0.0); 4]).unwrap_err();
        assert_eq!(err, EstimationError::SilentSnapshot);
    }

    #[test]
    fn degenerate_rows_are_excluded_from_argmin() {
        let zero = Complex32::new(0.0, 0.0);
        let one = Complex32::new(1.0, 0.0);
        let table = SteeringVectorTable::new(
            2,
            vec![0.0, 90.0, 180.0],
            vec![zero, zero, one, zero, zero, one],
        )
        .unwrap();
        let model = AntennaPatternModel::new(table).unwrap();
        assert_eq!(model.degenerate_rows(), &[0]);
        assert_eq!(
            model.degenerate_errors(),
            vec![EstimationError::DegenerateSteeringVector {
                index: 0,
                angle_deg: 0.0
            }]
        );
        let scores = model.score(&[one, zero]).unwrap();
        assert_eq!(scores[0], 1.0);
        assert_eq!(model.best_bearing(&[one, zero]).unwrap(), 90.0);
    }

    #[test]
    fn all_degenerate_table_fails_to_load() {
        let table = SteeringVectorTable::new(1, vec![0.0], vec![Complex32::new(0.0, 0.0)]).unwrap();
        assert!(matches!(
            AntennaPatternModel::new(table),
            Err(EstimationError::MalformedCalibration(_))
        ));
    }

    #[test]
    fn save_round_trips_loaded_bytes() {
        let bytes = model().save().unwrap();
        assert_eq!(AntennaPatternModel::load(&bytes).unwrap().save().unwrap(), bytes);
    }
}
