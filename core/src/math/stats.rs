use crate::prelude::Orientation;

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Population standard deviation over mean; `None` for empty or zero-mean input.
    pub fn coefficient_of_variation(samples: &[f64]) -> Option<f64> {
        let mean = Self::mean(samples)?;
        if mean == 0.0 {
            return None;
        }
        let variance =
            samples.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / samples.len() as f64;
        Some(variance.sqrt() / mean)
    }

    /// Index of the best finite value, skipping `excluded` indices.
    ///
    /// The first index wins among exact ties.
    pub fn arg_best(values: &[f64], orientation: Orientation, excluded: &[usize]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, &value) in values.iter().enumerate() {
            if !value.is_finite() || excluded.contains(&idx) {
                continue;
            }
            match best {
                Some(current) if !orientation.is_better(value, values[current]) => {}
                _ => best = Some(idx),
            }
        }
        best
    }
}
