use num_complex::{Complex32, Complex64};

/// Inner products over snapshot/steering channels, accumulated in double precision.
pub struct ComplexHelper;

impl ComplexHelper {
    /// `sum_k lhs[k] * conj(rhs[k])`.
    pub fn inner(lhs: &[Complex32], rhs: &[Complex32]) -> Complex64 {
        lhs.iter()
            .zip(rhs.iter())
            .map(|(a, b)| widen(*a) * widen(*b).conj())
            .sum()
    }

    /// Squared Euclidean norm.
    pub fn energy(values: &[Complex32]) -> f64 {
        values.iter().map(|v| widen(*v).norm_sqr()).sum()
    }

    /// `|<p, s>|^2 / (|p|^2 |s|^2)`, in `[0, 1]`.
    ///
    /// Callers guarantee both energies are non-zero.
    pub fn normalized_projection(
        steering: &[Complex32],
        steering_energy: f64,
        snapshot: &[Complex32],
        snapshot_energy: f64,
    ) -> f64 {
        let projection = Self::inner(steering, snapshot).norm_sqr();
        (projection / (steering_energy * snapshot_energy)).clamp(0.0, 1.0)
    }
}

fn widen(value: Complex32) -> Complex64 {
    Complex64::new(value.re as f64, value.im as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_conjugates_right_operand() {
        let a = [Complex32::new(0.0, 1.0)];
        let value = ComplexHelper::inner(&a, &a);
        assert_eq!(value, Complex64::new(1.0, 0.0));
    }

    #[test]
    fn projection_of_orthogonal_vectors_is_zero() {
        let p = [Complex32::new(1.0, 0.0), Complex32::new(0.0, 0.0)];
        let s = [Complex32::new(0.0, 0.0), Complex32::new(3.0, -1.0)];
        let value = ComplexHelper::normalized_projection(
            &p,
            ComplexHelper::energy(&p),
            &s,
            ComplexHelper::energy(&s),
        );
        assert_eq!(value, 0.0);
    }
}
