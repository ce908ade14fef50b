use crate::math::geometry::PlanarPoint;
use ndarray::Array2;

/// Regular grid of candidate positions with an objective value per cell.
///
/// Rows advance northwards, columns eastwards. Higher values are better.
pub struct CandidateGrid {
    origin: PlanarPoint,
    step_x: f64,
    step_y: f64,
    values: Array2<f64>,
}

/// Best cell of a [`CandidateGrid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridOptimum {
    pub row: usize,
    pub col: usize,
    pub point: PlanarPoint,
    pub value: f64,
    pub on_border: bool,
}

impl GridOptimum {
    /// Whether `self` should replace `incumbent`: strictly higher, or an exact
    /// tie that sits nearer `anchor`.
    pub fn improves_on(&self, incumbent: &GridOptimum, anchor: &PlanarPoint) -> bool {
        self.value > incumbent.value
            || (self.value == incumbent.value
                && self.point.distance(anchor) < incumbent.point.distance(anchor))
    }
}

impl CandidateGrid {
    /// Square grid of `(2 * half_span + 1)^2` cells spaced `scale` apart around `center`.
    pub fn centred<F>(center: PlanarPoint, scale: f64, half_span: usize, objective: F) -> Self
    where
        F: Fn(&PlanarPoint) -> f64,
    {
        let offset = scale * half_span as f64;
        let origin = center.offset(-offset, -offset);
        Self::evaluate(origin, scale, scale, 2 * half_span + 1, 2 * half_span + 1, objective)
    }

    /// Grid of `cells x cells` candidates spanning the rectangle `[min, max]`.
    pub fn spanning<F>(min: PlanarPoint, max: PlanarPoint, cells: usize, objective: F) -> Self
    where
        F: Fn(&PlanarPoint) -> f64,
    {
        let cells = cells.max(2);
        let step_x = (max.x - min.x) / (cells - 1) as f64;
        let step_y = (max.y - min.y) / (cells - 1) as f64;
        Self::evaluate(min, step_x, step_y, cells, cells, objective)
    }

    fn evaluate<F>(
        origin: PlanarPoint,
        step_x: f64,
        step_y: f64,
        rows: usize,
        cols: usize,
        objective: F,
    ) -> Self
    where
        F: Fn(&PlanarPoint) -> f64,
    {
        let values = Array2::from_shape_fn((rows, cols), |(row, col)| {
            objective(&origin.offset(col as f64 * step_x, row as f64 * step_y))
        });
        Self {
            origin,
            step_x,
            step_y,
            values,
        }
    }

    pub fn point(&self, row: usize, col: usize) -> PlanarPoint {
        self.origin
            .offset(col as f64 * self.step_x, row as f64 * self.step_y)
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Highest-valued cell. Exact ties go to the cell nearest `anchor`, then
    /// to the first cell in row-major order.
    pub fn optimum(&self, anchor: &PlanarPoint) -> Option<GridOptimum> {
        let (rows, cols) = self.values.dim();
        let mut best: Option<GridOptimum> = None;

        for ((row, col), &value) in self.values.indexed_iter() {
            if !value.is_finite() {
                continue;
            }
            let candidate = GridOptimum {
                row,
                col,
                point: self.point(row, col),
                value,
                on_border: row == 0 || col == 0 || row + 1 == rows || col + 1 == cols,
            };
            match &best {
                Some(current) if !candidate.improves_on(current, anchor) => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}
