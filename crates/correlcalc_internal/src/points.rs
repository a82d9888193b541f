use ndarray::ArrayView2;

/// A borrowed view of a catalog's points (and optionally their weights).
///
/// We place the following constraints on the positions array:
/// - axis 0 is the slow axis and holds the 3 coordinates `[s, ra, dec]`.
/// - axis 1 is the fast axis. The length along this axis coincides with
///   the number of points.
/// - In other words the shape is `(3, n_points)`.
#[derive(Clone, Debug)]
pub struct PointSet<'a> {
    positions: ArrayView2<'a, f64>,
    weights: Option<&'a [f64]>,
    n_points: usize,
}

impl<'a> PointSet<'a> {
    /// create a new instance
    pub fn new(
        positions: ArrayView2<'a, f64>,
        weights: Option<&'a [f64]>,
    ) -> Result<PointSet<'a>, &'static str> {
        if positions.shape()[0] != 3 {
            Err("positions must have exactly 3 rows: [s, ra, dec]")
        } else if positions.iter().any(|x| !x.is_finite()) {
            Err("positions must all be finite")
        } else if weights.is_some_and(|w| w.len() != positions.shape()[1]) {
            Err("weights must have the same number of points as positions")
        } else {
            Ok(Self {
                positions,
                weights,
                n_points: positions.shape()[1],
            })
        }
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    pub fn is_empty(&self) -> bool {
        self.n_points == 0
    }

    /// Fetch the `[s, ra, dec]` triple of point `idx`
    #[inline(always)]
    pub fn point(&self, idx: usize) -> [f64; 3] {
        [
            self.positions[[0, idx]],
            self.positions[[1, idx]],
            self.positions[[2, idx]],
        ]
    }

    pub fn weights(&self) -> Option<&'a [f64]> {
        self.weights
    }
}
