//! Implements the distance bins used to partition pairs.
//!
//! The caller describes bins in terms of separations. Internally we only
//! ever compare squared separations, so [`SquaredBinEdges`] squares the
//! edges once at construction.

/// Check that distance bin edges are usable.
///
/// We require at least two edges, that every edge is finite and
/// non-negative, and that the edges are strictly increasing.
pub fn validate_bin_edges(bin_edges: &[f64]) -> Result<(), &'static str> {
    if bin_edges.len() < 2 {
        return Err("A minimum of two bin edges are required");
    }

    if bin_edges.iter().any(|&x| !x.is_finite()) {
        return Err("Bin edges must be finite");
    } else if bin_edges[0] < 0.0 {
        return Err("Bin edges must be non-negative");
    }

    for i in 1..bin_edges.len() {
        if bin_edges[i] <= bin_edges[i - 1] {
            return Err("Bin edges must be in strictly increasing order");
        }
    }
    Ok(())
}

/// Owns a pre-validated sequence of squared bin edges.
#[derive(Clone, Debug, PartialEq)]
pub struct SquaredBinEdges {
    squared_edges: Vec<f64>,
}

impl SquaredBinEdges {
    /// Square `bin_edges` (given as separations) after validating them.
    pub fn from_distance_edges(bin_edges: &[f64]) -> Result<Self, &'static str> {
        validate_bin_edges(bin_edges)?;
        Ok(SquaredBinEdges {
            squared_edges: bin_edges.iter().map(|x| x * x).collect(),
        })
    }

    /// Returns the bin that holds `value` using `numpy.histogram` rules.
    ///
    /// Bin `i` covers `edge[i] <= value < edge[i+1]`, except the last bin
    /// which also includes its right edge.
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        let edges = &self.squared_edges;
        let last = edges.len() - 1;
        if !(value >= edges[0] && value <= edges[last]) {
            // this also rejects NaN
            return None;
        } else if value == edges[last] {
            return Some(last - 1);
        }

        let index = edges
            // Ok is used for an exact match, Err for a lower bound
            .binary_search_by(|edge| edge.total_cmp(&value))
            .unwrap_or_else(|i| i - 1);
        Some(index)
    }

    pub fn n_bins(&self) -> usize {
        self.squared_edges.len() - 1
    }

    /// The largest squared edge (i.e. the search radius for a pair count)
    pub fn max_edge(&self) -> f64 {
        self.squared_edges[self.squared_edges.len() - 1]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.squared_edges
    }
}
