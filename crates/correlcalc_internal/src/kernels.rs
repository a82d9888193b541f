//! Pair-counting kernels.
//!
//! Nothing in here normalizes counts or decides which catalogs to pair up;
//! that is the public crate's job. The kernels just turn a spatial index, a
//! set of query points and squared bin edges into raw per-bin sums.

use crate::balltree::BallTree;
use crate::bins::SquaredBinEdges;
use crate::metric::Metric;
use crate::points::PointSet;
use core::ops::Range;

/// Per-bin pair counts between `queries` and the points indexed by `tree`,
/// obtained by differencing cumulative counts at adjacent edges.
///
/// The bins follow the same rules as [`SquaredBinEdges::bin_index`]: pair
/// `(q, p)` with squared separation `d2` lands in bin `i` when
/// `edge[i] <= d2 < edge[i+1]` (the last bin is also closed on the right).
///
/// When `is_auto` is true, `queries` must be the catalog that `tree` indexes.
/// The pair of a point with itself is then removed, while distinct points
/// at zero separation still count. Every other pair is seen from both ends.
pub fn binned_pair_counts<M: Metric>(
    tree: &BallTree<M>,
    queries: &PointSet,
    squared_bin_edges: &SquaredBinEdges,
    is_auto: bool,
) -> Result<Vec<f64>, &'static str> {
    if is_auto && queries.n_points() != tree.len() {
        return Err("an auto-correlation must query the indexed catalog itself");
    }
    let cumulative = tree.histogram_edge_count(queries, squared_bin_edges);
    let mut counts: Vec<u64> = cumulative.windows(2).map(|pair| pair[1] - pair[0]).collect();
    // a self-pair has zero separation, so it can only be in the first bin
    if is_auto && squared_bin_edges.as_slice()[0] == 0.0 {
        counts[0] = counts[0].saturating_sub(queries.n_points() as u64);
    }
    Ok(counts.into_iter().map(|count| count as f64).collect())
}

/// Computes weighted pair-count histograms for a contiguous range of query
/// points.
///
/// For every query point, we look up all indexed points within the largest
/// bin edge, bin their exact squared separations (with
/// [`SquaredBinEdges::bin_index`], i.e. `numpy.histogram` rules) and add the
/// *neighbor's* weight to the bin.
///
/// The kernel is immutable and only borrows its inputs, so any number of
/// threads can run it over disjoint ranges at once.
pub struct WeightedPairKernel<'a, 'q, M: Metric> {
    tree: &'a BallTree<M>,
    queries: PointSet<'q>,
    neighbor_weights: &'a [f64],
    squared_bin_edges: &'a SquaredBinEdges,
    is_auto: bool, // true when queries are the indexed points
}

impl<'a, 'q, M: Metric> WeightedPairKernel<'a, 'q, M> {
    /// Configure a kernel.
    ///
    /// `neighbor_weights` holds one weight per indexed point. When `is_auto`
    /// is true, `queries` must be the catalog that `tree` indexes (in the
    /// same order); the pair of a point with itself is then skipped.
    pub fn new(
        tree: &'a BallTree<M>,
        queries: PointSet<'q>,
        neighbor_weights: &'a [f64],
        squared_bin_edges: &'a SquaredBinEdges,
        is_auto: bool,
    ) -> Result<Self, &'static str> {
        if neighbor_weights.len() != tree.len() {
            Err("neighbor_weights must hold one weight per indexed point")
        } else if is_auto && queries.n_points() != tree.len() {
            Err("an auto-correlation must query the indexed catalog itself")
        } else {
            Ok(Self {
                tree,
                queries,
                neighbor_weights,
                squared_bin_edges,
                is_auto,
            })
        }
    }

    pub fn n_queries(&self) -> usize {
        self.queries.n_points()
    }

    pub fn n_bins(&self) -> usize {
        self.squared_bin_edges.n_bins()
    }

    /// Histogram over the query points in `query_range`.
    ///
    /// `should_stop` is polled once per query point; when it returns true
    /// the partial histogram is discarded and an error is returned.
    pub fn histogram(
        &self,
        query_range: Range<usize>,
        should_stop: &impl Fn() -> bool,
    ) -> Result<Vec<f64>, &'static str> {
        if query_range.end > self.n_queries() || query_range.start > query_range.end {
            return Err("query_range lies outside of the query points");
        }
        let mut hist = vec![0.0; self.n_bins()];
        let max_edge = self.squared_bin_edges.max_edge();

        for i in query_range {
            if should_stop() {
                return Err("interrupted");
            }
            let query = self.queries.point(i);
            self.tree.for_each_within(&query, max_edge, |j, dsq| {
                if self.is_auto && i == j {
                    return;
                }
                if let Some(bin_idx) = self.squared_bin_edges.bin_index(dsq) {
                    hist[bin_idx] += self.neighbor_weights[j];
                }
            });
        }
        Ok(hist)
    }
}
