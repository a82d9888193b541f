//! A ball tree over `[s, ra, dec]` points for an arbitrary [`Metric`].
//!
//! The cosmological metrics aren't plain Euclidean distances between the
//! stored coordinates, so a k-d tree's axis-aligned pruning doesn't apply.
//! Every node stores a center point, the largest separation between that
//! center and any of its points, the range of comoving distances and the
//! largest angle between the center's line of sight and a point's.
//!
//! A node is skipped when [`Metric::squared_distance_lower_bound`] (fed
//! with the node's distance range and the smallest possible angle) puts
//! every point out of reach. This holds for every geometry. When the metric
//! obeys the triangle inequality ([`Metric::TRIANGLE_INEQUALITY`]), the
//! node's metric radius is also used to skip nodes or to accept them whole.
//!
//! Like the k-d trees elsewhere in the ecosystem, nodes live in a flat
//! `Vec` and the points get reordered so that every node covers a
//! contiguous range.

use crate::bins::SquaredBinEdges;
use crate::metric::{Metric, versine_angular_separation};
use crate::points::PointSet;
use ndarray::Array2;

/// Maximum number of points in a leaf node before we split.
const LEAF_SIZE: usize = 32;

/// Relative slack applied to node-level accept/reject decisions so that
/// round-off in the pruning test never overrules the exact comparison
/// performed on individual points.
const PRUNE_SLACK: f64 = 1e-12;

#[derive(Clone, Debug)]
struct Node {
    /// range `[start..end)` into the (reordered) points/indices arrays
    start: usize,
    end: usize,
    center: [f64; 3],
    radius: f64,
    s_min: f64,
    s_max: f64,
    /// in radians, measured from the center's line of sight
    angle: f64,
    children: Option<[usize; 2]>,
}

impl Node {
    fn n_points(&self) -> u64 {
        (self.end - self.start) as u64
    }
}

/// Which separations count as lying within a radius `r`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Boundary {
    /// `d <= r` for every radius
    Closed,
    /// `d < r`, except for the last radius which is closed. Differencing
    /// these counts gives `numpy.histogram` bins.
    HistogramEdges,
}

fn angle_between(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    2.0 * (0.5 * versine_angular_separation(a, b)).sqrt().min(1.0).asin()
}

#[derive(Clone, Debug)]
pub struct BallTree<M: Metric> {
    metric: M,
    nodes: Vec<Node>,
    points: Vec<[f64; 3]>,
    /// maps each (reordered) point back to its position in the catalog
    indices: Vec<usize>,
    depth: usize,
}

impl<M: Metric> BallTree<M> {
    /// Build a ball tree over every point in `points`
    pub fn build(points: &PointSet, metric: M) -> Self {
        let n = points.n_points();
        let mut tree = BallTree {
            metric,
            nodes: Vec::new(),
            points: (0..n).map(|i| points.point(i)).collect(),
            indices: Vec::new(),
            depth: 0,
        };
        if n == 0 {
            return tree;
        }

        // splits are chosen in the cartesian embedding, which keeps the
        // balls compact regardless of where the RA = 0 seam falls
        let cartesian: Vec<[f64; 3]> = tree.points.iter().map(to_cartesian).collect();
        let mut order: Vec<usize> = (0..n).collect();
        tree.build_recursive(&cartesian, &mut order, 0, n, 1);

        let reordered: Vec<[f64; 3]> = order.iter().map(|&i| tree.points[i]).collect();
        tree.points = reordered;
        tree.indices = order;
        tree
    }

    fn build_recursive(
        &mut self,
        cartesian: &[[f64; 3]],
        order: &mut [usize],
        start: usize,
        end: usize,
        depth: usize,
    ) -> usize {
        self.depth = self.depth.max(depth);
        let mut node = self.bounding_ball(cartesian, &order[start..end]);
        node.start = start;
        node.end = end;
        let node_idx = self.nodes.len();
        self.nodes.push(node);

        if end - start > LEAF_SIZE {
            let dim = widest_dimension(cartesian, &order[start..end]);
            let mid = start + (end - start) / 2;
            order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
                cartesian[a][dim].total_cmp(&cartesian[b][dim])
            });
            let left = self.build_recursive(cartesian, order, start, mid, depth + 1);
            let right = self.build_recursive(cartesian, order, mid, end, depth + 1);
            self.nodes[node_idx].children = Some([left, right]);
        }
        node_idx
    }

    /// the center is the mean position (mapped back to `[s, ra, dec]`); the
    /// radius is measured with the tree's metric. Also records the ranges of
    /// distances and angles.
    fn bounding_ball(&self, cartesian: &[[f64; 3]], subset: &[usize]) -> Node {
        let mut mean = [0.0; 3];
        for &i in subset {
            for k in 0..3 {
                mean[k] += cartesian[i][k];
            }
        }
        for elem in mean.iter_mut() {
            *elem /= subset.len() as f64;
        }
        let center = from_cartesian(&mean);

        let mut node = Node {
            start: 0,
            end: 0,
            center,
            radius: 0.0,
            s_min: f64::INFINITY,
            s_max: f64::NEG_INFINITY,
            angle: 0.0,
            children: None,
        };
        for &i in subset {
            let point = &self.points[i];
            node.radius = node.radius.max(self.metric.distance(&center, point));
            node.s_min = node.s_min.min(point[0]);
            node.s_max = node.s_max.max(point[0]);
            node.angle = node.angle.max(angle_between(&center, point));
        }
        node
    }

    /// A lower bound on the squared separation between `query` and every
    /// point of the node
    fn min_squared_distance(&self, node: &Node, query: &[f64; 3]) -> f64 {
        let alpha = angle_between(query, &node.center);
        let gap = alpha - node.angle - PRUNE_SLACK * (1.0 + alpha + node.angle);
        let min_versine = if gap <= 0.0 {
            0.0
        } else {
            let half_gap = 0.5 * gap.min(core::f64::consts::PI);
            2.0 * half_gap.sin() * half_gap.sin()
        };
        self.metric
            .squared_distance_lower_bound(query[0], node.s_min, node.s_max, min_versine)
    }

    /// Whether no point of the node lies within `radius` of `query`
    fn out_of_reach(&self, node: &Node, query: &[f64; 3], radius: f64, radius_sq: f64) -> bool {
        if M::TRIANGLE_INEQUALITY {
            let d = self.metric.distance(query, &node.center);
            if d - node.radius > radius + PRUNE_SLACK * (d + node.radius) {
                return true;
            }
        }
        let bound = self.min_squared_distance(node, query);
        bound > radius_sq + PRUNE_SLACK * (bound + radius_sq)
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Calls `f(catalog_index, squared_distance)` for every indexed point
    /// whose squared separation from `query` is `<= radius_sq`.
    ///
    /// The visiting order is deterministic for a given tree.
    pub fn for_each_within<F: FnMut(usize, f64)>(
        &self,
        query: &[f64; 3],
        radius_sq: f64,
        mut f: F,
    ) {
        if !self.nodes.is_empty() {
            self.within_recursive(0, query, radius_sq.sqrt(), radius_sq, &mut f);
        }
    }

    fn within_recursive<F: FnMut(usize, f64)>(
        &self,
        node_idx: usize,
        query: &[f64; 3],
        radius: f64,
        radius_sq: f64,
        f: &mut F,
    ) {
        let node = &self.nodes[node_idx];
        if self.out_of_reach(node, query, radius, radius_sq) {
            return;
        }
        match node.children {
            None => {
                for i in node.start..node.end {
                    let dsq = self.metric.squared_distance(query, &self.points[i]);
                    if dsq <= radius_sq {
                        f(self.indices[i], dsq);
                    }
                }
            }
            Some([left, right]) => {
                self.within_recursive(left, query, radius, radius_sq, f);
                self.within_recursive(right, query, radius, radius_sq, f);
            }
        }
    }

    /// Catalog indices of the points within `radius_sq` (squared) of `query`
    pub fn query_radius(&self, query: &[f64; 3], radius_sq: f64) -> Vec<usize> {
        let mut out = Vec::new();
        self.for_each_within(query, radius_sq, |idx, _| out.push(idx));
        out
    }

    /// For every query point and every squared radius, count the indexed
    /// points with a squared separation `<= radius`.
    ///
    /// The output has shape `(n_queries, n_radii)`. When the query points
    /// come from the indexed catalog, each point counts itself (and every
    /// pair is seen from both ends). Correcting for that is the caller's job.
    pub fn cumulative_count_matrix(
        &self,
        queries: &PointSet,
        squared_radii: &[f64],
    ) -> Result<Array2<u64>, &'static str> {
        let radii = checked_radii(squared_radii)?;
        let mut out = Array2::<u64>::zeros((queries.n_points(), squared_radii.len()));
        for (i, mut row) in out.rows_mut().into_iter().enumerate() {
            // rows of a freshly allocated (standard layout) array are contiguous
            let counts = row
                .as_slice_mut()
                .ok_or("count matrix rows must be contiguous")?;
            let query = queries.point(i);
            self.cumulative_count_single(&query, squared_radii, &radii, Boundary::Closed, counts);
        }
        Ok(out)
    }

    /// Like [`Self::cumulative_count_matrix`], but summed over all query
    /// points (this is the quantity `scikit-learn` calls a two-point
    /// correlation).
    pub fn two_point_count(
        &self,
        queries: &PointSet,
        squared_radii: &[f64],
    ) -> Result<Vec<u64>, &'static str> {
        let radii = checked_radii(squared_radii)?;
        Ok(self.summed_counts(queries, squared_radii, &radii, Boundary::Closed))
    }

    /// Cumulative counts, summed over all query points, whose differences
    /// are the bins of `numpy.histogram`: a pair counts at every edge that
    /// is strictly larger than its squared separation, and at the last edge
    /// when it coincides with it.
    ///
    /// Self-pairs (zero separation) are included, just like in
    /// [`Self::two_point_count`].
    pub fn histogram_edge_count(&self, queries: &PointSet, edges: &SquaredBinEdges) -> Vec<u64> {
        let squared_radii = edges.as_slice();
        let radii: Vec<f64> = squared_radii.iter().map(|r| r.sqrt()).collect();
        self.summed_counts(queries, squared_radii, &radii, Boundary::HistogramEdges)
    }

    fn summed_counts(
        &self,
        queries: &PointSet,
        squared_radii: &[f64],
        radii: &[f64],
        boundary: Boundary,
    ) -> Vec<u64> {
        let mut counts = vec![0_u64; squared_radii.len()];
        for i in 0..queries.n_points() {
            let query = queries.point(i);
            self.cumulative_count_single(&query, squared_radii, radii, boundary, &mut counts);
        }
        counts
    }

    fn cumulative_count_single(
        &self,
        query: &[f64; 3],
        squared_radii: &[f64],
        radii: &[f64],
        boundary: Boundary,
        counts: &mut [u64],
    ) {
        if !self.nodes.is_empty() && !radii.is_empty() {
            let radii = RadiiRef {
                squared: squared_radii,
                plain: radii,
                boundary,
            };
            self.count_recursive(0, query, &radii, 0, radii.plain.len(), counts);
        }
    }

    /// `lo..hi` is the range of radii (ascending) whose count still depends
    /// on the contents of this node
    fn count_recursive(
        &self,
        node_idx: usize,
        query: &[f64; 3],
        radii: &RadiiRef,
        lo: usize,
        hi: usize,
        counts: &mut [u64],
    ) {
        let node = &self.nodes[node_idx];

        // radii too small to reach the node
        let mut new_lo = lo;
        let mut new_hi = hi;
        if M::TRIANGLE_INEQUALITY {
            let d = self.metric.distance(query, &node.center);
            let slack = PRUNE_SLACK * (d + node.radius);
            while new_lo < hi && d - node.radius > radii.plain[new_lo] + slack {
                new_lo += 1;
            }
            // radii that enclose the node
            while new_hi > new_lo && d + node.radius < radii.plain[new_hi - 1] - slack {
                new_hi -= 1;
            }
        }
        if new_lo < new_hi {
            let bound = self.min_squared_distance(node, query);
            while new_lo < new_hi
                && bound > radii.squared[new_lo] + PRUNE_SLACK * (bound + radii.squared[new_lo])
            {
                new_lo += 1;
            }
        }
        for count in counts[new_hi..hi].iter_mut() {
            *count += node.n_points();
        }
        if new_lo == new_hi {
            return;
        }

        match node.children {
            None => {
                for i in node.start..node.end {
                    let dsq = self.metric.squared_distance(query, &self.points[i]);
                    let first = radii.first_enclosing(dsq, new_lo, new_hi);
                    for count in counts[first..new_hi].iter_mut() {
                        *count += 1;
                    }
                }
            }
            Some([left, right]) => {
                self.count_recursive(left, query, radii, new_lo, new_hi, counts);
                self.count_recursive(right, query, radii, new_lo, new_hi, counts);
            }
        }
    }
}

/// The ascending radii of a cumulative count
struct RadiiRef<'a> {
    squared: &'a [f64],
    plain: &'a [f64],
    boundary: Boundary,
}

impl RadiiRef<'_> {
    /// The index of the first radius in `lo..hi` that holds a pair with
    /// squared separation `dsq` (`hi` when there is none)
    fn first_enclosing(&self, dsq: f64, lo: usize, hi: usize) -> usize {
        let window = &self.squared[lo..hi];
        match self.boundary {
            Boundary::Closed => lo + window.partition_point(|&r| r < dsq),
            Boundary::HistogramEdges => {
                let first = lo + window.partition_point(|&r| r <= dsq);
                let last = self.squared.len() - 1;
                if first == hi && hi == last + 1 && dsq == self.squared[last] {
                    last
                } else {
                    first
                }
            }
        }
    }
}

fn checked_radii(squared_radii: &[f64]) -> Result<Vec<f64>, &'static str> {
    if squared_radii.iter().any(|r| !(*r >= 0.0)) {
        Err("radii must be non-negative")
    } else if !squared_radii.is_sorted() {
        Err("radii must be sorted (monotonically increasing)")
    } else {
        Ok(squared_radii.iter().map(|r| r.sqrt()).collect())
    }
}

fn to_cartesian(p: &[f64; 3]) -> [f64; 3] {
    let [s, ra, dec] = *p;
    [
        s * dec.cos() * ra.cos(),
        s * dec.cos() * ra.sin(),
        s * dec.sin(),
    ]
}

fn from_cartesian(v: &[f64; 3]) -> [f64; 3] {
    let s = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if s == 0.0 {
        [0.0, 0.0, 0.0]
    } else {
        [s, v[1].atan2(v[0]), (v[2] / s).clamp(-1.0, 1.0).asin()]
    }
}

fn widest_dimension(cartesian: &[[f64; 3]], subset: &[usize]) -> usize {
    let mut best_dim = 0;
    let mut best_spread = f64::NEG_INFINITY;
    for dim in 0..3 {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &i in subset {
            lo = lo.min(cartesian[i][dim]);
            hi = hi.max(cartesian[i][dim]);
        }
        if hi - lo > best_spread {
            best_spread = hi - lo;
            best_dim = dim;
        }
    }
    best_dim
}
