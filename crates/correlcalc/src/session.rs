//! The state shared by all pair counts of a single correlation calculation.

use crate::catalog::{Catalog, CatalogRole};
use crate::config::{CancelToken, CorrelationOptions};
use crate::error::Error;
use crate::parallel::worker_pool;
use correlcalc_internal::{BallTree, Metric, PointSet, SquaredBinEdges};
use rayon::ThreadPool;
use std::borrow::Cow;
use std::num::NonZeroUsize;
use std::sync::OnceLock;

/// A computation context that owns everything the pair counts share: both
/// catalogs, one ball tree per catalog, the squared bin edges and the
/// dispatcher settings.
///
/// The trees are built once, in [`Session::new`], and reused by every pair
/// count: the data tree answers DD and RD, the random tree answers RR and
/// DR. Nothing outlives the session, so independent sessions can run
/// concurrently.
///
/// The metric is a type parameter, so the geometry is resolved once, when
/// the session is created, rather than per pair.
///
/// The worker pool of the weighted counts is created on first use and then
/// shared by all of them.
pub struct Session<'a, M: Metric> {
    data: &'a Catalog,
    random: Cow<'a, Catalog>,
    data_tree: BallTree<M>,
    random_tree: BallTree<M>,
    squared_edges: SquaredBinEdges,
    n_workers: NonZeroUsize,
    pool: OnceLock<ThreadPool>,
    cancel: Option<CancelToken>,
}

fn check_catalog(catalog: &Catalog, role: CatalogRole) -> Result<(), Error> {
    match catalog.len() {
        0 => Err(Error::catalog(role, "it is empty")),
        1 => Err(Error::catalog(role, "it must hold at least 2 points")),
        _ => Ok(()),
    }
}

fn build_tree<M: Metric>(
    catalog: &Catalog,
    metric: M,
    role: CatalogRole,
) -> Result<BallTree<M>, Error> {
    let points = catalog.points()?;
    if let Some(i) = (0..points.n_points()).find(|&i| !metric.admits(&points.point(i))) {
        let s = points.point(i)[0];
        return Err(Error::catalog(
            role,
            format!(
                "point {i} lies at a comoving distance of {s}, beyond the horizon \
                 (1/sqrt(K) with K = {}) of the closed geometry",
                metric.curvature()
            ),
        ));
    }
    let tree = BallTree::build(&points, metric);
    log::debug!(
        "built the {role} ball tree: {} points, {} nodes, depth {}",
        tree.len(),
        tree.n_nodes(),
        tree.depth()
    );
    Ok(tree)
}

impl<'a, M: Metric> Session<'a, M> {
    /// Validate the inputs and build the ball trees.
    ///
    /// `bin_edges` are separations (not squared), they must be strictly
    /// increasing, non-negative and there must be at least 2 of them.
    pub fn new(
        data: &'a Catalog,
        random: Cow<'a, Catalog>,
        bin_edges: &[f64],
        metric: M,
        options: &CorrelationOptions,
    ) -> Result<Self, Error> {
        let squared_edges = SquaredBinEdges::from_distance_edges(bin_edges)
            .map_err(|what| Error::bin_edge("bin_edges", what))?;
        check_catalog(data, CatalogRole::Data)?;
        check_catalog(&random, CatalogRole::Random)?;

        let data_tree = build_tree(data, metric, CatalogRole::Data)?;
        let random_tree = build_tree(&random, metric, CatalogRole::Random)?;
        Ok(Session {
            data,
            random,
            data_tree,
            random_tree,
            squared_edges,
            n_workers: options.n_workers(),
            pool: OnceLock::new(),
            cancel: options.cancel_token().cloned(),
        })
    }

    pub fn n_data(&self) -> usize {
        self.data.len()
    }

    pub fn n_random(&self) -> usize {
        self.random.len()
    }

    pub fn n_bins(&self) -> usize {
        self.squared_edges.n_bins()
    }

    pub fn n_workers(&self) -> NonZeroUsize {
        self.n_workers
    }

    pub fn data(&self) -> &Catalog {
        self.data
    }

    pub fn random(&self) -> &Catalog {
        &self.random
    }

    pub(crate) fn data_tree(&self) -> &BallTree<M> {
        &self.data_tree
    }

    pub(crate) fn random_tree(&self) -> &BallTree<M> {
        &self.random_tree
    }

    pub(crate) fn squared_edges(&self) -> &SquaredBinEdges {
        &self.squared_edges
    }

    /// The pool that runs the weighted counts (built by the first call)
    pub(crate) fn worker_pool(&self) -> Result<&ThreadPool, Error> {
        match self.pool.get() {
            Some(pool) => Ok(pool),
            None => {
                let pool = worker_pool(self.n_workers)?;
                Ok(self.pool.get_or_init(|| pool))
            }
        }
    }

    pub(crate) fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    pub(crate) fn data_points(&self) -> Result<PointSet<'_>, Error> {
        self.data.points()
    }

    pub(crate) fn random_points(&self) -> Result<PointSet<'_>, Error> {
        self.random.points()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorrelationOptionsBuilder;
    use correlcalc_internal::{CLOSED_CURVATURE, CurvedMetric, FlatMetric, OPEN_CURVATURE};
    use ndarray::Array2;

    fn line_of_sight(n: usize) -> Catalog {
        let mut positions = Array2::<f64>::zeros((3, n));
        for i in 0..n {
            positions[[0, i]] = 0.01 * (i + 1) as f64;
        }
        Catalog::new(positions, None).unwrap()
    }

    #[test]
    fn construction() {
        let (data, random) = (line_of_sight(4), line_of_sight(8));
        let options = CorrelationOptions::default();
        let session =
            Session::new(&data, Cow::Borrowed(&random), &[0.0, 0.015, 0.025], FlatMetric, &options)
                .unwrap();
        assert_eq!(session.n_data(), 4);
        assert_eq!(session.n_random(), 8);
        assert_eq!(session.n_bins(), 2);
        assert_eq!(session.data_tree().len(), 4);
        assert_eq!(session.random_tree().len(), 8);
    }

    #[test]
    fn bad_inputs() {
        let (data, random) = (line_of_sight(4), line_of_sight(8));
        let options = CorrelationOptions::default();
        let mk = |data: &Catalog, random: &Catalog, edges: &[f64]| {
            Session::new(data, Cow::Borrowed(random), edges, FlatMetric, &options).map(|_| ())
        };
        assert!(mk(&data, &random, &[0.1]).is_err());
        assert!(mk(&data, &random, &[0.1, 0.05]).is_err());
        assert!(mk(&data, &random, &[-0.1, 0.05]).is_err());
        assert!(mk(&line_of_sight(1), &random, &[0.0, 0.1]).is_err());
        let err = mk(&data, &line_of_sight(0), &[0.0, 0.1]).unwrap_err();
        assert_eq!(err.to_string(), "problem with the random catalog: it is empty");
    }

    #[test]
    fn closed_geometry_horizon() {
        let data = line_of_sight(4);
        let mut positions = Array2::<f64>::zeros((3, 3));
        positions[[0, 0]] = 0.5;
        positions[[0, 1]] = 0.9;
        positions[[0, 2]] = 1.2;
        let random = Catalog::new(positions, None).unwrap();
        let options = CorrelationOptions::default();
        let closed = CurvedMetric::new(CLOSED_CURVATURE);
        let err = Session::new(&data, Cow::Borrowed(&random), &[0.0, 0.1], closed, &options)
            .map(|_| ())
            .unwrap_err();
        assert!(err.to_string().contains("point 2"), "{err}");

        // the open geometry has no such limit
        let open = CurvedMetric::new(OPEN_CURVATURE);
        assert!(Session::new(&data, Cow::Borrowed(&random), &[0.0, 0.1], open, &options).is_ok());
    }

    #[test]
    fn worker_pool_is_shared() {
        let (data, random) = (line_of_sight(4), line_of_sight(8));
        let options = CorrelationOptionsBuilder::new()
            .n_workers(NonZeroUsize::new(3).unwrap())
            .build();
        let session =
            Session::new(&data, Cow::Borrowed(&random), &[0.0, 0.015, 0.025], FlatMetric, &options)
                .unwrap();
        let first = session.worker_pool().unwrap();
        assert_eq!(first.current_num_threads(), 3);
        assert!(std::ptr::eq(first, session.worker_pool().unwrap()));
    }
}
