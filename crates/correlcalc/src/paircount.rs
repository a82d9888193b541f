//! The normalized pair counts (DD, RR, DR and RD).
//!
//! # Conventions
//!
//! - Auto-correlation counts (DD, RR) are expressed per *unique* pair. We
//!   halve the ordered count produced by the kernels (each pair is seen from
//!   both ends) and divide by the number of unique pairs, `N(N-1)/2`.
//! - Cross-correlation counts (DR, RD) are divided by `N_data * N_random`.
//! - A bin that received nothing is set to 1 before the division, so that
//!   no estimator ever divides by zero. This biases that bin's estimate low.
//!
//! Both the unweighted and the weighted counts bin pairs like
//! `numpy.histogram` (`edge[i] <= d < edge[i+1]`, last bin closed), so with
//! unit weights the two agree exactly. The weighted counts add up the weight
//! of the indexed point of every pair. In an auto-correlation, a point is
//! never paired with itself, but distinct points at the same position are.

use crate::error::Error;
use crate::parallel::parallel_histogram;
use crate::session::Session;
use correlcalc_internal::{BallTree, Metric, PointSet, WeightedPairKernel, binned_pair_counts};
use std::borrow::Cow;

fn floor_empty_bins(counts: &mut [f64]) {
    for count in counts.iter_mut() {
        if *count == 0.0 {
            *count = 1.0;
        }
    }
}

/// turns ordered auto-correlation counts into the normalized count per
/// unique pair
fn normalize_auto(mut ordered: Vec<f64>, n: usize) -> Vec<f64> {
    for count in ordered.iter_mut() {
        *count *= 0.5;
    }
    floor_empty_bins(&mut ordered);
    let n_unique_pairs = 0.5 * (n as f64) * (n as f64 - 1.0);
    ordered.into_iter().map(|c| c / n_unique_pairs).collect()
}

fn normalize_cross(mut counts: Vec<f64>, n_data: usize, n_random: usize) -> Vec<f64> {
    floor_empty_bins(&mut counts);
    let n_pairs = (n_data as f64) * (n_random as f64);
    counts.into_iter().map(|c| c / n_pairs).collect()
}

fn weights_or_unit<'a>(points: &PointSet<'a>) -> Cow<'a, [f64]> {
    match points.weights() {
        Some(weights) => Cow::Borrowed(weights),
        None => Cow::Owned(vec![1.0; points.n_points()]),
    }
}

fn log_stage(stage: &str, counts: &[f64]) {
    log::debug!("{stage} = {counts:?}");
}

impl<M: Metric> Session<'_, M> {
    fn unweighted(
        &self,
        tree: &BallTree<M>,
        queries: &PointSet,
        is_auto: bool,
    ) -> Result<Vec<f64>, Error> {
        binned_pair_counts(tree, queries, self.squared_edges(), is_auto)
            .map_err(Error::internal_legacy_adhoc)
    }

    fn weighted(
        &self,
        tree: &BallTree<M>,
        queries: PointSet,
        neighbor_weights: &[f64],
        is_auto: bool,
    ) -> Result<Vec<f64>, Error> {
        let kernel =
            WeightedPairKernel::new(tree, queries, neighbor_weights, self.squared_edges(), is_auto)
                .map_err(Error::internal_legacy_adhoc)?;
        parallel_histogram(&kernel, self.worker_pool()?, self.cancel_token())
    }

    /// The raw number of unique data-data pairs in each bin (nothing is
    /// floored or normalized).
    pub fn dd_pair_counts(&self) -> Result<Vec<f64>, Error> {
        let ordered = self.unweighted(self.data_tree(), &self.data_points()?, true)?;
        Ok(ordered.into_iter().map(|c| 0.5 * c).collect())
    }

    /// Normalized data-data counts
    pub fn dd(&self) -> Result<Vec<f64>, Error> {
        let ordered = self.unweighted(self.data_tree(), &self.data_points()?, true)?;
        let out = normalize_auto(ordered, self.n_data());
        log_stage("DD", &out);
        Ok(out)
    }

    /// Normalized random-random counts
    pub fn rr(&self) -> Result<Vec<f64>, Error> {
        let ordered = self.unweighted(self.random_tree(), &self.random_points()?, true)?;
        let out = normalize_auto(ordered, self.n_random());
        log_stage("RR", &out);
        Ok(out)
    }

    /// Normalized data-random counts, from querying the random tree with the
    /// data points
    pub fn dr(&self) -> Result<Vec<f64>, Error> {
        let counts = self.unweighted(self.random_tree(), &self.data_points()?, false)?;
        let out = normalize_cross(counts, self.n_data(), self.n_random());
        log_stage("DR", &out);
        Ok(out)
    }

    /// Normalized random-data counts, from querying the data tree with the
    /// random points. Without weights, this matches [`Self::dr`].
    pub fn rd(&self) -> Result<Vec<f64>, Error> {
        let counts = self.unweighted(self.data_tree(), &self.random_points()?, false)?;
        let out = normalize_cross(counts, self.n_data(), self.n_random());
        log_stage("RD", &out);
        Ok(out)
    }

    /// Normalized, weighted data-data counts (computed in parallel).
    ///
    /// Points without weights count with a weight of 1.
    pub fn dd_weighted(&self) -> Result<Vec<f64>, Error> {
        let points = self.data_points()?;
        let weights = weights_or_unit(&points);
        let ordered = self.weighted(self.data_tree(), points.clone(), &weights, true)?;
        let out = normalize_auto(ordered, self.n_data());
        log_stage("DD (weighted)", &out);
        Ok(out)
    }

    /// Normalized, weighted random-random counts (computed in parallel)
    pub fn rr_weighted(&self) -> Result<Vec<f64>, Error> {
        let points = self.random_points()?;
        let weights = weights_or_unit(&points);
        let ordered = self.weighted(self.random_tree(), points.clone(), &weights, true)?;
        let out = normalize_auto(ordered, self.n_random());
        log_stage("RR (weighted)", &out);
        Ok(out)
    }

    /// Normalized data-random counts that accumulate the *random* weights
    /// (data points query the random tree).
    pub fn dr_weighted(&self) -> Result<Vec<f64>, Error> {
        let random_points = self.random_points()?;
        let weights = weights_or_unit(&random_points);
        let counts = self.weighted(self.random_tree(), self.data_points()?, &weights, false)?;
        let out = normalize_cross(counts, self.n_data(), self.n_random());
        log_stage("DR (weighted)", &out);
        Ok(out)
    }

    /// Normalized random-data counts that accumulate the *data* weights
    /// (random points query the data tree).
    ///
    /// In general this differs from [`Self::dr_weighted`]. The weighted
    /// correlation calculations use this one in place of DR.
    pub fn rd_weighted(&self) -> Result<Vec<f64>, Error> {
        let data_points = self.data_points()?;
        let weights = weights_or_unit(&data_points);
        let counts = self.weighted(self.data_tree(), self.random_points()?, &weights, false)?;
        let out = normalize_cross(counts, self.n_data(), self.n_random());
        log_stage("RD (weighted)", &out);
        Ok(out)
    }
}
