//! Combine normalized pair counts into a correlation estimate.

use crate::config::Estimator;
use crate::error::Error;

fn check_len(counts: &[f64], n_bins: usize, what: &'static str) -> Result<(), Error> {
    if counts.len() == n_bins {
        Ok(())
    } else {
        Err(Error::internal_legacy_adhoc(what))
    }
}

/// Evaluate `estimator` bin by bin.
///
/// All counts must already be normalized (see [`crate::Session`]). Counts
/// that the estimator doesn't use are ignored, so they may be empty slices.
pub fn estimate_correlation(
    estimator: Estimator,
    dd: &[f64],
    dr: &[f64],
    rr: &[f64],
) -> Result<Vec<f64>, Error> {
    let n_bins = dd.len();
    if estimator.needs_dr() {
        check_len(dr, n_bins, "the DR counts must have one entry per bin")?;
    }
    if estimator.needs_rr() {
        check_len(rr, n_bins, "the RR counts must have one entry per bin")?;
    }

    let out = (0..n_bins)
        .map(|i| match estimator {
            Estimator::DavisPeebles => dd[i] / dr[i] - 1.0,
            Estimator::PeeblesHauser => dd[i] / rr[i] - 1.0,
            Estimator::LandySzalay => (dd[i] - 2.0 * dr[i] + rr[i]) / rr[i],
            Estimator::Hewett => (dd[i] - dr[i]) / rr[i],
            Estimator::Hamilton => (dd[i] * rr[i]) / (dr[i] * dr[i]) - 1.0,
        })
        .collect();
    Ok(out)
}

/// Poisson error of each bin: `(1 + xi) / sqrt(n_pairs)`.
///
/// `n_pairs` is the effective number of (ordered) data pairs, recovered by
/// undoing the normalization of the data-data counts:
/// `dd_normalized * n_data * (n_data - 1)`. For weighted calculations,
/// `dd_normalized` is the weighted histogram, so the effective pair count is
/// the normalized weighted count scaled by the unweighted denominator.
pub fn poisson_error(correlation: &[f64], dd_normalized: &[f64], n_data: usize) -> Vec<f64> {
    let n = n_data as f64;
    correlation
        .iter()
        .zip(dd_normalized)
        .map(|(xi, dd)| (1.0 + xi) / (dd * n * (n - 1.0)).sqrt())
        .collect()
}
