//! The top-level correlation calculation.

use crate::catalog::{Catalog, CatalogRole, RandomSource};
use crate::config::CorrelationOptions;
use crate::error::Error;
use crate::estimator::{estimate_correlation, poisson_error};
use crate::session::Session;
use correlcalc_internal::{CurvedMetric, FlatMetric, Geometry, Metric};
use std::borrow::Cow;

/// The outcome of [`compute_correlation`].
///
/// Alongside the correlation and its Poisson error, we keep the normalized
/// pair counts that went into the estimator. `dr` and `rr` are `None` when
/// the estimator doesn't use them. For weighted calculations, `dr` holds the
/// random-data counts (see [`Session::rd_weighted`]).
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationResult {
    pub correlation: Vec<f64>,
    pub error: Vec<f64>,
    pub dd: Vec<f64>,
    pub dr: Option<Vec<f64>>,
    pub rr: Option<Vec<f64>>,
}

/// Compute the two-point correlation function of `data`.
///
/// `bin_edges` are comoving separations (in units of c/H0). The result has
/// one entry per bin.
///
/// The random catalog comes from `random`. When it is a generator, it is
/// asked for `options.rand_factor() * data.len()` points. Without a random
/// catalog, the calculation fails.
///
/// When weights are requested but `data` has none, we log a warning and
/// compute unweighted counts.
pub fn compute_correlation(
    data: &Catalog,
    random: RandomSource,
    bin_edges: &[f64],
    options: &CorrelationOptions,
) -> Result<CorrelationResult, Error> {
    correlcalc_internal::validate_bin_edges(bin_edges)
        .map_err(|what| Error::bin_edge("bin_edges", what))?;
    if data.is_empty() {
        return Err(Error::catalog(CatalogRole::Data, "it is empty"));
    }

    let random: Cow<'_, Catalog> = match random {
        RandomSource::Catalog(catalog) => Cow::Borrowed(catalog),
        RandomSource::Generator(generator) => {
            let size = options.rand_factor().checked_mul(data.len()).ok_or_else(|| {
                Error::catalog(
                    CatalogRole::Random,
                    format!(
                        "{} times {} data points overflows the catalog size",
                        options.rand_factor(),
                        data.len()
                    ),
                )
            })?;
            log::info!("generating a random catalog of {size} points");
            Cow::Owned(generator.generate(size, options.cosmology())?)
        }
        RandomSource::None => return Err(Error::missing_random_catalog()),
    };

    log::info!(
        "computing the 2pCF: geometry = {}, estimator = {}, weights = {}, {} data points, \
         {} random points, {} workers",
        options.geometry().name(),
        options.estimator().name(),
        options.weights(),
        data.len(),
        random.len(),
        options.n_workers()
    );

    // the metric is picked once, everything downstream is generic over it
    match options.geometry() {
        Geometry::Flat => {
            let session = Session::new(data, random, bin_edges, FlatMetric, options)?;
            run(session, options)
        }
        geometry => {
            let metric = CurvedMetric::new(geometry.curvature());
            let session = Session::new(data, random, bin_edges, metric, options)?;
            run(session, options)
        }
    }
}

fn run<M: Metric>(
    session: Session<'_, M>,
    options: &CorrelationOptions,
) -> Result<CorrelationResult, Error> {
    let estimator = options.estimator();
    let weighted = options.weights() && session.data().weights().is_some();
    if options.weights() && !weighted {
        log::warn!("weights were requested but the data catalog has none. Using unweighted counts");
    }

    let dd = if weighted {
        session.dd_weighted()?
    } else {
        session.dd()?
    };
    let dr = match (estimator.needs_dr(), weighted) {
        (false, _) => None,
        (true, true) => Some(session.rd_weighted()?),
        (true, false) => Some(session.dr()?),
    };
    let rr = match (estimator.needs_rr(), weighted) {
        (false, _) => None,
        (true, true) => Some(session.rr_weighted()?),
        (true, false) => Some(session.rr()?),
    };

    let xi = estimate_correlation(
        estimator,
        &dd,
        dr.as_deref().unwrap_or_default(),
        rr.as_deref().unwrap_or_default(),
    )?;
    let error = poisson_error(&xi, &dd, session.n_data());
    log::info!("correlation = {xi:?}");
    Ok(CorrelationResult {
        correlation: xi,
        error,
        dd,
        dr,
        rr,
    })
}
