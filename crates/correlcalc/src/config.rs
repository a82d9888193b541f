//! Typed options for a correlation calculation.
//!
//! Names of geometries, estimators and cosmologies can be given as strings
//! (e.g. when they come from a python wrapper or a config file). Unknown
//! names are never fatal: we log a warning and fall back to a default.

use crate::cosmology::CosmologyModel;
use correlcalc_internal::Geometry;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The formula used to combine the normalized pair counts.
///
/// See arXiv:1211.6211 for a comparison of the estimators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Estimator {
    /// `DD/DR - 1`
    #[default]
    DavisPeebles,
    /// `DD/RR - 1`
    PeeblesHauser,
    /// `(DD - 2 DR + RR)/RR`
    LandySzalay,
    /// `(DD - DR)/RR`
    Hewett,
    /// `DD RR/DR^2 - 1`
    Hamilton,
}

impl Estimator {
    pub fn name(&self) -> &'static str {
        match self {
            Estimator::DavisPeebles => "dp",
            Estimator::PeeblesHauser => "ph",
            Estimator::LandySzalay => "ls",
            Estimator::Hewett => "hew",
            Estimator::Hamilton => "h",
        }
    }

    /// Whether the estimator uses the data-random counts
    pub fn needs_dr(&self) -> bool {
        !matches!(self, Estimator::PeeblesHauser)
    }

    /// Whether the estimator uses the random-random counts
    pub fn needs_rr(&self) -> bool {
        !matches!(self, Estimator::DavisPeebles)
    }

    /// Parse `name`, resolving unknown names to [`Estimator::LandySzalay`].
    ///
    /// # Note
    /// The fallback differs from the default estimator
    /// ([`Estimator::DavisPeebles`]). This mirrors the long-standing
    /// behavior of correlcalc and is kept until someone decides which of the
    /// two is intended.
    pub fn from_name_or_fallback(name: &str) -> Estimator {
        name.parse().unwrap_or_else(|err| {
            log::warn!(
                "{err}. Falling back to the Landy-Szalay estimator (note: this is NOT the \
                 default estimator, dp)"
            );
            Estimator::LandySzalay
        })
    }
}

impl FromStr for Estimator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dp" => Ok(Estimator::DavisPeebles),
            "ph" => Ok(Estimator::PeeblesHauser),
            "ls" => Ok(Estimator::LandySzalay),
            "hew" => Ok(Estimator::Hewett),
            "h" => Ok(Estimator::Hamilton),
            _ => Err(format!("{s} is not an estimator. Choices include: dp, ls, ph, hew, h")),
        }
    }
}

/// A flag shared between the caller and a running calculation.
///
/// Calling [`CancelToken::cancel`] (from any thread) makes the workers of a
/// parallel pair count stop at their next query point; the calculation then
/// returns an error for which [`crate::Error::is_cancelled`] is true.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl PartialEq for CancelToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Options of a correlation calculation. Build them with
/// [`CorrelationOptionsBuilder`] or [`CorrelationOptions::from_key_values`].
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationOptions {
    geometry: Geometry,
    estimator: Estimator,
    cosmology: CosmologyModel,
    weights: bool,
    rand_factor: usize,
    n_workers: Option<NonZeroUsize>,
    cancel: Option<CancelToken>,
}

impl Default for CorrelationOptions {
    fn default() -> Self {
        CorrelationOptions {
            geometry: Geometry::default(),
            estimator: Estimator::default(),
            cosmology: CosmologyModel::default(),
            weights: false,
            rand_factor: 2,
            n_workers: None,
            cancel: None,
        }
    }
}

impl CorrelationOptions {
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn estimator(&self) -> Estimator {
        self.estimator
    }

    pub fn cosmology(&self) -> CosmologyModel {
        self.cosmology
    }

    /// Whether weighted pair counts were requested
    pub fn weights(&self) -> bool {
        self.weights
    }

    /// The size of a generated random catalog, as a multiple of the size of
    /// the data catalog
    pub fn rand_factor(&self) -> usize {
        self.rand_factor
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    /// The number of workers used by the weighted pair counts.
    ///
    /// When unspecified, we use one less than the available parallelism
    /// (leaving a unit for the calling thread), but never less than 1.
    pub fn n_workers(&self) -> NonZeroUsize {
        self.n_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .ok()
                .and_then(|n| NonZeroUsize::new(n.get() - 1))
                .unwrap_or(NonZeroUsize::MIN)
        })
    }

    /// Construct options from loosely typed key-value pairs.
    ///
    /// Recognized keys (case-insensitive) are `geometry`, `estimator`,
    /// `cosmology`, `weights`, `randfact` and `workers`. Unknown keys and
    /// unparsable values are reported with a warning and otherwise ignored.
    pub fn from_key_values<K: AsRef<str>, V: AsRef<str>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> CorrelationOptions {
        let mut builder = CorrelationOptionsBuilder::new();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            builder = match key.to_lowercase().as_str() {
                "geometry" => builder.geometry_name(value),
                "estimator" => builder.estimator_name(value),
                "cosmology" => builder.cosmology_name(value),
                "weights" => match parse_flag(value) {
                    Some(flag) => builder.weights(flag),
                    None => {
                        log::warn!("{value} is not a valid value for weights. Using false");
                        builder.weights(false)
                    }
                },
                "randfact" => match value.trim().parse::<usize>() {
                    Ok(factor) if factor > 0 => builder.rand_factor(factor),
                    _ => {
                        log::warn!("{value} is not a valid randfact. Using 2");
                        builder.rand_factor(2)
                    }
                },
                "workers" => match value.trim().parse::<NonZeroUsize>() {
                    Ok(n) => builder.n_workers(n),
                    Err(_) => {
                        log::warn!("{value} is not a valid number of workers. Using the default");
                        builder
                    }
                },
                _ => {
                    log::warn!("key argument `{key}` not valid");
                    builder
                }
            };
        }
        builder.build()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Builds [`CorrelationOptions`].
///
/// ```
/// use correlcalc::{CorrelationOptionsBuilder, Estimator, Geometry};
/// let options = CorrelationOptionsBuilder::new()
///     .geometry(Geometry::Open)
///     .estimator_name("ls")
///     .weights(true)
///     .build();
/// assert_eq!(options.estimator(), Estimator::LandySzalay);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CorrelationOptionsBuilder {
    options: CorrelationOptions,
}

impl CorrelationOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.options.geometry = geometry;
        self
    }

    /// Set the geometry by name, falling back to [`Geometry::Flat`]
    pub fn geometry_name(self, name: &str) -> Self {
        let geometry = name.parse().unwrap_or_else(|err| {
            log::warn!("{err}. Using flat geometry");
            Geometry::Flat
        });
        self.geometry(geometry)
    }

    pub fn estimator(mut self, estimator: Estimator) -> Self {
        self.options.estimator = estimator;
        self
    }

    /// Set the estimator by name (see [`Estimator::from_name_or_fallback`])
    pub fn estimator_name(self, name: &str) -> Self {
        self.estimator(Estimator::from_name_or_fallback(name))
    }

    pub fn cosmology(mut self, cosmology: CosmologyModel) -> Self {
        self.options.cosmology = cosmology;
        self
    }

    /// Set the cosmology by name, falling back to [`CosmologyModel::Lcdm`]
    pub fn cosmology_name(self, name: &str) -> Self {
        let cosmology = name.parse().unwrap_or_else(|err| {
            log::warn!("{err}. Using lcdm");
            CosmologyModel::Lcdm
        });
        self.cosmology(cosmology)
    }

    pub fn weights(mut self, weights: bool) -> Self {
        self.options.weights = weights;
        self
    }

    /// A factor of 0 is replaced by the default (2)
    pub fn rand_factor(mut self, rand_factor: usize) -> Self {
        if rand_factor == 0 {
            log::warn!("rand_factor must be positive. Using 2");
            self.options.rand_factor = 2;
        } else {
            self.options.rand_factor = rand_factor;
        }
        self
    }

    pub fn n_workers(mut self, n_workers: NonZeroUsize) -> Self {
        self.options.n_workers = Some(n_workers);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.options.cancel = Some(token);
        self
    }

    pub fn build(self) -> CorrelationOptions {
        self.options
    }
}
