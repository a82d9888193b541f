/*!
Computes the two-point correlation function (2pCF) of galaxies and quasars
from a redshift survey.

# High-Level: the 2pCF

The two-point correlation function measures the excess probability (over a
random distribution) of finding a pair of objects at a given separation.
It is estimated by counting pairs of points in separation bins:

- DD: pairs within the data catalog,
- RR: pairs within a random catalog that shares the survey's selection,
- DR/RD: pairs between the two.

The normalized counts are then combined by an estimator (see
[`Estimator`]), and each bin gets a Poisson error.

Separations are measured with the metric of a flat, open or closed universe
(see [`Geometry`]). Points are `[s, ra, dec]` triples, where `s` is the
comoving distance in units of c/H0 (see [`comov`]) and the angles are in
radians.

# User Guide

```no_run
use correlcalc::{Catalog, CorrelationOptionsBuilder, RandomSource, compute_correlation};
# let (data, random): (Catalog, Catalog) = unimplemented!();
let options = CorrelationOptionsBuilder::new()
    .estimator_name("ls")
    .weights(true)
    .build();
let bin_edges = [0.002, 0.004, 0.006, 0.008, 0.01];
let result =
    compute_correlation(&data, RandomSource::Catalog(&random), &bin_edges, &options).unwrap();
println!("{:?} +/- {:?}", result.correlation, result.error);
```

Individual pair counts are available through [`Session`].

# Developer Guide

The distance metrics, the ball tree and the pair-counting kernels live in
[`correlcalc_internal`]. This crate adds the policy: validation,
normalization, the parallel dispatcher and the estimators.

*/

#![deny(rustdoc::broken_intra_doc_links)]

// inform build-system of the crates in this package
mod catalog;
mod config;
mod correlation;
mod cosmology;
mod error;
mod estimator;
mod paircount;
mod parallel;
mod session;

// pull in symbols that visible outside of the package
pub use catalog::{Catalog, CatalogRole, RandomCatalogGenerator, RandomSource};
pub use config::{CancelToken, CorrelationOptions, CorrelationOptionsBuilder, Estimator};
pub use correlation::{CorrelationResult, compute_correlation};
pub use correlcalc_internal::{
    CLOSED_CURVATURE, CurvedMetric, FlatMetric, Geometry, Metric, OPEN_CURVATURE,
};
pub use cosmology::{CosmologyModel, OMEGA_LAMBDA, OMEGA_M, comov, comov_array};
pub use error::Error;
pub use estimator::{estimate_correlation, poisson_error};
pub use parallel::{parallel_histogram, shard_ranges, worker_pool};
pub use session::Session;

// the kernel types show up in the signature of `parallel_histogram`
pub use correlcalc_internal::{BallTree, PointSet, SquaredBinEdges, WeightedPairKernel};
