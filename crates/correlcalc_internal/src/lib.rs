//! Kernels behind the `correlcalc` crate.
//!
//! This crate holds the pieces that don't carry any policy: the distance
//! metrics, bin edges, the ball tree and the pair-counting kernels. Errors
//! are reported as `&'static str`; the public crate wraps them.
//!
//! It isn't meant to be used directly.

mod balltree;
mod bins;
mod kernels;
mod metric;
mod points;

pub use balltree::BallTree;
pub use bins::{SquaredBinEdges, validate_bin_edges};
pub use kernels::{WeightedPairKernel, binned_pair_counts};
pub use metric::{
    CLOSED_CURVATURE, CurvedMetric, FlatMetric, Geometry, Metric, OPEN_CURVATURE,
    versine_angular_separation,
};
pub use points::PointSet;
