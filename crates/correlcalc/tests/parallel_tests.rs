use correlcalc::{
    BallTree, CancelToken, CorrelationOptionsBuilder, CurvedMetric, FlatMetric, Metric,
    OPEN_CURVATURE, PointSet, RandomSource, SquaredBinEdges, WeightedPairKernel,
    compute_correlation, parallel_histogram, shard_ranges, worker_pool,
};
use std::num::NonZeroUsize;

mod common;

use common::random_catalog;

const BIN_EDGES: [f64; 5] = [0.0, 0.005, 0.01, 0.02, 0.04];

// The weights are integers, so every partial sum is exact and the merged
// histogram must match the serial one bit for bit.
fn check_against_serial<M: Metric>(metric: M, is_auto: bool) {
    let data = random_catalog(2525365464_u64, 301, true);
    let random = random_catalog(1234_u64, 157, true);
    let (indexed, queries) = if is_auto {
        (&data, &data)
    } else {
        (&data, &random)
    };
    let indexed_points = indexed.positions().view();
    let weights = indexed.weights().unwrap();

    let tree = BallTree::build(&PointSet::new(indexed_points, Some(weights)).unwrap(), metric);
    let edges = SquaredBinEdges::from_distance_edges(&BIN_EDGES).unwrap();
    let query_points = PointSet::new(queries.positions().view(), queries.weights()).unwrap();
    let kernel = WeightedPairKernel::new(&tree, query_points, weights, &edges, is_auto).unwrap();

    let serial = kernel.histogram(0..kernel.n_queries(), &|| false).unwrap();
    assert!(serial.iter().any(|&count| count > 0.0));
    for n_workers in 1..=8 {
        let pool = worker_pool(NonZeroUsize::new(n_workers).unwrap()).unwrap();
        let parallel = parallel_histogram(&kernel, &pool, None).unwrap();
        assert_eq!(parallel, serial, "mismatch for {n_workers} workers");
    }
}

#[test]
fn parallel_matches_serial_auto() {
    check_against_serial(FlatMetric, true);
}

#[test]
fn parallel_matches_serial_cross() {
    check_against_serial(FlatMetric, false);
}

#[test]
fn parallel_matches_serial_curved() {
    check_against_serial(CurvedMetric::new(OPEN_CURVATURE), true);
}

#[test]
fn more_workers_than_points() {
    let data = random_catalog(5, 3, true);
    let tree = BallTree::build(
        &PointSet::new(data.positions().view(), data.weights()).unwrap(),
        FlatMetric,
    );
    let edges = SquaredBinEdges::from_distance_edges(&[0.0, 1.0]).unwrap();
    let points = PointSet::new(data.positions().view(), data.weights()).unwrap();
    let weights = data.weights().unwrap();
    let kernel = WeightedPairKernel::new(&tree, points, weights, &edges, true).unwrap();

    let shards = shard_ranges(3, NonZeroUsize::new(5).unwrap());
    assert_eq!(shards.iter().filter(|r| r.is_empty()).count(), 2);

    let serial = kernel.histogram(0..3, &|| false).unwrap();
    let pool = worker_pool(NonZeroUsize::new(5).unwrap()).unwrap();
    let parallel = parallel_histogram(&kernel, &pool, None).unwrap();
    assert_eq!(parallel, serial);
    // every point sees the other two
    let total_weight: f64 = weights.iter().sum();
    assert_eq!(parallel[0], 2.0 * total_weight);
}

#[test]
fn cancelled_before_start() {
    let data = random_catalog(17, 100, true);
    let random = random_catalog(18, 100, true);
    let token = CancelToken::new();
    token.cancel();
    let options = CorrelationOptionsBuilder::new()
        .weights(true)
        .n_workers(NonZeroUsize::new(2).unwrap())
        .cancel_token(token)
        .build();
    let err = compute_correlation(&data, RandomSource::Catalog(&random), &BIN_EDGES, &options)
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn cancelled_mid_flight() {
    let data = random_catalog(19, 2000, true);
    let tree = BallTree::build(
        &PointSet::new(data.positions().view(), data.weights()).unwrap(),
        FlatMetric,
    );
    let edges = SquaredBinEdges::from_distance_edges(&BIN_EDGES).unwrap();
    let points = PointSet::new(data.positions().view(), data.weights()).unwrap();
    let weights = data.weights().unwrap();
    let kernel = WeightedPairKernel::new(&tree, points, weights, &edges, true).unwrap();

    let token = CancelToken::new();
    let pool = worker_pool(NonZeroUsize::new(2).unwrap()).unwrap();
    let outcome = std::thread::scope(|s| {
        let handle = s.spawn(|| parallel_histogram(&kernel, &pool, Some(&token)));
        token.cancel();
        handle.join().unwrap()
    });
    // the calculation may finish before the cancellation is noticed
    if let Err(err) = outcome {
        assert!(err.is_cancelled(), "{err}");
    }
}
