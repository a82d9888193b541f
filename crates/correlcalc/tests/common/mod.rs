// the reason this is named mod.rs has to do with some complexities of how
// testing is handled
//
// we are following the advice of the rust book
// https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

use correlcalc::Catalog;
use ndarray::Array2;
use rand::distr::{Distribution, Uniform};
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;

// based on numpy!
// https://numpy.org/doc/stable/reference/generated/numpy.isclose.html
pub fn isclose(actual: f64, ref_val: f64, rtol: f64, atol: f64) -> bool {
    let actual_nan = actual.is_nan();
    let ref_nan = ref_val.is_nan();
    if actual_nan || ref_nan {
        actual_nan && ref_nan
    } else {
        (actual - ref_val).abs() <= (atol + rtol * ref_val.abs())
    }
}

#[allow(dead_code)]
pub fn assert_allclose(actual: &[f64], ref_vals: &[f64], rtol: f64, atol: f64) {
    assert_eq!(actual.len(), ref_vals.len(), "lengths differ");
    for (i, (a, r)) in actual.iter().zip(ref_vals).enumerate() {
        assert!(
            isclose(*a, *r, rtol, atol),
            "element {i} differs: actual = {a}, reference = {r}\n\
             actual array:    {actual:?}\n\
             reference array: {ref_vals:?}"
        );
    }
}

/// Points spread uniformly over a small wedge of the sky. With `weighted`,
/// every point gets an integer weight between 1 and 4 (integers keep the
/// weighted sums exact, regardless of summation order).
#[allow(dead_code)]
pub fn random_catalog(seed: u64, n_points: usize, weighted: bool) -> Catalog {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let s_dist = Uniform::try_from(0.1..0.2).unwrap();
    let ra_dist = Uniform::try_from(0.0..0.2).unwrap();
    let dec_dist = Uniform::try_from(-0.1..0.1).unwrap();
    let weight_dist = Uniform::try_from(1..=4).unwrap();

    let mut positions = Array2::<f64>::zeros((3, n_points));
    for i in 0..n_points {
        positions[[0, i]] = s_dist.sample(&mut rng);
        positions[[1, i]] = ra_dist.sample(&mut rng);
        positions[[2, i]] = dec_dist.sample(&mut rng);
    }
    let weights = if weighted {
        Some(
            (0..n_points)
                .map(|_| weight_dist.sample(&mut rng) as f64)
                .collect(),
        )
    } else {
        None
    };
    Catalog::new(positions, weights).unwrap()
}

/// Points along a single line of sight (RA = DEC = 0)
#[allow(dead_code)]
pub fn line_of_sight(distances: &[f64]) -> Catalog {
    let mut positions = Array2::<f64>::zeros((3, distances.len()));
    for (i, s) in distances.iter().enumerate() {
        positions[[0, i]] = *s;
    }
    Catalog::new(positions, None).unwrap()
}
