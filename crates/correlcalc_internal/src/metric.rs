//! Squared separations between points of a redshift survey.
//!
//! Every point is a triple `[s, ra, dec]`: `s` is the comoving distance (in
//! units of c/H0) and the angles are in radians. The formulae come from
//! T. Matsubara, ApJ 615 (2004) 573.
//!
//! We always work with *squared* separations. Bin edges get squared once,
//! up front, so that we never need a `sqrt` per pair while binning. (The
//! spatial index does need true distances for pruning, see
//! [`Metric::distance`] and [`Metric::squared_distance_lower_bound`]).
//!
//! The geometry is picked once per calculation. Rather than passing a
//! callable around, [`Geometry`] is resolved into one of the [`Metric`]
//! implementors and everything downstream is generic over that type, so the
//! per-pair call is statically dispatched.

/// Curvature parameter `K` (in units of (H0/c)^2) used by [`Geometry::Open`].
///
/// # Note
/// This corresponds to an empty (Milne-like) universe. It is deliberately a
/// constant rather than a runtime parameter; change it here and rebuild if
/// you need a different open model.
pub const OPEN_CURVATURE: f64 = -1.0;

/// Curvature parameter `K` (in units of (H0/c)^2) used by [`Geometry::Close`].
pub const CLOSED_CURVATURE: f64 = 1.0;

/// The large-scale geometry of the universe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Geometry {
    #[default]
    Flat,
    Open,
    Close,
}

impl Geometry {
    /// The curvature parameter `K` associated with the geometry
    pub fn curvature(&self) -> f64 {
        match self {
            Geometry::Flat => 0.0,
            Geometry::Open => OPEN_CURVATURE,
            Geometry::Close => CLOSED_CURVATURE,
        }
    }

    /// Squared separation under this geometry.
    ///
    /// This is a convenience for one-off evaluations. Hot loops should go
    /// through [`FlatMetric`] or [`CurvedMetric`] instead.
    pub fn squared_distance(&self, a: &[f64; 3], b: &[f64; 3]) -> f64 {
        match self {
            Geometry::Flat => FlatMetric.squared_distance(a, b),
            Geometry::Open | Geometry::Close => CurvedMetric::new(self.curvature())
                .squared_distance(a, b),
        }
    }
}

impl Geometry {
    pub fn name(&self) -> &'static str {
        match self {
            Geometry::Flat => "flat",
            Geometry::Open => "open",
            Geometry::Close => "close",
        }
    }
}

impl core::str::FromStr for Geometry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(Geometry::Flat),
            "open" => Ok(Geometry::Open),
            "close" => Ok(Geometry::Close),
            _ => Err(format!("{s} is not a geometry. Choices include: flat, open, close")),
        }
    }
}

/// A distance function over `[s, ra, dec]` points.
///
/// Implementors must return a non-negative squared separation that is
/// symmetric in its arguments and zero for identical points.
pub trait Metric: Copy + Send + Sync {
    /// Whether [`Metric::distance`] obeys the triangle inequality. Only then
    /// may a ball tree prune (or fully accept) a node from its metric radius.
    const TRIANGLE_INEQUALITY: bool;

    fn squared_distance(&self, a: &[f64; 3], b: &[f64; 3]) -> f64;

    /// The curvature parameter `K` of the underlying space
    fn curvature(&self) -> f64;

    /// The (unsquared) separation, used by the ball tree for pruning.
    #[inline]
    fn distance(&self, a: &[f64; 3], b: &[f64; 3]) -> f64 {
        self.squared_distance(a, b).sqrt()
    }

    /// Whether `point` lies in the region where the metric is defined
    #[inline]
    fn admits(&self, point: &[f64; 3]) -> bool {
        self.curvature() <= 0.0 || self.curvature() * point[0] * point[0] < 1.0
    }

    /// A lower bound on the squared separation between a point at comoving
    /// distance `s` and any point with a comoving distance in `s_min..=s_max`
    /// whose line of sight has a versine separation of at least `min_versine`
    /// from the first one.
    #[inline]
    fn squared_distance_lower_bound(
        &self,
        s: f64,
        s_min: f64,
        s_max: f64,
        min_versine: f64,
    ) -> f64 {
        squared_distance_lower_bound(self.curvature(), s, s_min, s_max, min_versine)
    }
}

#[inline(always)]
fn radial_factor(k: f64, x: f64) -> f64 {
    // for K > 0, points beyond 1/sqrt(K) have no meaning. We clamp rather
    // than produce NaN (see Metric::admits)
    (1.0 - k * x * x).max(0.0).sqrt()
}

/// `x1 sqrt(1 - K x2^2) - x2 sqrt(1 - K x1^2)`, the radial part of a squared
/// separation. It is strictly decreasing in `x2` and vanishes at `x2 == x1`.
#[inline(always)]
fn radial_offset(k: f64, x1: f64, x2: f64) -> f64 {
    x1 * radial_factor(k, x2) - x2 * radial_factor(k, x1)
}

/// `x min(1, sqrt(1 - K x^2))`. Over an interval, it is smallest at one of
/// the endpoints.
#[inline(always)]
fn transverse_factor(k: f64, x: f64) -> f64 {
    x * radial_factor(k, x).min(1.0)
}

/// Lower bound of the Matsubara squared separation for curvature `k` (see
/// [`Metric::squared_distance_lower_bound`]).
///
/// With `h = 1 - cos(alpha)` the squared separation is
/// `radial^2 + h T`, and for every `K` (and `h` in `[0, 2]`)
/// `h T >= 2 h x1 x2 min(1, r1) min(1, r2)`. Both terms are then minimized
/// separately over the interval.
fn squared_distance_lower_bound(
    k: f64,
    s: f64,
    s_min: f64,
    s_max: f64,
    min_versine: f64,
) -> f64 {
    let radial = if s < s_min {
        radial_offset(k, s, s_min)
    } else if s > s_max {
        radial_offset(k, s, s_max)
    } else {
        0.0
    };
    let nearest_transverse = transverse_factor(k, s_min).min(transverse_factor(k, s_max));
    let transverse = 2.0 * transverse_factor(k, s) * nearest_transverse;
    radial * radial + min_versine.max(0.0) * transverse.max(0.0)
}

/// `1 - cos(alpha)`, where `alpha` is the angle between two lines of sight.
///
/// We use the haversine form rather than `1 - cos(alpha)` directly: it is
/// exactly zero for identical directions and it doesn't lose precision to
/// cancellation when the angle is small (which is the only regime we care
/// about).
#[inline(always)]
pub fn versine_angular_separation(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let [_, ra_a, dec_a] = *a;
    let [_, ra_b, dec_b] = *b;
    let sin_half_ddec = (0.5 * (dec_a - dec_b)).sin();
    let sin_half_dra = (0.5 * (ra_a - ra_b)).sin();
    let haversine =
        sin_half_ddec * sin_half_ddec + (dec_a.cos() * dec_b.cos()) * sin_half_dra * sin_half_dra;
    (2.0 * haversine).clamp(0.0, 2.0)
}

/// Euclidean (flat-space) separation: `s1^2 + s2^2 - 2 s1 s2 cos(alpha)`
///
/// (evaluated as `(s1 - s2)^2 + 2 s1 s2 (1 - cos(alpha))`)
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatMetric;

impl Metric for FlatMetric {
    const TRIANGLE_INEQUALITY: bool = true;

    #[inline]
    fn curvature(&self) -> f64 {
        0.0
    }

    #[inline]
    fn squared_distance(&self, a: &[f64; 3], b: &[f64; 3]) -> f64 {
        let (s_a, s_b) = (a[0], b[0]);
        let h = versine_angular_separation(a, b);
        let ds = s_a - s_b;
        (ds * ds + 2.0 * (s_a * s_b) * h).max(0.0)
    }
}

/// Separation in a space of constant curvature `K`.
///
/// With `x = s` (the transverse comoving coordinate) and `c = cos(alpha)`:
///
/// ```text
/// d^2 = x1^2 + x2^2 - K x1^2 x2^2 (1 + c^2)
///       - 2 x1 x2 sqrt(1 - K x1^2) sqrt(1 - K x2^2) c
/// ```
///
/// This reduces to [`FlatMetric`] when `K == 0`. Writing `r = sqrt(1 - K x^2)`
/// and `h = 1 - c`, we evaluate the algebraically identical
///
/// ```text
/// d^2 = (x1 r2 - x2 r1)^2 + h (2 x1 x2 r1 r2 + K x1^2 x2^2 (2 - h))
/// ```
///
/// which vanishes exactly for coincident points.
#[derive(Clone, Copy, Debug)]
pub struct CurvedMetric {
    curvature: f64,
}

impl CurvedMetric {
    pub fn new(curvature: f64) -> Self {
        CurvedMetric { curvature }
    }
}

impl Metric for CurvedMetric {
    // the formula isn't a distance in the strict sense. Nodes get pruned
    // with Metric::squared_distance_lower_bound instead
    const TRIANGLE_INEQUALITY: bool = false;

    #[inline]
    fn curvature(&self) -> f64 {
        self.curvature
    }

    #[inline]
    fn squared_distance(&self, a: &[f64; 3], b: &[f64; 3]) -> f64 {
        let k = self.curvature;
        let (x_a, x_b) = (a[0], b[0]);
        let (xa2, xb2) = (x_a * x_a, x_b * x_b);
        let r_a = radial_factor(k, x_a);
        let r_b = radial_factor(k, x_b);
        let h = versine_angular_separation(a, b);
        let radial = x_a * r_b - x_b * r_a;
        let transverse = 2.0 * (x_a * x_b) * (r_a * r_b) + k * (xa2 * xb2) * (2.0 - h);
        (radial * radial + h * transverse).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isclose(actual: f64, ref_val: f64, rtol: f64, atol: f64) -> bool {
        (actual - ref_val).abs() <= (atol + rtol * ref_val.abs())
    }

    #[test]
    fn flat_radial_separation() {
        // identical lines of sight reduce to |s1 - s2|
        let a = [0.01, 0.0, 0.0];
        let b = [0.04, 0.0, 0.0];
        assert!(isclose(FlatMetric.squared_distance(&a, &b), 9e-4, 1e-12, 1e-18));
    }

    #[test]
    fn flat_matches_cartesian() {
        let to_xyz = |p: &[f64; 3]| {
            [
                p[0] * p[2].cos() * p[1].cos(),
                p[0] * p[2].cos() * p[1].sin(),
                p[0] * p[2].sin(),
            ]
        };
        let a = [0.3, 1.2, -0.4];
        let b = [0.5, 2.9, 0.7];
        let (xa, xb) = (to_xyz(&a), to_xyz(&b));
        let expected: f64 = (0..3).map(|k| (xa[k] - xb[k]).powi(2)).sum();
        assert!(isclose(FlatMetric.squared_distance(&a, &b), expected, 1e-12, 0.0));
    }

    #[test]
    fn curved_matches_matsubara_form() {
        let (a, b) = ([0.3, 1.2, -0.4], [0.5, 2.9, 0.7]);
        let k = -0.7;
        let c = 1.0 - versine_angular_separation(&a, &b);
        let (x1, x2) = (a[0], b[0]);
        let expected = x1 * x1 + x2 * x2 - k * x1 * x1 * x2 * x2 * (1.0 + c * c)
            - 2.0 * x1 * x2 * (1.0 - k * x1 * x1).sqrt() * (1.0 - k * x2 * x2).sqrt() * c;
        let actual = CurvedMetric::new(k).squared_distance(&a, &b);
        assert!(isclose(actual, expected, 1e-12, 0.0));
    }

    #[test]
    fn curved_reduces_to_flat() {
        let a = [0.3, 1.2, -0.4];
        let b = [0.5, 2.9, 0.7];
        let flat = FlatMetric.squared_distance(&a, &b);
        let curved = CurvedMetric::new(0.0).squared_distance(&a, &b);
        assert!(isclose(curved, flat, 1e-12, 0.0));
    }

    #[test]
    fn curvature_sign() {
        // two points at the same distance, separated in angle. Positive
        // curvature brings them closer together.
        let a = [0.5, 0.0, 0.0];
        let b = [0.5, 0.3, 0.0];
        let flat = Geometry::Flat.squared_distance(&a, &b);
        let open = Geometry::Open.squared_distance(&a, &b);
        let close = Geometry::Close.squared_distance(&a, &b);
        assert!(close < flat);
        assert!(open > flat);
    }

    #[test]
    fn lower_bound_never_exceeds_separation() {
        let mut state: u64 = 0x9E3779B97F4A7C15;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        for k in [OPEN_CURVATURE, 0.0, CLOSED_CURVATURE] {
            for _ in 0..2000 {
                // comoving distances stay below 1/sqrt(K) for the closed case
                let a = [0.99 * next(), 6.2 * next(), 3.0 * next() - 1.5];
                let b = [0.99 * next(), 6.2 * next(), 3.0 * next() - 1.5];
                let metric = CurvedMetric::new(k);
                assert!(metric.admits(&a) && metric.admits(&b));
                let actual = metric.squared_distance(&a, &b);
                let h = versine_angular_separation(&a, &b);

                // the tightest interval that holds b
                let bound = metric.squared_distance_lower_bound(a[0], b[0], b[0], h);
                assert!(bound <= actual * (1.0 + 1e-12) + 1e-15, "K = {k}: {a:?} {b:?}");

                // a wider interval, and a smaller angle
                let (lo, hi) = (b[0] * next(), b[0] + (1.0 - b[0]) * next());
                let bound = metric.squared_distance_lower_bound(a[0], lo, hi, h * next());
                assert!(bound <= actual * (1.0 + 1e-12) + 1e-15, "K = {k}: {a:?} {b:?}");
            }
        }
    }

    #[test]
    fn closed_geometry_has_a_horizon() {
        let metric = CurvedMetric::new(CLOSED_CURVATURE);
        assert!(metric.admits(&[0.99, 0.0, 0.0]));
        assert!(!metric.admits(&[1.0, 0.0, 0.0]));
        assert!(CurvedMetric::new(OPEN_CURVATURE).admits(&[3.0, 0.0, 0.0]));
        assert!(FlatMetric.admits(&[3.0, 0.0, 0.0]));
    }

    #[test]
    fn geometry_names() {
        for geometry in [Geometry::Flat, Geometry::Open, Geometry::Close] {
            assert_eq!(geometry.name().parse::<Geometry>(), Ok(geometry));
        }
        assert_eq!("CLOSE".parse::<Geometry>(), Ok(Geometry::Close));
        assert!("closed".parse::<Geometry>().is_err());
    }

    #[test]
    fn self_distance_and_symmetry() {
        let a = [0.2, 0.1, 0.05];
        let b = [0.25, 0.12, 0.02];
        for geometry in [Geometry::Flat, Geometry::Open, Geometry::Close] {
            assert_eq!(geometry.squared_distance(&a, &a), 0.0);
            assert!(isclose(
                geometry.squared_distance(&a, &b),
                geometry.squared_distance(&b, &a),
                1e-14,
                0.0
            ));
        }
    }
}
