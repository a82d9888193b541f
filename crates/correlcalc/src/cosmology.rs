//! Comoving distances from redshifts.
//!
//! All distances are in units of the Hubble distance, c/H0.

use std::str::FromStr;

/// Matter density parameter used by [`CosmologyModel::Lcdm`]
pub const OMEGA_M: f64 = 0.307;
/// Dark energy density parameter used by [`CosmologyModel::Lcdm`]
pub const OMEGA_LAMBDA: f64 = 0.693;

/// tolerance of the adaptive quadrature
const QUAD_TOL: f64 = 1e-10;
const QUAD_MAX_DEPTH: u32 = 40;

/// The cosmological model used to map redshifts to comoving distances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CosmologyModel {
    /// Lambda CDM with [`OMEGA_M`] and [`OMEGA_LAMBDA`]
    #[default]
    Lcdm,
    /// The R_h = ct (linear coasting) model
    LinearCoasting,
}

impl CosmologyModel {
    pub fn name(&self) -> &'static str {
        match self {
            CosmologyModel::Lcdm => "lcdm",
            CosmologyModel::LinearCoasting => "lc",
        }
    }
}

impl FromStr for CosmologyModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lcdm" => Ok(CosmologyModel::Lcdm),
            "lc" => Ok(CosmologyModel::LinearCoasting),
            _ => Err(format!("{s} is not a cosmology. Choices include: lcdm, lc")),
        }
    }
}

/// 1/E(z), where E(z) = H(z)/H0 in LCDM (with curvature 1 - Om - Ol)
fn inverse_hubble_lcdm(z: f64) -> f64 {
    let zp1 = 1.0 + z;
    let omega_k = 1.0 - OMEGA_M - OMEGA_LAMBDA;
    1.0 / (OMEGA_M * zp1.powi(3) + omega_k * zp1.powi(2) + OMEGA_LAMBDA).sqrt()
}

/// Comoving distance to redshift `z`
pub fn comov(z: f64, model: CosmologyModel) -> f64 {
    match model {
        CosmologyModel::Lcdm => integrate(inverse_hubble_lcdm, 0.0, z),
        CosmologyModel::LinearCoasting => (1.0 + z).ln(),
    }
}

/// Vectorized form of [`comov`]
pub fn comov_array(redshifts: &[f64], model: CosmologyModel) -> Vec<f64> {
    redshifts.iter().map(|&z| comov(z, model)).collect()
}

/// adaptive Simpson quadrature of `f` over `[a, b]`
fn integrate(f: impl Fn(f64) -> f64, a: f64, b: f64) -> f64 {
    if a == b {
        return 0.0;
    }
    let (fa, fb) = (f(a), f(b));
    let m = 0.5 * (a + b);
    let fm = f(m);
    let whole = (b - a) / 6.0 * (fa + 4.0 * fm + fb);
    simpson_recursive(&f, a, b, fa, fm, fb, whole, QUAD_TOL, QUAD_MAX_DEPTH)
}

#[allow(clippy::too_many_arguments)]
fn simpson_recursive(
    f: &impl Fn(f64) -> f64,
    a: f64,
    b: f64,
    fa: f64,
    fm: f64,
    fb: f64,
    whole: f64,
    tol: f64,
    depth: u32,
) -> f64 {
    let m = 0.5 * (a + b);
    let (lm, rm) = (0.5 * (a + m), 0.5 * (m + b));
    let (flm, frm) = (f(lm), f(rm));
    let left = (m - a) / 6.0 * (fa + 4.0 * flm + fm);
    let right = (b - m) / 6.0 * (fm + 4.0 * frm + fb);
    let delta = left + right - whole;
    if depth == 0 || delta.abs() <= 15.0 * tol {
        left + right + delta / 15.0
    } else {
        simpson_recursive(f, a, m, fa, flm, fm, left, 0.5 * tol, depth - 1)
            + simpson_recursive(f, m, b, fm, frm, fb, right, 0.5 * tol, depth - 1)
    }
}
