//! Catalogs of survey points and the collaborators that produce them.
//!
//! File ingestion isn't handled here. Callers read their files however they
//! like and hand us columns (see [`Catalog::from_sky_columns`] and
//! [`Catalog::from_named_columns`]) or a ready-made `(3, N)` array.

use crate::cosmology::{CosmologyModel, comov_array};
use crate::error::Error;
use correlcalc_internal::PointSet;
use ndarray::Array2;

/// Identifies which of the two catalogs of a calculation we are talking
/// about
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CatalogRole {
    Data,
    Random,
}

impl core::fmt::Display for CatalogRole {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            CatalogRole::Data => write!(f, "data"),
            CatalogRole::Random => write!(f, "random"),
        }
    }
}

/// An ordered collection of `[s, ra, dec]` points with optional weights.
///
/// `s` is the comoving distance (in units of c/H0) and the angles are in
/// radians. The positions are stored with shape `(3, n_points)`.
///
/// The weights are either absent or hold exactly one entry per point.
/// Weights of the wrong length are discarded (with a warning) when the
/// catalog is constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    positions: Array2<f64>,
    weights: Option<Vec<f64>>,
}

impl Catalog {
    /// Wrap an existing `(3, n_points)` array of `[s, ra, dec]` points.
    pub fn new(positions: Array2<f64>, weights: Option<Vec<f64>>) -> Result<Catalog, Error> {
        PointSet::new(positions.view(), None).map_err(Error::internal_legacy_adhoc)?;
        let n_points = positions.shape()[1];
        let weights = match weights {
            Some(w) if w.len() != n_points => {
                log::warn!(
                    "ignoring weights: got {} weights for {} points, the catalog is treated as \
                     unweighted",
                    w.len(),
                    n_points
                );
                None
            }
            Some(w) if w.iter().any(|x| !x.is_finite()) => {
                return Err(Error::internal_legacy_adhoc("weights must all be finite"));
            }
            other => other,
        };
        Ok(Catalog { positions, weights })
    }

    /// Build a catalog from redshifts and sky coordinates (in degrees).
    ///
    /// Redshifts are converted into comoving distances under `model`.
    pub fn from_sky_columns(
        z: &[f64],
        ra_deg: &[f64],
        dec_deg: &[f64],
        weights: Option<&[f64]>,
        model: CosmologyModel,
    ) -> Result<Catalog, Error> {
        if z.len() != ra_deg.len() || z.len() != dec_deg.len() {
            return Err(Error::internal_legacy_adhoc(
                "the z, ra and dec columns must have the same length",
            ));
        }
        let s = comov_array(z, model);
        let mut positions = Array2::<f64>::zeros((3, z.len()));
        for i in 0..z.len() {
            positions[[0, i]] = s[i];
            positions[[1, i]] = ra_deg[i].to_radians();
            positions[[2, i]] = dec_deg[i].to_radians();
        }
        Catalog::new(positions, weights.map(|w| w.to_vec()))
    }

    /// Build a catalog from a table of named columns.
    ///
    /// Column names are matched case-insensitively. `z`, `ra` and `dec`
    /// (in degrees) are required. Weights are taken from a `radial_weight`
    /// or `weight_systot` column; if both are present, the one that comes
    /// last wins. Other columns are ignored.
    pub fn from_named_columns(
        columns: &[(&str, &[f64])],
        model: CosmologyModel,
    ) -> Result<Catalog, Error> {
        let (mut z, mut ra, mut dec, mut weights) = (None, None, None, None);
        for (name, values) in columns {
            match name.to_lowercase().as_str() {
                "z" => z = Some(*values),
                "ra" => ra = Some(*values),
                "dec" => dec = Some(*values),
                "radial_weight" | "weight_systot" => weights = Some(*values),
                _ => (),
            }
        }
        match (z, ra, dec) {
            (Some(z), Some(ra), Some(dec)) => {
                Catalog::from_sky_columns(z, ra, dec, weights, model)
            }
            _ => Err(Error::internal_legacy_adhoc(
                "a catalog needs columns named Z, RA and DEC",
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.shape()[1]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn positions(&self) -> &Array2<f64> {
        &self.positions
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// A borrowed view for the kernels
    pub(crate) fn points(&self) -> Result<PointSet<'_>, Error> {
        PointSet::new(self.positions.view(), self.weights()).map_err(Error::internal_legacy_adhoc)
    }
}

/// Produces a random catalog that shares the data catalog's selection
/// function (e.g. by sampling a survey mask and the data's redshift
/// distribution).
///
/// Implementations are external collaborators. The only requirement is that
/// the returned catalog uses the same cosmology `model` for its comoving
/// distances as the data catalog.
pub trait RandomCatalogGenerator {
    fn generate(&self, size: usize, model: CosmologyModel) -> Result<Catalog, Error>;
}

/// Where the random catalog of a calculation comes from.
pub enum RandomSource<'a> {
    /// A random catalog prepared by the caller
    Catalog(&'a Catalog),
    /// Generate `rand_factor * n_data` random points
    Generator(&'a dyn RandomCatalogGenerator),
    /// No random catalog is available. Calculations fail with
    /// [`Error::is_missing_random_catalog`].
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_columns() {
        let z = [0.1, 0.2];
        let ra = [180.0, 90.0];
        let dec = [0.0, -45.0];
        let w = [1.5, 0.5];
        let catalog = Catalog::from_named_columns(
            &[("RA", &ra[..]), ("Dec", &dec[..]), ("Z", &z[..]), ("WEIGHT_SYSTOT", &w[..])],
            CosmologyModel::LinearCoasting,
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.weights(), Some(&w[..]));
        let positions = catalog.positions();
        assert!((positions[[0, 0]] - 1.1_f64.ln()).abs() < 1e-15);
        assert!((positions[[1, 0]] - std::f64::consts::PI).abs() < 1e-15);
        assert!((positions[[2, 1]] + std::f64::consts::FRAC_PI_4).abs() < 1e-15);

        let columns = [("z", &z[..]), ("ra", &ra[..])];
        let missing = Catalog::from_named_columns(&columns, Default::default());
        assert!(missing.is_err());
    }

    #[test]
    fn mismatched_weights_are_dropped() {
        let positions = Array2::<f64>::zeros((3, 4));
        let catalog = Catalog::new(positions.clone(), Some(vec![1.0; 3])).unwrap();
        assert_eq!(catalog.weights(), None);
        let catalog = Catalog::new(positions, Some(vec![1.0; 4])).unwrap();
        assert_eq!(catalog.weights().map(|w| w.len()), Some(4));
    }

    #[test]
    fn bad_positions() {
        assert!(Catalog::new(Array2::<f64>::zeros((2, 4)), None).is_err());
        let mut positions = Array2::<f64>::zeros((3, 4));
        positions[[1, 2]] = f64::NAN;
        assert!(Catalog::new(positions, None).is_err());
    }
}
