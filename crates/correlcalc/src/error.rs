// A single opaque public `Error` wraps a private `ErrorKind`. Errors from
// `correlcalc_internal` are `&'static str`s and get wrapped here.
//
// Configuration problems (an unknown geometry name, etc.) never produce an
// `Error`. Those are reported with `log::warn!` and replaced by a default
// (see `crate::config`).

use crate::catalog::CatalogRole;

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// The underlying internal error type
#[non_exhaustive]
#[derive(Clone, Debug, thiserror::Error)]
enum ErrorKind {
    /// An error that occurs when problematic distance bin edges are specified
    #[error("problem with {who}: {what}")]
    BinEdge { who: &'static str, what: &'static str },
    /// An error that occurs when a catalog can't be used
    #[error("problem with the {role} catalog: {what}")]
    Catalog { role: CatalogRole, what: String },
    /// An error that occurs when there is no random catalog and no way to
    /// generate one
    #[error(
        "no random catalog was provided. Either supply one or supply a generator \
         (e.g. one backed by a survey mask)"
    )]
    MissingRandomCatalog,
    /// An error that occurs when a random-catalog generator fails
    #[error("random catalog generation failed: {0}")]
    RandomGeneration(String),
    /// The caller cancelled the calculation
    #[error("the calculation was cancelled")]
    Cancelled,
    /// A worker of the parallel dispatcher failed. The results of all other
    /// workers were discarded.
    #[error("worker {worker} (query points {start}..{end}) failed: {what}")]
    WorkerFailure {
        worker: usize,
        start: usize,
        end: usize,
        what: String,
    },
    /// The worker pool couldn't be created
    #[error("unable to create a pool of {n_workers} worker threads: {what}")]
    ThreadPool { n_workers: usize, what: String },
    /// wraps the stringly errors from `correlcalc_internal`
    #[error("{0}")]
    InternalLegacyAdHoc(&'static str),
}

// define constructor methods for Error
impl Error {
    /// produce an error indicating that problematic bin edges were specified
    pub(crate) fn bin_edge(who: &'static str, what: &'static str) -> Self {
        Error {
            kind: ErrorKind::BinEdge { who, what },
        }
    }

    /// produce an error indicating that a catalog can't be used
    pub(crate) fn catalog(role: CatalogRole, what: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::Catalog {
                role,
                what: what.into(),
            },
        }
    }

    pub(crate) fn missing_random_catalog() -> Self {
        Error {
            kind: ErrorKind::MissingRandomCatalog,
        }
    }

    /// Used by implementors of [`crate::RandomCatalogGenerator`] to report a
    /// failure
    pub fn random_generation(what: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::RandomGeneration(what.into()),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Error {
            kind: ErrorKind::Cancelled,
        }
    }

    pub(crate) fn worker_failure(
        worker: usize,
        start: usize,
        end: usize,
        what: impl Into<String>,
    ) -> Self {
        Error {
            kind: ErrorKind::WorkerFailure {
                worker,
                start,
                end,
                what: what.into(),
            },
        }
    }

    pub(crate) fn thread_pool(n_workers: usize, what: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::ThreadPool {
                n_workers,
                what: what.into(),
            },
        }
    }

    /// wraps a legacy internal error string
    pub(crate) fn internal_legacy_adhoc(message: &'static str) -> Self {
        Error {
            kind: ErrorKind::InternalLegacyAdHoc(message),
        }
    }

    /// Whether the calculation stopped because the caller cancelled it
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Whether the calculation lacked a random catalog
    pub fn is_missing_random_catalog(&self) -> bool {
        matches!(self.kind, ErrorKind::MissingRandomCatalog)
    }
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        self.kind.fmt(f)
    }
}
