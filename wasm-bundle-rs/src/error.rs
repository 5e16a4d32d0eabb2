//! Error types for wasm-bundle-rs.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using PackageError.
pub type PackageResult<T> = Result<T, PackageError>;

/// Errors raised by the packaging pipeline itself.
///
/// Failures inside the version resolver or the bundler are collaborator
/// errors and are carried as [`anyhow::Error`] in the `Version` and `Bundle`
/// variants.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The WASM artifact is missing or its metadata could not be read.
    #[error("Unable to read WASM artifact {path:?}: {source}")]
    ArtifactUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact is not larger than the configured minimum.
    #[error(
        "WASM artifact is {size} bytes, which does not exceed the minimum of {minimum} bytes \
         (short by {shortfall} bytes). Make sure the file exists and has some contents."
    )]
    ArtifactTooSmall {
        size: u64,
        minimum: u64,
        shortfall: u64,
    },

    /// The estimated download time reached the configured ceiling.
    #[error(
        "WASM artifact would take {seconds:.3} seconds to download over 3G, which is not under \
         the maximum of {maximum} seconds (over by {excess:.3} seconds)"
    )]
    DownloadTooSlow {
        seconds: f64,
        maximum: f64,
        excess: f64,
    },

    /// A budget setting that cannot produce a meaningful estimate.
    #[error("Invalid budget: {0}")]
    InvalidBudget(String),

    /// Resetting the distribution directory would delete an input or the
    /// project root.
    #[error("Refusing to reset distribution directory {dist_dir:?}: it contains {protected:?}")]
    DistDirOverlap { dist_dir: PathBuf, protected: PathBuf },

    /// Removing or recreating the distribution directory failed.
    #[error("Unable to reset distribution directory {path:?}: {source}")]
    DistDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The version resolver failed.
    #[error("Unable to resolve version description: {0:#}")]
    Version(anyhow::Error),

    /// The bundler failed.
    #[error("Bundling failed: {0:#}")]
    Bundle(anyhow::Error),
}

impl PackageError {
    /// Whether this error is one of the two budget checks.
    pub fn is_budget_violation(&self) -> bool {
        matches!(
            self,
            PackageError::ArtifactTooSmall { .. } | PackageError::DownloadTooSlow { .. }
        )
    }
}
