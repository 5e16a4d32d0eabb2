//! The packaging pipeline.
//!
//! Strictly linear: reset the output directory, measure the artifact, print
//! the size line, check the budget, resolve the version, then bundle and wait
//! for the bundler to finish. Any failure stops the run.

use std::io::Write;
use std::path::Path;

use crate::budget::BudgetReport;
use crate::bundler::{BundleOutput, Bundler};
use crate::config::PackageConfig;
use crate::dist_dir::reset_dist_dir;
use crate::error::{PackageError, PackageResult};
use crate::version::VersionResolver;

/// How far the pipeline should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Stop after the budget gate.
    CheckOnly,
    #[default]
    Bundle,
}

/// What a successful run produced.
#[derive(Debug)]
pub struct PackageSummary {
    pub report: BudgetReport,
    pub version: Option<String>,
    pub output: Option<BundleOutput>,
}

/// Size of the artifact at `path`, in bytes.
pub async fn artifact_size(path: &Path) -> PackageResult<u64> {
    let metadata =
        tokio::fs::metadata(path)
            .await
            .map_err(|source| PackageError::ArtifactUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
    if !metadata.is_file() {
        return Err(PackageError::ArtifactUnreadable {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        });
    }
    Ok(metadata.len())
}

/// Runs the pipeline for an already-resolved `config`.
///
/// The size line is written to `console` before the budget is checked so it
/// is visible when the check fails. Nothing is deleted when the configuration
/// fails [`PackageConfig::validate`].
pub async fn package_wasm<V, B>(
    config: &PackageConfig,
    version: &V,
    bundler: &B,
    stage: Stage,
    console: &mut dyn Write,
) -> PackageResult<PackageSummary>
where
    V: VersionResolver,
    B: Bundler,
{
    config.validate()?;
    reset_dist_dir(&config.dist_dir).await?;
    log::info!("Reset {}", config.dist_dir.display());

    let size = artifact_size(&config.wasm_artifact).await?;
    let report = config.budget.report(size);
    // Printing is best effort.
    if let Err(err) = writeln!(console, "{}", report) {
        log::warn!("Unable to print size report: {}", err);
    }
    config.budget.check(&report)?;

    if stage == Stage::CheckOnly {
        return Ok(PackageSummary {
            report,
            version: None,
            output: None,
        });
    }

    let version = version.resolve().await.map_err(PackageError::Version)?;
    log::info!("Packaging `{}` {}", config.package_name, version);

    let bundle_config = config.bundle_config(&version);
    let output = bundler
        .bundle(&bundle_config)
        .await
        .map_err(PackageError::Bundle)?;
    for file in &output.files {
        log::info!("Wrote {} ({} bytes)", file.path.display(), file.size);
    }

    Ok(PackageSummary {
        report,
        version: Some(version),
        output: Some(output),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_artifact_size_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = artifact_size(&dir.path().join("missing.wasm"))
            .await
            .unwrap_err();
        assert!(matches!(err, PackageError::ArtifactUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_artifact_size_of_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = artifact_size(dir.path()).await.unwrap_err();
        assert!(matches!(err, PackageError::ArtifactUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_artifact_size_reads_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine_bg.wasm");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        assert_eq!(artifact_size(&path).await.unwrap(), 4096);
    }
}
