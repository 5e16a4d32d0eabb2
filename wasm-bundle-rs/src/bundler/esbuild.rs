//! Bundling by running an `esbuild` executable.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tokio::process::Command;

use super::{collect_output, BundleOutput, Bundler};
use crate::config::{BundleConfig, OutputFormat, SourceMapMode};

/// Language target of the es2022 library preset.
const TARGET: &str = "es2022";

/// Runs `esbuild` with the es2022 library preset and the given configuration.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    pub esbuild_path: PathBuf,
}

impl Default for EsbuildBundler {
    fn default() -> Self {
        Self {
            esbuild_path: PathBuf::from("esbuild"),
        }
    }
}

impl EsbuildBundler {
    pub fn new(esbuild_path: impl Into<PathBuf>) -> Self {
        Self {
            esbuild_path: esbuild_path.into(),
        }
    }
}

/// Command-line arguments equivalent to `config`.
pub fn esbuild_args(config: &BundleConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        config.entry_point.clone().into(),
        "--bundle".into(),
        format!("--target={}", TARGET).into(),
    ];
    match config.format {
        OutputFormat::Esm => {
            args.push("--format=esm".into());
            args.push("--splitting".into());
        }
        OutputFormat::Iife => args.push("--format=iife".into()),
    }
    for (extension, loader) in &config.loaders {
        args.push(format!("--loader:{}={}", extension, loader).into());
    }
    let mut outdir = OsString::from("--outdir=");
    outdir.push(&config.outdir);
    args.push(outdir);
    if let Some(banner) = &config.banner.js {
        args.push(format!("--banner:js={}", banner).into());
    }
    if config.minify {
        args.push("--minify".into());
    }
    match config.source_map {
        SourceMapMode::None => {}
        SourceMapMode::Inline => args.push("--sourcemap=inline".into()),
        SourceMapMode::Separate => args.push("--sourcemap".into()),
    }
    args.push("--log-level=warning".into());
    args
}

impl Bundler for EsbuildBundler {
    async fn bundle(&self, config: &BundleConfig) -> Result<BundleOutput, anyhow::Error> {
        let args = esbuild_args(config);
        log::debug!("Running {} {:?}", self.esbuild_path.display(), args);

        let output = Command::new(&self.esbuild_path)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.esbuild_path.display()))?;

        if !output.status.success() {
            bail!(
                "esbuild exited with {}:\n{}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        let warnings = String::from_utf8_lossy(&output.stderr);
        if !warnings.trim().is_empty() {
            log::warn!("esbuild: {}", warnings.trim_end());
        }

        collect_output(&config.outdir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Banner, PackageConfig};
    use std::path::Path;

    fn args_as_strings(config: &BundleConfig) -> Vec<String> {
        esbuild_args(config)
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_default_package_arguments() {
        let config = PackageConfig::default()
            .resolve(Path::new("/work/twsearch"))
            .bundle_config("v0.6.0");
        assert_eq!(
            args_as_strings(&config),
            vec![
                "/work/twsearch/src/wasm-package/index.ts",
                "--bundle",
                "--target=es2022",
                "--format=esm",
                "--splitting",
                "--loader:.wasm=binary",
                "--outdir=/work/twsearch/dist/wasm",
                "--banner:js=// Generated from `twsearch` v0.6.0",
                "--log-level=warning",
            ]
        );
    }

    #[test]
    fn test_optional_arguments() {
        let config = BundleConfig {
            banner: Banner::default(),
            format: OutputFormat::Iife,
            minify: true,
            source_map: SourceMapMode::Separate,
            ..PackageConfig::default().bundle_config("unused")
        };
        let args = args_as_strings(&config);
        assert!(args.contains(&"--format=iife".to_string()));
        assert!(!args.contains(&"--splitting".to_string()));
        assert!(args.contains(&"--minify".to_string()));
        assert!(args.contains(&"--sourcemap".to_string()));
        assert!(!args.iter().any(|arg| arg.starts_with("--banner")));
    }

    #[tokio::test]
    async fn test_missing_executable_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = EsbuildBundler::new(dir.path().join("no-esbuild"));
        let config = BundleConfig {
            outdir: dir.path().join("dist"),
            ..PackageConfig::default().bundle_config("v0")
        };
        let err = bundler.bundle(&config).await.unwrap_err();
        assert!(err.to_string().contains("Failed to run"), "{err:#}");
    }
}
