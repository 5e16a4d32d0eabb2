//! Bundler backends.
//!
//! A bundler receives one [`BundleConfig`] and writes the bundle into its
//! output directory. Two backends are provided:
//!
//! - [`SwcBundler`]: in-process, built on deno_graph and deno_ast's SWC
//!   bundler. Produces a single `<entry>.js` file.
//! - [`EsbuildBundler`]: runs an `esbuild` executable.
//!
//! # Architecture
//!
//! - `loader`: Implements `deno_graph::source::Loader` over local files and
//!   applies the loader rules
//! - `bundle_hook`: Handles `import.meta` during bundling
//! - `emit`: Core bundling logic using the SWC bundler
//! - `text`: Source text helpers (BOM, JSON, text/base64/binary modules)
//! - `esbuild`: External esbuild process

mod bundle_hook;
mod emit;
mod esbuild;
mod loader;
mod text;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use deno_graph::ModuleSpecifier;

use crate::config::{BundleConfig, SourceMapMode};
pub use emit::{BundleEmit, EmitOptions};
pub use esbuild::{esbuild_args, EsbuildBundler};
pub use loader::FsGraphLoader;

/// Performs the bundling described by a [`BundleConfig`].
#[allow(async_fn_in_trait)]
pub trait Bundler {
    async fn bundle(&self, config: &BundleConfig) -> Result<BundleOutput, anyhow::Error>;
}

/// A file written by a bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Files present in the output directory after bundling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOutput {
    pub files: Vec<EmittedFile>,
}

impl BundleOutput {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }
}

/// Lists the files directly inside `outdir`, sorted by path.
pub(crate) async fn collect_output(outdir: &Path) -> Result<BundleOutput, anyhow::Error> {
    let mut entries = tokio::fs::read_dir(outdir)
        .await
        .with_context(|| format!("Unable to list {}", outdir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if metadata.is_file() {
            files.push(EmittedFile {
                path: entry.path(),
                size: metadata.len(),
            });
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(BundleOutput { files })
}

/// In-process bundler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwcBundler;

impl SwcBundler {
    /// `<outdir>/<entry stem>.js`
    pub fn output_path(config: &BundleConfig) -> Result<PathBuf, anyhow::Error> {
        let Some(stem) = config.entry_point.file_stem() else {
            bail!("Entry point {} has no file name", config.entry_point.display());
        };
        let mut file_name = stem.to_os_string();
        file_name.push(".js");
        Ok(config.outdir.join(file_name))
    }
}

impl Bundler for SwcBundler {
    async fn bundle(&self, config: &BundleConfig) -> Result<BundleOutput, anyhow::Error> {
        if config.source_map != SourceMapMode::None {
            bail!("Source maps are only supported by the esbuild backend");
        }
        let entry_point = std::path::absolute(&config.entry_point).with_context(|| {
            format!("Invalid entry point {}", config.entry_point.display())
        })?;
        let entry = ModuleSpecifier::from_file_path(&entry_point).map_err(|_| {
            anyhow::anyhow!("Entry point {} is not a file path", entry_point.display())
        })?;
        let output_path = Self::output_path(config)?;

        let loader = FsGraphLoader::new(config.loaders.clone());
        let emitted = emit::bundle(
            entry,
            &loader,
            EmitOptions {
                format: config.format,
                minify: config.minify,
            },
        )
        .await
        .with_context(|| format!("Unable to bundle {}", entry_point.display()))?;

        let mut code = String::with_capacity(emitted.code.len() + 128);
        if let Some(banner) = &config.banner.js {
            code.push_str(banner);
            code.push('\n');
        }
        code.push_str(&emitted.code);

        tokio::fs::write(&output_path, code)
            .await
            .with_context(|| format!("Unable to write {}", output_path.display()))?;

        collect_output(&config.outdir).await
    }
}

/// Bundler selectable from configuration.
#[derive(Debug, Clone)]
pub enum BundlerBackend {
    Swc(SwcBundler),
    Esbuild(EsbuildBundler),
}

impl Bundler for BundlerBackend {
    async fn bundle(&self, config: &BundleConfig) -> Result<BundleOutput, anyhow::Error> {
        match self {
            BundlerBackend::Swc(swc) => swc.bundle(config).await,
            BundlerBackend::Esbuild(esbuild) => esbuild.bundle(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PackageConfig;
    use std::fs;

    #[test]
    fn test_output_path_uses_entry_stem() {
        let config = PackageConfig::default()
            .resolve(Path::new("/work/twsearch"))
            .bundle_config("v1");
        assert_eq!(
            SwcBundler::output_path(&config).unwrap(),
            PathBuf::from("/work/twsearch/dist/wasm/index.js")
        );
    }

    #[tokio::test]
    async fn test_collect_output_lists_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.js"), "12345").unwrap();
        fs::write(dir.path().join("a.js"), "1").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let output = collect_output(dir.path()).await.unwrap();
        assert_eq!(
            output.files,
            vec![
                EmittedFile {
                    path: dir.path().join("a.js"),
                    size: 1
                },
                EmittedFile {
                    path: dir.path().join("b.js"),
                    size: 5
                },
            ]
        );
        assert_eq!(output.total_size(), 6);
    }

    #[tokio::test]
    async fn test_swc_rejects_source_maps() {
        let config = crate::config::BundleConfig {
            source_map: SourceMapMode::Inline,
            ..PackageConfig::default().bundle_config("v1")
        };
        let err = SwcBundler.bundle(&config).await.unwrap_err();
        assert!(err.to_string().contains("esbuild"), "{err:#}");
    }
}
