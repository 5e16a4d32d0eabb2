use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use wasm_bundle_rs::config::{parse_loader_rule, LoaderKind, OutputFormat, SourceMapMode};
use wasm_bundle_rs::{
    package_wasm, BundlerBackend, EsbuildBundler, FixedVersion, GitDescribe, PackageConfig, Stage,
    SwcBundler, VersionSource,
};

/// wasm-bundle: Bundle a compiled WebAssembly package, refusing artifacts that are
/// missing or too slow to download over 3G
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Project root that relative paths are resolved against
    #[clap(long, default_value = ".")]
    pub root: PathBuf,

    /// JSON file with packaging configuration
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Package name shown in the output banner
    #[clap(long)]
    pub package_name: Option<String>,

    /// Path to the compiled WASM artifact
    #[clap(long)]
    pub wasm: Option<PathBuf>,

    /// Path to the entry module
    #[clap(short, long)]
    pub entry: Option<PathBuf>,

    /// Output directory (removed and recreated on every run)
    #[clap(short, long)]
    pub outdir: Option<PathBuf>,

    /// Loader rule of the form .ext=loader (js, ts, json, text, base64, binary). Repeatable
    #[clap(long = "loader", value_parser = parse_loader_rule)]
    pub loaders: Vec<(String, LoaderKind)>,

    /// Output format. One of esm, iife
    #[clap(long)]
    pub format: Option<OutputFormat>,

    /// Minify the output
    #[clap(long)]
    pub minify: bool,

    /// Source map mode. One of none, inline, separate (esbuild backend only)
    #[clap(long)]
    pub sourcemap: Option<SourceMapMode>,

    /// Minimum artifact size in KiB; the artifact must be strictly larger
    #[clap(long)]
    pub min_size_kib: Option<u64>,

    /// Maximum estimated download time over 3G, in seconds
    #[clap(long)]
    pub max_seconds: Option<f64>,

    /// Version description for the banner. Defaults to `git describe` in the root
    #[clap(long)]
    pub version_string: Option<String>,

    /// Bundler backend
    #[clap(long, value_enum, default_value_t = Backend::Swc)]
    pub bundler: Backend,

    /// esbuild executable (esbuild backend only; ignored with --bundler swc)
    #[clap(long, default_value = "esbuild")]
    pub esbuild_path: PathBuf,

    /// Only reset the output directory and check the budget
    #[clap(long)]
    pub check_only: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    Swc,
    Esbuild,
}

impl Args {
    fn package_config(&self) -> Result<PackageConfig, anyhow::Error> {
        let mut config = match &self.config {
            Some(path) => PackageConfig::from_file(path)?,
            None => PackageConfig::default(),
        };

        if let Some(package_name) = &self.package_name {
            config.package_name = package_name.clone();
        }
        if let Some(wasm) = &self.wasm {
            config.wasm_artifact = wasm.clone();
        }
        if let Some(entry) = &self.entry {
            config.entry_point = entry.clone();
        }
        if let Some(outdir) = &self.outdir {
            config.dist_dir = outdir.clone();
        }
        config.loaders.extend(self.loaders.iter().cloned());
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.minify {
            config.minify = true;
        }
        if let Some(source_map) = self.sourcemap {
            config.source_map = source_map;
        }
        if let Some(min_size_kib) = self.min_size_kib {
            config.budget.min_artifact_bytes = min_size_kib
                .checked_mul(wasm_bundle_rs::budget::KIB)
                .with_context(|| format!("--min-size-kib {} is too large", min_size_kib))?;
        }
        if let Some(max_seconds) = self.max_seconds {
            config.budget.max_download_seconds = max_seconds;
        }
        config.budget.validate()?;

        Ok(config.resolve(&self.root))
    }

    fn version_source(&self) -> VersionSource {
        match &self.version_string {
            Some(version) => VersionSource::Fixed(FixedVersion::new(version.clone())),
            None => VersionSource::Git(GitDescribe::new(&self.root)),
        }
    }

    fn bundler(&self) -> BundlerBackend {
        match self.bundler {
            Backend::Swc => BundlerBackend::Swc(SwcBundler),
            Backend::Esbuild => BundlerBackend::Esbuild(EsbuildBundler::new(&self.esbuild_path)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Args = Args::parse();

    let config = args.package_config()?;
    log::debug!("Packaging with {:?}", config);

    let stage = if args.check_only {
        Stage::CheckOnly
    } else {
        Stage::Bundle
    };

    let summary = package_wasm(
        &config,
        &args.version_source(),
        &args.bundler(),
        stage,
        &mut std::io::stdout(),
    )
    .await
    .with_context(|| format!("Failed to package `{}`", config.package_name))?;

    if let Some(output) = summary.output {
        log::info!(
            "Bundled {} file(s), {} bytes total",
            output.files.len(),
            output.total_size()
        );
    }
    Ok(())
}
