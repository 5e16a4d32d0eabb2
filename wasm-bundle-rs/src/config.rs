use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::budget::BudgetConfig;
use crate::error::{PackageError, PackageResult};

pub const DEFAULT_PACKAGE_NAME: &str = "twsearch";
pub const DEFAULT_WASM_ARTIFACT: &str = ".temp/rust-wasm/twsearch_wasm_bg.wasm";
pub const DEFAULT_ENTRY_POINT: &str = "src/wasm-package/index.ts";
pub const DEFAULT_DIST_DIR: &str = "dist/wasm";

/// How a file with a given extension becomes a JavaScript module.
///
/// Names follow esbuild's loader vocabulary so a loader map can be handed to
/// either bundler backend unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    Js,
    Ts,
    Json,
    Text,
    Base64,
    /// Embeds the raw bytes; the module's default export is a `Uint8Array`.
    Binary,
}

impl LoaderKind {
    pub fn name(self) -> &'static str {
        match self {
            LoaderKind::Js => "js",
            LoaderKind::Ts => "ts",
            LoaderKind::Json => "json",
            LoaderKind::Text => "text",
            LoaderKind::Base64 => "base64",
            LoaderKind::Binary => "binary",
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LoaderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "js" => LoaderKind::Js,
            "ts" => LoaderKind::Ts,
            "json" => LoaderKind::Json,
            "text" => LoaderKind::Text,
            "base64" => LoaderKind::Base64,
            "binary" => LoaderKind::Binary,
            _ => bail!("Unsupported loader {}", s),
        })
    }
}

/// Parses a `.ext=kind` loader rule, as accepted on the command line.
pub fn parse_loader_rule(rule: &str) -> Result<(String, LoaderKind), anyhow::Error> {
    let (extension, kind) = rule
        .split_once('=')
        .with_context(|| format!("Loader rule {:?} is not of the form .ext=loader", rule))?;
    Ok((normalize_extension(extension)?, kind.trim().parse()?))
}

/// Extensions are stored with their leading dot, e.g. `.wasm`.
pub fn normalize_extension(extension: &str) -> Result<String, anyhow::Error> {
    let extension = extension.trim();
    let bare = extension.strip_prefix('.').unwrap_or(extension);
    if bare.is_empty() || bare.contains(|c: char| matches!(c, '.' | '/' | '\\')) {
        bail!("Invalid file extension {:?}", extension);
    }
    Ok(format!(".{}", bare))
}

/// The rule in `loaders` matching `path`'s extension.
pub fn lookup_loader(loaders: &BTreeMap<String, LoaderKind>, path: &Path) -> Option<LoaderKind> {
    let extension = path.extension()?.to_str()?;
    loaders.get(&format!(".{}", extension)).copied()
}

/// The default loader map: embed `.wasm` files as binary.
pub fn default_loaders() -> BTreeMap<String, LoaderKind> {
    BTreeMap::from([(".wasm".to_string(), LoaderKind::Binary)])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Esm,
    Iife,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "esm" => OutputFormat::Esm,
            "iife" => OutputFormat::Iife,
            _ => bail!("Unsupported output format {}", s),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    #[default]
    None,
    Inline,
    Separate,
}

impl FromStr for SourceMapMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "none" => SourceMapMode::None,
            "inline" => SourceMapMode::Inline,
            "separate" => SourceMapMode::Separate,
            _ => bail!("Unsupported source map mode {}", s),
        })
    }
}

/// Text prepended to generated output files.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Banner {
    pub js: Option<String>,
}

impl Banner {
    /// ``// Generated from `<package>` <version>``
    ///
    /// Line terminators in either value are replaced with spaces so the
    /// banner stays a single line comment.
    pub fn generated_from(package_name: &str, version: &str) -> Self {
        Self {
            js: Some(format!(
                "// Generated from `{}` {}",
                single_line(package_name),
                single_line(version)
            )),
        }
    }
}

/// Characters that end a JavaScript line comment.
fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn single_line(text: &str) -> String {
    text.replace(is_line_terminator, " ")
}

/// Everything a bundler needs for one run. Built once and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleConfig {
    pub entry_point: PathBuf,
    pub loaders: BTreeMap<String, LoaderKind>,
    pub outdir: PathBuf,
    pub banner: Banner,
    pub format: OutputFormat,
    pub minify: bool,
    pub source_map: SourceMapMode,
}

impl BundleConfig {
    /// The loader configured for `path`'s extension, if any.
    pub fn loader_for(&self, path: &Path) -> Option<LoaderKind> {
        lookup_loader(&self.loaders, path)
    }
}

/// Project-level packaging configuration.
///
/// Defaults reproduce the `twsearch` WASM package layout. Relative paths are
/// resolved against the project root passed to [`PackageConfig::resolve`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    pub package_name: String,
    pub wasm_artifact: PathBuf,
    pub entry_point: PathBuf,
    pub dist_dir: PathBuf,
    pub loaders: BTreeMap<String, LoaderKind>,
    pub format: OutputFormat,
    pub minify: bool,
    pub source_map: SourceMapMode,
    pub budget: BudgetConfig,
    /// Project root recorded by [`PackageConfig::resolve`].
    #[serde(skip)]
    pub root: Option<PathBuf>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            package_name: DEFAULT_PACKAGE_NAME.to_string(),
            wasm_artifact: PathBuf::from(DEFAULT_WASM_ARTIFACT),
            entry_point: PathBuf::from(DEFAULT_ENTRY_POINT),
            dist_dir: PathBuf::from(DEFAULT_DIST_DIR),
            loaders: default_loaders(),
            format: OutputFormat::default(),
            minify: false,
            source_map: SourceMapMode::default(),
            budget: BudgetConfig::default(),
            root: None,
        }
    }
}

impl PackageConfig {
    pub fn from_json_str(json: &str) -> Result<Self, anyhow::Error> {
        let mut config: PackageConfig =
            serde_json::from_str(json).context("Invalid package configuration")?;
        config.loaders = config
            .loaders
            .into_iter()
            .map(|(extension, kind)| Ok((normalize_extension(&extension)?, kind)))
            .collect::<Result<_, anyhow::Error>>()?;
        config.budget.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("In {}", path.display()))
    }

    /// Anchor every relative path at `root`.
    pub fn resolve(mut self, root: &Path) -> Self {
        let anchor = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                root.join(path)
            }
        };
        self.wasm_artifact = anchor(self.wasm_artifact);
        self.entry_point = anchor(self.entry_point);
        self.dist_dir = anchor(self.dist_dir);
        self.root = Some(root.to_path_buf());
        self
    }

    /// Checks that resetting `dist_dir` cannot delete the project root or
    /// any input, and that the budget is usable.
    pub fn validate(&self) -> PackageResult<()> {
        self.budget.validate()?;

        let normalize = |path: &Path| {
            lexical(&std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()))
        };
        let dist_dir = normalize(&self.dist_dir);
        let protected = self
            .root
            .iter()
            .chain([&self.wasm_artifact, &self.entry_point]);
        for path in protected {
            if normalize(path).starts_with(&dist_dir) {
                return Err(PackageError::DistDirOverlap {
                    dist_dir: self.dist_dir.clone(),
                    protected: path.clone(),
                });
            }
        }
        Ok(())
    }

    /// The bundler configuration for this package at `version`.
    pub fn bundle_config(&self, version: &str) -> BundleConfig {
        BundleConfig {
            entry_point: self.entry_point.clone(),
            loaders: self.loaders.clone(),
            outdir: self.dist_dir.clone(),
            banner: Banner::generated_from(&self.package_name, version),
            format: self.format,
            minify: self.minify,
            source_map: self.source_map,
        }
    }
}

/// `path` with `.` dropped and `..` applied, without touching the filesystem.
fn lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other),
        }
    }
    normalized
}
