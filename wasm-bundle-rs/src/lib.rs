// Allow uninlined format args for cleaner bail!/anyhow! macros
#![allow(clippy::uninlined_format_args)]
#![doc = include_str!("../README.md")]

pub mod budget;
pub mod bundler;
pub mod config;
pub mod dist_dir;
pub mod error;
pub mod package;
pub mod version;

pub use anyhow;
pub use budget::{seconds_to_download_using_3g, BudgetConfig, BudgetReport};
pub use bundler::{Bundler, BundlerBackend, BundleOutput, EsbuildBundler, SwcBundler};
pub use config::{BundleConfig, LoaderKind, PackageConfig};
pub use error::{PackageError, PackageResult};
pub use package::{package_wasm, PackageSummary, Stage};
pub use version::{FixedVersion, GitDescribe, VersionResolver, VersionSource};
