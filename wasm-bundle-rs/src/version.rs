//! Version description embedded in the bundle banner.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tokio::process::Command;

/// Produces the human-readable version string for the banner.
#[allow(async_fn_in_trait)]
pub trait VersionResolver {
    async fn resolve(&self) -> Result<String, anyhow::Error>;
}

/// A version string known up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedVersion(pub String);

impl FixedVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }
}

impl VersionResolver for FixedVersion {
    async fn resolve(&self) -> Result<String, anyhow::Error> {
        Ok(self.0.clone())
    }
}

/// Describes the checkout at `repo_dir` with `git describe`.
#[derive(Debug, Clone)]
pub struct GitDescribe {
    pub repo_dir: PathBuf,
    pub git_path: PathBuf,
}

impl GitDescribe {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            git_path: PathBuf::from("git"),
        }
    }
}

impl VersionResolver for GitDescribe {
    async fn resolve(&self) -> Result<String, anyhow::Error> {
        let output = Command::new(&self.git_path)
            .current_dir(&self.repo_dir)
            .args(["describe", "--tags", "--always", "--dirty"])
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.git_path.display()))?;

        if !output.status.success() {
            bail!(
                "git describe exited with {} in {}: {}",
                output.status,
                self.repo_dir.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let description = String::from_utf8(output.stdout)
            .context("git describe printed invalid UTF-8")?
            .trim()
            .to_string();
        if description.is_empty() {
            bail!("git describe printed an empty description");
        }
        Ok(description)
    }
}

/// Version source selectable from configuration.
#[derive(Debug, Clone)]
pub enum VersionSource {
    Fixed(FixedVersion),
    Git(GitDescribe),
}

impl VersionResolver for VersionSource {
    async fn resolve(&self) -> Result<String, anyhow::Error> {
        match self {
            VersionSource::Fixed(fixed) => fixed.resolve().await,
            VersionSource::Git(git) => git.resolve().await,
        }
    }
}
