//! Download-size budget for the compiled WASM artifact.
//!
//! The whole artifact has to arrive before the package can decode, instantiate
//! and initialise the module, so its size is checked against a simulated slow
//! mobile connection before anything is published. The throughput figure is
//! Lighthouse's "mobile 3G" profile:
//! <https://github.com/GoogleChrome/lighthouse/blob/b129c136bff66c6c74c17d92a61c8c245abca435/core/config/constants.js#L34>

use std::cmp::Ordering;
use std::fmt;

use serde::Deserialize;

use crate::error::{PackageError, PackageResult};

pub const KIB: u64 = 1024;
pub const BITS_PER_BYTE: u64 = 8;

/// Simulated connection throughput, in kilobits per second.
pub const MOBILE_3G_KILOBITS_PER_SECOND: u64 = 700;

/// 700 kbit/s expressed in bytes per second (89600).
pub const MOBILE_3G_BYTES_PER_SECOND: u64 = MOBILE_3G_KILOBITS_PER_SECOND * (KIB / BITS_PER_BYTE);

/// The artifact must be strictly larger than this to count as present.
pub const DEFAULT_MIN_ARTIFACT_BYTES: u64 = 32 * KIB;

/// The estimated 3G download must finish in strictly less than this.
pub const DEFAULT_MAX_DOWNLOAD_SECONDS: f64 = 7.0;

/// Estimated seconds to download `num_bytes` over the default 3G profile.
pub fn seconds_to_download_using_3g(num_bytes: u64) -> f64 {
    num_bytes as f64 / MOBILE_3G_BYTES_PER_SECOND as f64
}

/// Budget thresholds. Defaults match the values the package has always
/// shipped with; raising `max_download_seconds` is fine, but anything
/// approaching half a MiB is slow on intermittent mobile connections.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetConfig {
    pub min_artifact_bytes: u64,
    pub max_download_seconds: f64,
    pub connection_kilobits_per_second: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            min_artifact_bytes: DEFAULT_MIN_ARTIFACT_BYTES,
            max_download_seconds: DEFAULT_MAX_DOWNLOAD_SECONDS,
            connection_kilobits_per_second: MOBILE_3G_KILOBITS_PER_SECOND,
        }
    }
}

impl BudgetConfig {
    /// Rejects settings that would make the estimate infinite, NaN or
    /// overflow.
    pub fn validate(&self) -> PackageResult<()> {
        if self.connection_kilobits_per_second == 0 {
            return Err(PackageError::InvalidBudget(
                "connection_kilobits_per_second must be greater than 0".to_string(),
            ));
        }
        if self
            .connection_kilobits_per_second
            .checked_mul(KIB / BITS_PER_BYTE)
            .is_none()
        {
            return Err(PackageError::InvalidBudget(format!(
                "connection_kilobits_per_second {} is too large",
                self.connection_kilobits_per_second
            )));
        }
        if !(self.max_download_seconds.is_finite() && self.max_download_seconds > 0.0) {
            return Err(PackageError::InvalidBudget(format!(
                "max_download_seconds must be a positive number, got {}",
                self.max_download_seconds
            )));
        }
        Ok(())
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.connection_kilobits_per_second
            .saturating_mul(KIB / BITS_PER_BYTE)
    }

    pub fn seconds_to_download(&self, num_bytes: u64) -> f64 {
        num_bytes as f64 / self.bytes_per_second() as f64
    }

    /// Measure an artifact size against this budget without checking it.
    pub fn report(&self, artifact_bytes: u64) -> BudgetReport {
        BudgetReport {
            artifact_bytes,
            download_seconds: self.seconds_to_download(artifact_bytes),
        }
    }

    /// Run both checks, size first.
    pub fn check(&self, report: &BudgetReport) -> PackageResult<()> {
        if report.artifact_bytes <= self.min_artifact_bytes {
            return Err(PackageError::ArtifactTooSmall {
                size: report.artifact_bytes,
                minimum: self.min_artifact_bytes,
                shortfall: self.min_artifact_bytes - report.artifact_bytes + 1,
            });
        }
        // NaN never passes.
        if report.download_seconds.partial_cmp(&self.max_download_seconds) != Some(Ordering::Less) {
            return Err(PackageError::DownloadTooSlow {
                seconds: report.download_seconds,
                maximum: self.max_download_seconds,
                excess: report.download_seconds - self.max_download_seconds,
            });
        }
        Ok(())
    }
}

/// Artifact size and its estimated download time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetReport {
    pub artifact_bytes: u64,
    pub download_seconds: f64,
}

impl BudgetReport {
    /// Size in KiB, rounded to the nearest integer.
    pub fn rounded_kib(&self) -> u64 {
        (self.artifact_bytes as f64 / KIB as f64).round() as u64
    }

    /// Download time rounded to one decimal place.
    pub fn rounded_seconds(&self) -> f64 {
        (self.download_seconds * 10.0).round() / 10.0
    }
}

impl fmt::Display for BudgetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WASM size: {} KiB ({} seconds over 3G).",
            self.rounded_kib(),
            self.rounded_seconds()
        )
    }
}
