//! Package manifest: which vendor `.deb` files to fetch and where they land.
//!
//! The host file name is always derived from the last path segment of the
//! URL, so the same name is used in the download dir and in the container.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Intel linux-npu-driver release used by the default manifest.
pub const NPU_DRIVER_RELEASE: &str = "v1.10.0";
/// Build tag shared by the three driver packages of `NPU_DRIVER_RELEASE`.
pub const NPU_DRIVER_BUILD: &str = "1.10.0.20241107-11729849322";
/// Level Zero loader release installed alongside the driver.
pub const LEVEL_ZERO_RELEASE: &str = "1.17.6";

/// One package to download and install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Direct HTTP/HTTPS URL of the `.deb`.
    pub url: String,
    /// Optional expected SHA-256 (lowercase hex). Checked after download.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl PackageSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sha256: None,
        }
    }

    /// File name taken from the last non-empty URL path segment.
    pub fn file_name(&self) -> Result<String> {
        let parsed =
            url::Url::parse(&self.url).with_context(|| format!("invalid URL: {}", self.url))?;
        let segment = parsed
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .last()
            .with_context(|| format!("URL has no file name: {}", self.url))?;
        if segment == "." || segment == ".." {
            anyhow::bail!("URL has no usable file name: {}", self.url);
        }
        Ok(segment.to_string())
    }

    /// Where the package is stored on the host.
    pub fn host_path(&self, download_dir: &Path) -> Result<PathBuf> {
        Ok(download_dir.join(self.file_name()?))
    }

    /// Where the package is copied inside the container.
    pub fn container_path(&self, container_tmp_dir: &str) -> Result<String> {
        Ok(format!(
            "{}/{}",
            container_tmp_dir.trim_end_matches('/'),
            self.file_name()?
        ))
    }
}

/// Default package list: NPU compiler, firmware, Level Zero NPU plugin, Level Zero loader.
pub fn default_packages() -> Vec<PackageSpec> {
    let base = format!(
        "https://github.com/intel/linux-npu-driver/releases/download/{}",
        NPU_DRIVER_RELEASE
    );
    let mut pkgs: Vec<PackageSpec> = ["intel-driver-compiler-npu", "intel-fw-npu", "intel-level-zero-npu"]
        .iter()
        .map(|name| {
            PackageSpec::new(format!(
                "{base}/{name}_{NPU_DRIVER_BUILD}_ubuntu22.04_amd64.deb"
            ))
        })
        .collect();
    pkgs.push(PackageSpec::new(format!(
        "https://github.com/oneapi-src/level-zero/releases/download/v{v}/level-zero_{v}+u22.04_amd64.deb",
        v = LEVEL_ZERO_RELEASE
    )));
    pkgs
}
