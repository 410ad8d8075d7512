//! Package downloads to the host.
//!
//! Each package is fetched with a single curl GET into `<name>.part` and
//! renamed into place once complete (and checksum-verified when a digest is
//! pinned). Files already present are reused. Transfers block, so the async
//! entry points hand them to `spawn_blocking` one package at a time.

use crate::checksum;
use crate::manifest::PackageSpec;
use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str;
use std::time::Duration;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Fetched from the network; number of bytes written.
    Fetched(u64),
    /// File was already in the download dir and kept.
    AlreadyPresent,
}

/// Result of placing one package in the download dir.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub file_name: String,
    pub path: PathBuf,
    pub status: DownloadStatus,
}

/// One GET of `url` into `dest` (truncated first). Returns bytes written.
fn fetch_once(url: &str, dest: &Path) -> Result<u64, FetchError> {
    let mut file = File::create(dest)?;
    let mut written: u64 = 0;
    let mut write_err: Option<std::io::Error> = None;
    let mut content_length: Option<u64> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(concat!("npu-setup/", env!("CARGO_PKG_VERSION")))?;
    easy.connect_timeout(Duration::from_secs(30))?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;

    let performed = {
        let mut transfer = easy.transfer();
        // Redirects produce one header block per hop; keep the last Content-Length.
        transfer.header_function(|data| {
            if let Ok(line) = str::from_utf8(data) {
                let line = line.trim();
                if line.starts_with("HTTP/") {
                    content_length = None;
                } else if let Some((name, value)) = line.split_once(':') {
                    if name.trim().eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().ok();
                    }
                }
            }
            true
        })?;
        transfer.write_function(|data| match file.write_all(data) {
            Ok(()) => {
                written += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                write_err = Some(e);
                Ok(0) // abort transfer
            }
        })?;
        transfer.perform()
    };

    if let Some(e) = write_err {
        return Err(FetchError::Storage(e));
    }
    performed?;

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }
    if let Some(expected) = content_length {
        if expected != written {
            return Err(FetchError::PartialTransfer {
                expected,
                received: written,
            });
        }
    }
    file.sync_all()?;
    Ok(written)
}

/// Make sure `pkg` is present in `download_dir`, downloading it if needed.
///
/// An existing file is reused unless a pinned sha256 does not match, in which
/// case it is replaced. Blocking; call from `spawn_blocking` in async code.
pub fn fetch_package(
    pkg: &PackageSpec,
    download_dir: &Path,
    policy: &RetryPolicy,
) -> Result<DownloadOutcome> {
    let file_name = pkg.file_name()?;
    let final_path = download_dir.join(&file_name);

    if final_path.is_file() {
        let stale = match pkg.sha256 {
            Some(ref digest) => !checksum::matches_sha256(&final_path, digest)?,
            None => false,
        };
        if !stale {
            tracing::debug!(path = %final_path.display(), "package already downloaded");
            return Ok(DownloadOutcome {
                file_name,
                path: final_path,
                status: DownloadStatus::AlreadyPresent,
            });
        }
        tracing::warn!(path = %final_path.display(), "existing package fails checksum, re-downloading");
        fs::remove_file(&final_path)
            .with_context(|| format!("failed to remove {}", final_path.display()))?;
    }

    let part = temp_path(&final_path);
    let fetched = run_with_retry(policy, |attempt| {
        tracing::debug!(url = %pkg.url, attempt, "GET");
        fetch_once(&pkg.url, &part)
    });
    let bytes = match fetched {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&part);
            return Err(anyhow::Error::new(e).context(format!("failed to download {}", pkg.url)));
        }
    };

    if let Some(ref expected) = pkg.sha256 {
        let actual = checksum::sha256_path(&part)?;
        if !actual.eq_ignore_ascii_case(expected) {
            let _ = fs::remove_file(&part);
            anyhow::bail!("checksum mismatch for {file_name}: expected {expected}, got {actual}");
        }
    }

    fs::rename(&part, &final_path).with_context(|| {
        format!("failed to rename {} to {}", part.display(), final_path.display())
    })?;
    tracing::info!(file = %file_name, bytes, "downloaded package");

    Ok(DownloadOutcome {
        file_name,
        path: final_path,
        status: DownloadStatus::Fetched(bytes),
    })
}

/// Download every package, in order, into `download_dir` (created if missing).
pub async fn download_all(
    packages: &[PackageSpec],
    download_dir: &Path,
    policy: RetryPolicy,
) -> Result<Vec<DownloadOutcome>> {
    tokio::fs::create_dir_all(download_dir)
        .await
        .with_context(|| format!("failed to create {}", download_dir.display()))?;

    let mut outcomes = Vec::with_capacity(packages.len());
    for pkg in packages {
        let pkg = pkg.clone();
        let dir = download_dir.to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || fetch_package(&pkg, &dir, &policy))
            .await
            .context("download task panicked")??;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Paths of packages that must already be downloaded. Fails on the first missing one.
pub fn existing_packages(packages: &[PackageSpec], download_dir: &Path) -> Result<Vec<PathBuf>> {
    packages
        .iter()
        .map(|pkg| {
            let path = pkg.host_path(download_dir)?;
            if !path.is_file() {
                anyhow::bail!("{} has not been downloaded", path.display());
            }
            Ok(path)
        })
        .collect()
}

/// Delete downloaded packages (and leftover `.part` files). Returns how many files were removed.
pub async fn remove_downloads(packages: &[PackageSpec], download_dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for pkg in packages {
        let path = pkg.host_path(download_dir)?;
        for candidate in [temp_path(&path), path] {
            match tokio::fs::remove_file(&candidate).await {
                Ok(()) => {
                    tracing::debug!(path = %candidate.display(), "deleted file");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("could not delete {}", candidate.display())))
                }
            }
        }
    }
    Ok(removed)
}
