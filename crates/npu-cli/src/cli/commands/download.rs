//! `npu-setup download` – fetch packages without touching the container.

use anyhow::Result;
use npu_core::config::NpuConfig;
use npu_core::download::{self, DownloadStatus};

pub async fn run_download(cfg: &NpuConfig) -> Result<()> {
    let dir = cfg.resolved_download_dir()?;
    let outcomes = download::download_all(&cfg.packages, &dir, cfg.retry_policy()).await?;
    for o in &outcomes {
        match o.status {
            DownloadStatus::Fetched(bytes) => {
                println!("fetched {} ({} bytes)", o.path.display(), bytes)
            }
            DownloadStatus::AlreadyPresent => println!("present {}", o.path.display()),
        }
    }
    Ok(())
}
