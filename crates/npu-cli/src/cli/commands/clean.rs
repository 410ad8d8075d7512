//! `npu-setup clean` – delete downloaded packages.

use anyhow::Result;
use npu_core::config::NpuConfig;
use npu_core::download;

pub async fn run_clean(cfg: &NpuConfig) -> Result<()> {
    let dir = cfg.resolved_download_dir()?;
    let removed = download::remove_downloads(&cfg.packages, &dir).await?;
    println!("Removed {removed} file(s) from {}", dir.display());
    Ok(())
}
