//! `npu-setup packages` – list configured packages and their local state.

use anyhow::Result;
use npu_core::checksum;
use npu_core::config::NpuConfig;

pub fn run_packages(cfg: &NpuConfig, show_sha256: bool) -> Result<()> {
    let dir = cfg.resolved_download_dir()?;
    println!("Download directory: {}", dir.display());
    println!("{:<10} {:<56} {}", "STATE", "FILE", "URL");
    for pkg in &cfg.packages {
        let path = pkg.host_path(&dir)?;
        let state = if path.is_file() { "present" } else { "missing" };
        println!("{:<10} {:<56} {}", state, pkg.file_name()?, pkg.url);
        if show_sha256 && path.is_file() {
            let digest = checksum::sha256_path(&path)?;
            let pinned = match pkg.sha256 {
                Some(ref want) if want.eq_ignore_ascii_case(&digest) => " (matches pin)",
                Some(_) => " (DIFFERS from pin)",
                None => "",
            };
            println!("{:<10} sha256 {}{}", "", digest, pinned);
        }
    }
    Ok(())
}
