//! `npu-setup install` – the full install run.

use anyhow::Result;
use npu_core::config::NpuConfig;
use npu_core::download::DownloadStatus;
use npu_core::pipeline::{InstallOptions, Installer};
use npu_core::runner::CommandRunner;

use crate::cli::prompt;

pub async fn run_install<R: CommandRunner>(
    cfg: &NpuConfig,
    runner: &R,
    opts: &InstallOptions,
) -> Result<()> {
    let mut installer = Installer::new(cfg, runner)?
        .on_step(|step| println!("==> {}", step.describe()));
    println!(
        "Installing NPU drivers into container '{}' (downloads in {})",
        cfg.container_name,
        installer.download_dir().display()
    );

    let mut ask = |question: &str| prompt::ask_yes_no(question);
    let report = installer.run(opts, &mut ask).await?;

    for d in &report.downloads {
        match d.status {
            DownloadStatus::Fetched(bytes) => {
                println!("    fetched {} ({} bytes)", d.file_name, bytes)
            }
            DownloadStatus::AlreadyPresent => println!("    reused  {}", d.file_name),
        }
    }
    if let Some(ref why) = report.immediate_failure {
        println!("    before restart: {why}");
    }
    if let Some(devices) = report.devices_after_restart.as_ref().or(report.devices.as_ref()) {
        println!("OpenVINO devices: {}", devices.join(", "));
    }
    if report.downloads_deleted {
        println!("Deleted downloaded packages.");
    }
    println!("NPU driver installation complete.");
    Ok(())
}
