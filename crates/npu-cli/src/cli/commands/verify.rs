//! `npu-setup verify` – run the NPU probes against the container.

use anyhow::Result;
use npu_core::config::NpuConfig;
use npu_core::container::Container;
use npu_core::runner::CommandRunner;
use npu_core::verify::{self, ProbeStage};

pub async fn run_verify<R: CommandRunner>(
    cfg: &NpuConfig,
    runner: &R,
    after_restart: bool,
) -> Result<()> {
    let container = Container::new(runner, cfg.container_name.as_str());
    container.ensure_running().await?;

    let stage = if after_restart {
        println!("Restarting container '{}'...", container.name());
        container.restart().await?;
        container.wait_running(cfg.restart_timeout()).await?;
        ProbeStage::AfterRestart
    } else {
        ProbeStage::Immediate
    };

    let devices = verify::verify(&container, stage, &cfg.device_node, &cfg.expected_device).await?;
    println!(
        "{} found in container '{}' (devices: {})",
        cfg.expected_device,
        container.name(),
        devices.join(", ")
    );
    Ok(())
}
