//! Verification probes: device node visible in the container, and OpenVINO
//! listing the expected device.

use crate::container::Container;
use crate::error::InstallError;
use crate::runner::{args, CommandRunner};
use anyhow::Result;
use std::fmt;

/// Python one-liner printing OpenVINO's available devices, e.g. `['CPU', 'GPU', 'NPU']`.
pub const DEVICE_PROBE: &str = "from openvino import Core; print(Core().available_devices)";

/// When a probe runs relative to the container restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    Immediate,
    AfterRestart,
}

impl fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStage::Immediate => write!(f, "immediate"),
            ProbeStage::AfterRestart => write!(f, "post-restart"),
        }
    }
}

/// Parse the printed Python list of device names.
///
/// Takes the last line that looks like a list so warnings printed before it
/// are ignored. Returns `None` when no list is found.
pub fn parse_device_list(output: &str) -> Option<Vec<String>> {
    let line = output
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('[') && l.ends_with(']'))
        .last()?;
    let inner = &line[1..line.len() - 1];
    Some(
        inner
            .split(',')
            .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').trim())
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// True if `expected` is listed exactly or as an indexed instance (`NPU.0`).
pub fn has_device(devices: &[String], expected: &str) -> bool {
    devices.iter().any(|d| {
        d == expected
            || d.strip_prefix(expected)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Ask OpenVINO inside the container which devices it can see.
pub async fn probe_devices<R: CommandRunner>(container: &Container<'_, R>) -> Result<Vec<String>> {
    let out = container
        .exec_checked(&args(["python3", "-c", DEVICE_PROBE]))
        .await?;
    parse_device_list(&out.stdout).ok_or_else(|| {
        anyhow::anyhow!(
            "could not find a device list in probe output: {:?}",
            out.stdout.trim()
        )
    })
}

/// `test -e <node>` inside the container.
pub async fn check_device_node<R: CommandRunner>(
    container: &Container<'_, R>,
    node: &str,
) -> Result<()> {
    let out = container.exec(&args(["test", "-e", node])).await?;
    if !out.success() {
        return Err(InstallError::DeviceNodeMissing {
            container: container.name().to_string(),
            node: node.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Run both probes for one stage. Returns the reported device list.
pub async fn verify<R: CommandRunner>(
    container: &Container<'_, R>,
    stage: ProbeStage,
    device_node: &str,
    expected: &str,
) -> Result<Vec<String>> {
    check_device_node(container, device_node).await?;
    let devices = probe_devices(container).await?;
    tracing::info!(%stage, ?devices, "openvino devices");
    if !has_device(&devices, expected) {
        return Err(InstallError::VerificationFailed {
            stage: stage.to_string(),
            expected: expected.to_string(),
            devices,
        }
        .into());
    }
    Ok(devices)
}
