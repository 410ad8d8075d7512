//! Domain errors the CLI needs to tell apart from generic IO/context failures.

use thiserror::Error;

/// Failures of the install pipeline that are not plain IO errors.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Target container is missing or stopped; nothing has been downloaded yet.
    #[error("container '{0}' is not running; start it before installing")]
    ContainerNotRunning(String),

    /// An external program exited with a non-zero status.
    #[error("`{program} {}` exited with {}: {}", .args.join(" "), exit_code(.code), .stderr.trim())]
    CommandFailed {
        program: String,
        args: Vec<String>,
        code: Option<i32>,
        stderr: String,
    },

    /// `dpkg -i` failed again after `apt --fix-broken install`.
    #[error("dpkg install failed after fix-broken retry: {0}")]
    DpkgFailed(String),

    /// Device node is not visible inside the container.
    #[error("device node {node} not found in container '{container}'")]
    DeviceNodeMissing { container: String, node: String },

    /// OpenVINO did not report the expected device.
    #[error("{stage} verification failed: expected {expected} in available devices {devices:?}")]
    VerificationFailed {
        stage: String,
        expected: String,
        devices: Vec<String>,
    },

    /// Container did not come back up after `docker restart`.
    #[error("container '{name}' not running {secs}s after restart")]
    RestartTimeout { name: String, secs: u64 },
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "signal".to_string(),
    }
}
