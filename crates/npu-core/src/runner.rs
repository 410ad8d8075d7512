//! External program execution.
//!
//! Everything the installer does on the host or in the container goes through
//! `CommandRunner`, so the pipeline can be driven against a scripted runner in
//! tests instead of a real docker daemon.

use crate::error::InstallError;
use anyhow::{Context, Result};
use std::future::Future;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a non-zero exit into `InstallError::CommandFailed`.
    pub fn check(self, program: &str, args: &[String]) -> Result<Self, InstallError> {
        if self.success() {
            Ok(self)
        } else {
            Err(InstallError::CommandFailed {
                program: program.to_string(),
                args: args.to_vec(),
                code: self.code,
                stderr: if self.stderr.trim().is_empty() {
                    self.stdout
                } else {
                    self.stderr
                },
            })
        }
    }
}

/// Runs a program to completion and captures its output.
///
/// A process that starts and exits non-zero is `Ok` with that exit code; only
/// failing to start it at all (e.g. binary not installed) is an `Err`.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<CommandOutput>> + Send;
}

/// Runs real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        tracing::debug!(program, ?args, "exec");
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to run {program}; is it installed and on PATH?"))?;
        let out = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(program, code = ?out.code, "exit");
        Ok(out)
    }
}

/// Turn string literals into the owned argument vector `CommandRunner` takes.
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}
