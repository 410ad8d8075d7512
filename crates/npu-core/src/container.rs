//! Docker operations on the target container.

use crate::error::InstallError;
use crate::runner::{args, CommandOutput, CommandRunner};
use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

const DOCKER: &str = "docker";

/// Interval between `is_running` checks while waiting for a restart.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A named container driven through the `docker` CLI.
pub struct Container<'r, R: CommandRunner> {
    runner: &'r R,
    name: String,
}

impl<'r, R: CommandRunner> Container<'r, R> {
    pub fn new(runner: &'r R, name: impl Into<String>) -> Self {
        Self {
            runner,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn docker(&self, argv: Vec<String>) -> Result<CommandOutput> {
        self.runner.run(DOCKER, &argv).await
    }

    async fn docker_checked(&self, argv: Vec<String>) -> Result<CommandOutput> {
        let out = self.docker(argv.clone()).await?;
        Ok(out.check(DOCKER, &argv)?)
    }

    /// True if docker reports the container as running. A missing container is `false`.
    pub async fn is_running(&self) -> Result<bool> {
        let out = self
            .docker(args(["inspect", "-f", "{{.State.Running}}", self.name.as_str()]))
            .await?;
        Ok(out.success() && out.stdout.trim() == "true")
    }

    /// Fail with `ContainerNotRunning` unless the container is up.
    pub async fn ensure_running(&self) -> Result<()> {
        if !self.is_running().await? {
            return Err(InstallError::ContainerNotRunning(self.name.clone()).into());
        }
        Ok(())
    }

    /// `docker cp <host_path> <name>:<container_dir>/`.
    pub async fn copy_in(&self, host_path: &Path, container_dir: &str) -> Result<()> {
        let dest = format!("{}:{}/", self.name, container_dir.trim_end_matches('/'));
        self.docker_checked(vec![
            "cp".to_string(),
            host_path.display().to_string(),
            dest,
        ])
        .await?;
        Ok(())
    }

    /// `docker exec <name> <argv...>`; a non-zero exit is returned, not raised.
    pub async fn exec(&self, argv: &[String]) -> Result<CommandOutput> {
        let mut full = Vec::with_capacity(argv.len() + 2);
        full.push("exec".to_string());
        full.push(self.name.clone());
        full.extend(argv.iter().cloned());
        self.docker(full).await
    }

    /// Like `exec` but a non-zero exit becomes `InstallError::CommandFailed`
    /// naming the in-container command.
    pub async fn exec_checked(&self, argv: &[String]) -> Result<CommandOutput> {
        let out = self.exec(argv).await?;
        let (program, rest): (&str, &[String]) = match argv.split_first() {
            Some((p, r)) => (p.as_str(), r),
            None => ("", &[]),
        };
        Ok(out.check(program, rest)?)
    }

    pub async fn restart(&self) -> Result<()> {
        self.docker_checked(args(["restart", self.name.as_str()]))
            .await?;
        Ok(())
    }

    /// Poll until the container reports running, or fail with `RestartTimeout`.
    pub async fn wait_running(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_running().await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(InstallError::RestartTimeout {
                    name: self.name.clone(),
                    secs: timeout.as_secs(),
                }
                .into());
            }
            tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
        }
    }
}
