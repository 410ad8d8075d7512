//! CLI for the npu-setup installer.

mod commands;
mod prompt;

use anyhow::Result;
use clap::{Parser, Subcommand};
use npu_core::config::{self, NpuConfig};
use npu_core::pipeline::{CleanupChoice, InstallOptions};
use npu_core::runner::SystemRunner;
use std::ffi::OsString;
use std::path::PathBuf;

use commands::{
    run_clean, run_completions, run_download, run_install, run_packages, run_verify,
};

/// Install Intel NPU drivers and OpenVINO into a running container.
#[derive(Debug, Parser)]
#[command(name = "npu-setup", version)]
#[command(
    about = "Install Intel NPU drivers and OpenVINO into a running container",
    long_about = None
)]
pub struct Cli {
    /// Config file to use instead of ~/.config/npu-setup/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Target container (overrides config and CONTAINER_NAME).
    #[arg(long, global = true, value_name = "NAME")]
    pub container: Option<String>,

    /// Host directory for downloaded packages (overrides config and DOWNLOAD_DIR).
    #[arg(long, global = true, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download, install, verify, restart, then offer to delete the downloads.
    Install {
        /// Delete downloaded packages at the end without asking.
        #[arg(long, short = 'y', conflicts_with = "keep")]
        yes: bool,
        /// Keep downloaded packages without asking.
        #[arg(long)]
        keep: bool,
        /// Reuse packages already in the download directory; fail if any is missing.
        #[arg(long)]
        skip_download: bool,
        /// Skip the NPU verification probes.
        #[arg(long)]
        skip_verify: bool,
        /// Do not restart the container (skips the post-restart probe).
        #[arg(long)]
        no_restart: bool,
    },

    /// Only download the configured packages.
    Download,

    /// Check the device node and OpenVINO device list inside the container.
    Verify {
        /// Restart the container first and verify once it is back up.
        #[arg(long)]
        after_restart: bool,
    },

    /// List configured packages and whether they are downloaded.
    Packages {
        /// Also print the SHA-256 of downloaded files (for pinning in config.toml).
        #[arg(long)]
        sha256: bool,
    },

    /// Delete downloaded packages.
    Clean,

    /// Print shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl CliCommand {
    /// Map install flags to pipeline options.
    pub fn install_options(&self) -> Option<InstallOptions> {
        match *self {
            CliCommand::Install {
                yes,
                keep,
                skip_download,
                skip_verify,
                no_restart,
            } => Some(InstallOptions {
                skip_download,
                skip_verify,
                no_restart,
                cleanup: if yes {
                    CleanupChoice::Delete
                } else if keep {
                    CleanupChoice::Keep
                } else {
                    CleanupChoice::Ask
                },
            }),
            _ => None,
        }
    }

    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        if let CliCommand::Completions { shell } = cli.command {
            return run_completions(shell);
        }

        let cfg = load_config(&cli)?;
        tracing::debug!("loaded config: {:?}", cfg);
        let runner = SystemRunner;

        if let Some(opts) = cli.command.install_options() {
            return run_install(&cfg, &runner, &opts).await;
        }
        match cli.command {
            CliCommand::Download => run_download(&cfg).await?,
            CliCommand::Verify { after_restart } => run_verify(&cfg, &runner, after_restart).await?,
            CliCommand::Packages { sha256 } => run_packages(&cfg, sha256)?,
            CliCommand::Clean => run_clean(&cfg).await?,
            CliCommand::Install { .. } | CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

fn load_config(cli: &Cli) -> Result<NpuConfig> {
    load_config_with(cli, |key| std::env::var_os(key))
}

/// Config file, then environment (via `env`), then flags; validated.
fn load_config_with(cli: &Cli, env: impl Fn(&str) -> Option<OsString>) -> Result<NpuConfig> {
    let mut cfg = match cli.config {
        Some(ref path) => config::load_from(path)?,
        None => config::load_or_init()?,
    };
    cfg.apply_env_from(env);
    cfg.apply_overrides(cli.container.clone(), cli.download_dir.clone());
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests;
