//! The install run: container check, download, copy, install, pip upgrade,
//! verification before and after restart, cleanup of downloads.
//!
//! Steps run strictly in order; the first failure aborts the run. The one
//! exception is the probe before restart: when a restart follows, its failure
//! is only recorded and the post-restart probe is the one that counts.

use crate::config::NpuConfig;
use crate::container::Container;
use crate::download::{self, DownloadOutcome, DownloadStatus};
use crate::install::{self, DpkgOutcome};
use crate::runner::CommandRunner;
use crate::verify::{self, ProbeStage};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// What to do with downloaded packages once the install succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupChoice {
    /// Ask through the `Confirm` callback.
    #[default]
    Ask,
    Keep,
    Delete,
}

/// Yes/no question to the user. Returning `Err` aborts the run.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> Result<bool>,
{
    fn confirm(&mut self, question: &str) -> Result<bool> {
        self(question)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Use packages already in the download dir instead of fetching.
    pub skip_download: bool,
    /// Skip both verification probes.
    pub skip_verify: bool,
    /// Do not restart the container (also skips the post-restart probe).
    pub no_restart: bool,
    pub cleanup: CleanupChoice,
}

/// Pipeline step, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CheckContainer,
    Download,
    CopyIn,
    Install,
    UpgradePython,
    Verify,
    Restart,
    VerifyAfterRestart,
    Cleanup,
}

impl Step {
    pub fn describe(self) -> &'static str {
        match self {
            Step::CheckContainer => "Checking container is running",
            Step::Download => "Downloading packages",
            Step::CopyIn => "Copying packages into container",
            Step::Install => "Installing packages",
            Step::UpgradePython => "Upgrading Python package",
            Step::Verify => "Verifying NPU",
            Step::Restart => "Restarting container",
            Step::VerifyAfterRestart => "Verifying NPU after restart",
            Step::Cleanup => "Cleaning up downloads",
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub downloads: Vec<DownloadOutcome>,
    pub dpkg: Option<DpkgOutcome>,
    pub devices: Option<Vec<String>>,
    /// Why the probe before restart failed, when a restart followed anyway.
    pub immediate_failure: Option<String>,
    pub devices_after_restart: Option<Vec<String>>,
    pub restarted: bool,
    pub downloads_deleted: bool,
}

impl InstallReport {
    pub fn fetched_count(&self) -> usize {
        self.downloads
            .iter()
            .filter(|d| matches!(d.status, DownloadStatus::Fetched(_)))
            .count()
    }
}

/// Drives one install into the configured container.
pub struct Installer<'a, R: CommandRunner> {
    cfg: &'a NpuConfig,
    runner: &'a R,
    download_dir: PathBuf,
    on_step: Box<dyn FnMut(Step) + Send + 'a>,
}

impl<'a, R: CommandRunner> Installer<'a, R> {
    pub fn new(cfg: &'a NpuConfig, runner: &'a R) -> Result<Self> {
        cfg.validate()?;
        let download_dir = cfg.resolved_download_dir()?;
        Ok(Self {
            cfg,
            runner,
            download_dir,
            on_step: Box::new(|step: Step| tracing::info!("{}", step.describe())),
        })
    }

    /// Called at the start of every step (after it is logged).
    pub fn on_step(mut self, f: impl FnMut(Step) + Send + 'a) -> Self {
        self.on_step = Box::new(f);
        self
    }

    pub fn download_dir(&self) -> &std::path::Path {
        &self.download_dir
    }

    pub fn container(&self) -> Container<'a, R> {
        Container::new(self.runner, self.cfg.container_name.clone())
    }

    fn step(&mut self, step: Step) {
        tracing::debug!(?step, "step");
        (self.on_step)(step);
    }

    /// Run every step. The container check happens before anything is downloaded.
    pub async fn run(
        &mut self,
        opts: &InstallOptions,
        confirm: &mut dyn Confirm,
    ) -> Result<InstallReport> {
        let mut report = InstallReport::default();
        let container = self.container();
        let cfg = self.cfg;

        self.step(Step::CheckContainer);
        container.ensure_running().await?;

        self.step(Step::Download);
        let host_paths: Vec<PathBuf> = if opts.skip_download {
            download::existing_packages(&cfg.packages, &self.download_dir)?
        } else {
            report.downloads =
                download::download_all(&cfg.packages, &self.download_dir, cfg.retry_policy())
                    .await?;
            report.downloads.iter().map(|d| d.path.clone()).collect()
        };

        self.step(Step::CopyIn);
        let mut container_paths = Vec::with_capacity(cfg.packages.len());
        for (pkg, host_path) in cfg.packages.iter().zip(&host_paths) {
            container
                .copy_in(host_path, &cfg.container_tmp_dir)
                .await
                .with_context(|| format!("failed to copy {} into container", host_path.display()))?;
            container_paths.push(pkg.container_path(&cfg.container_tmp_dir)?);
        }

        self.step(Step::Install);
        report.dpkg = Some(install::install_packages(&container, &container_paths).await?);
        install::refresh_library_cache(&container).await?;
        install::remove_copied(&container, &container_paths).await;

        self.step(Step::UpgradePython);
        install::upgrade_python_package(&container, &cfg.python_package).await?;

        if !opts.skip_verify {
            self.step(Step::Verify);
            let immediate = verify::verify(
                &container,
                ProbeStage::Immediate,
                &cfg.device_node,
                &cfg.expected_device,
            )
            .await;
            match immediate {
                Ok(devices) => report.devices = Some(devices),
                // Post-restart probe decides.
                Err(e) if !opts.no_restart => {
                    tracing::warn!("{:#}; checking again after restart", e);
                    report.immediate_failure = Some(format!("{e:#}"));
                }
                Err(e) => return Err(e),
            }
        }

        if !opts.no_restart {
            self.step(Step::Restart);
            container.restart().await?;
            container.wait_running(cfg.restart_timeout()).await?;
            report.restarted = true;

            if !opts.skip_verify {
                self.step(Step::VerifyAfterRestart);
                report.devices_after_restart = Some(
                    verify::verify(
                        &container,
                        ProbeStage::AfterRestart,
                        &cfg.device_node,
                        &cfg.expected_device,
                    )
                    .await?,
                );
            }
        }

        let delete = match opts.cleanup {
            CleanupChoice::Keep => false,
            CleanupChoice::Delete => true,
            CleanupChoice::Ask => confirm.confirm(&format!(
                "Delete downloaded packages in {}?",
                self.download_dir.display()
            ))?,
        };
        if delete {
            self.step(Step::Cleanup);
            let removed = download::remove_downloads(&cfg.packages, &self.download_dir).await?;
            tracing::info!(removed, dir = %self.download_dir.display(), "deleted downloads");
            report.downloads_deleted = true;
        }

        Ok(report)
    }
}
