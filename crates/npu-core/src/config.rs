use crate::manifest::{default_packages, PackageSpec};
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `container_name`.
pub const ENV_CONTAINER_NAME: &str = "CONTAINER_NAME";
/// Environment variable overriding `download_dir`.
pub const ENV_DOWNLOAD_DIR: &str = "DOWNLOAD_DIR";

/// Retry policy parameters for package downloads (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per package (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_secs: 0.5,
            max_delay_secs: 30,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: c.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(c.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(c.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/npu-setup/config.toml`.
/// Missing keys fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NpuConfig {
    /// Name of the running container to install into.
    pub container_name: String,
    /// Host directory for downloaded packages (None = XDG cache dir).
    pub download_dir: Option<PathBuf>,
    /// Absolute directory inside the container the packages are copied to.
    pub container_tmp_dir: String,
    /// Python package upgraded with pip after the drivers are installed.
    pub python_package: String,
    /// Device node that must be visible inside the container.
    pub device_node: String,
    /// Token OpenVINO must list among its available devices.
    pub expected_device: String,
    /// How long to wait for the container to report running after a restart.
    pub restart_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
    /// Packages to download and install, in install order.
    pub packages: Vec<PackageSpec>,
}

impl Default for NpuConfig {
    fn default() -> Self {
        Self {
            container_name: "frigate".to_string(),
            download_dir: None,
            container_tmp_dir: "/tmp".to_string(),
            python_package: "openvino".to_string(),
            device_node: "/dev/accel/accel0".to_string(),
            expected_device: "NPU".to_string(),
            restart_timeout_secs: 60,
            retry: None,
            packages: default_packages(),
        }
    }
}

impl NpuConfig {
    /// Apply `CONTAINER_NAME` / `DOWNLOAD_DIR` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var_os(key));
    }

    /// Apply `CONTAINER_NAME` / `DOWNLOAD_DIR` as returned by `lookup`.
    /// A container name that is not valid UTF-8 is ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<OsString>) {
        self.apply_overrides(
            lookup(ENV_CONTAINER_NAME).and_then(|v| v.into_string().ok()),
            lookup(ENV_DOWNLOAD_DIR).map(PathBuf::from),
        );
    }

    /// Apply explicit overrides; empty values are ignored.
    pub fn apply_overrides(&mut self, container: Option<String>, download_dir: Option<PathBuf>) {
        if let Some(name) = container.filter(|n| !n.trim().is_empty()) {
            self.container_name = name.trim().to_string();
        }
        if let Some(dir) = download_dir.filter(|d| !d.as_os_str().is_empty()) {
            self.download_dir = Some(dir);
        }
    }

    /// Effective download directory: configured value or `~/.cache/npu-setup/debs`.
    pub fn resolved_download_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.download_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("npu-setup")?;
        Ok(xdg_dirs.get_cache_home().join("debs"))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default()
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_secs)
    }

    /// Reject configurations that would fail halfway through an install.
    pub fn validate(&self) -> Result<()> {
        if self.container_name.trim().is_empty() {
            anyhow::bail!("container_name must not be empty");
        }
        if !self.container_tmp_dir.starts_with('/') {
            anyhow::bail!(
                "container_tmp_dir must be absolute, got {:?}",
                self.container_tmp_dir
            );
        }
        if self.expected_device.trim().is_empty() {
            anyhow::bail!("expected_device must not be empty");
        }
        if self.packages.is_empty() {
            anyhow::bail!("no packages configured");
        }
        let mut seen = HashSet::new();
        for pkg in &self.packages {
            let parsed = url::Url::parse(&pkg.url)
                .with_context(|| format!("invalid package URL: {}", pkg.url))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("unsupported URL scheme {:?}: {}", parsed.scheme(), pkg.url);
            }
            let name = pkg.file_name()?;
            if !seen.insert(name.clone()) {
                anyhow::bail!("two packages share the file name {name}");
            }
            if let Some(ref digest) = pkg.sha256 {
                if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                    anyhow::bail!("sha256 for {name} must be 64 hex characters");
                }
            }
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("npu-setup")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<NpuConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = NpuConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit path. The file must exist.
pub fn load_from(path: &Path) -> Result<NpuConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: NpuConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = NpuConfig::default();
        assert_eq!(cfg.container_name, "frigate");
        assert_eq!(cfg.container_tmp_dir, "/tmp");
        assert_eq!(cfg.python_package, "openvino");
        assert_eq!(cfg.expected_device, "NPU");
        assert_eq!(cfg.packages.len(), 4);
        cfg.validate().unwrap();
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = NpuConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: NpuConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.container_name, cfg.container_name);
        assert_eq!(parsed.packages, cfg.packages);
        assert_eq!(parsed.restart_timeout_secs, cfg.restart_timeout_secs);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            container_name = "nvr"
            download_dir = "/srv/debs"
            container_tmp_dir = "/var/tmp"
            python_package = "openvino==2024.4.0"
            device_node = "/dev/accel/accel1"
            expected_device = "NPU"
            restart_timeout_secs = 5

            [retry]
            max_attempts = 2
            base_delay_secs = 0.1
            max_delay_secs = 1

            [[packages]]
            url = "https://example.com/a.deb"
            sha256 = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"

            [[packages]]
            url = "https://example.com/b.deb"
        "#;
        let cfg: NpuConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.container_name, "nvr");
        assert_eq!(cfg.download_dir.as_deref(), Some(Path::new("/srv/debs")));
        assert_eq!(cfg.packages.len(), 2);
        assert!(cfg.packages[1].sha256.is_none());
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.max_delay, Duration::from_secs(1));
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_config_uses_defaults() {
        let cfg: NpuConfig = toml::from_str("container_name = \"nvr\"").unwrap();
        assert_eq!(cfg.container_name, "nvr");
        assert_eq!(cfg.expected_device, "NPU");
        assert_eq!(cfg.packages, default_packages());
    }

    #[test]
    fn overrides_replace_container_and_dir() {
        let mut cfg = NpuConfig::default();
        cfg.apply_overrides(Some("nvr".into()), Some(PathBuf::from("/tmp/debs")));
        assert_eq!(cfg.container_name, "nvr");
        assert_eq!(cfg.resolved_download_dir().unwrap(), PathBuf::from("/tmp/debs"));

        cfg.apply_overrides(Some("  ".into()), Some(PathBuf::new()));
        assert_eq!(cfg.container_name, "nvr");
        assert_eq!(cfg.download_dir.as_deref(), Some(Path::new("/tmp/debs")));
    }

    #[test]
    fn env_overrides_container_and_dir() {
        let mut cfg = NpuConfig::default();
        cfg.apply_env_from(|key| match key {
            ENV_CONTAINER_NAME => Some(OsString::from("nvr")),
            ENV_DOWNLOAD_DIR => Some(OsString::from("/srv/debs")),
            _ => None,
        });
        assert_eq!(cfg.container_name, "nvr");
        assert_eq!(cfg.download_dir.as_deref(), Some(Path::new("/srv/debs")));
    }

    #[test]
    fn unset_or_empty_env_keeps_config() {
        let mut cfg = NpuConfig::default();
        cfg.container_name = "from-file".into();
        cfg.apply_env_from(|_| None);
        assert_eq!(cfg.container_name, "from-file");
        assert!(cfg.download_dir.is_none());

        cfg.apply_env_from(|_| Some(OsString::new()));
        assert_eq!(cfg.container_name, "from-file");
        assert!(cfg.download_dir.is_none());
    }

    #[test]
    fn validate_rejects_bad_configs() {
        let mut cfg = NpuConfig::default();
        cfg.container_name = String::new();
        assert!(cfg.validate().is_err());

        let mut cfg = NpuConfig::default();
        cfg.packages.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = NpuConfig::default();
        cfg.packages = vec![PackageSpec::new("ftp://example.com/a.deb")];
        assert!(cfg.validate().is_err());

        let mut cfg = NpuConfig::default();
        cfg.packages = vec![
            PackageSpec::new("https://a.example.com/x/pkg.deb"),
            PackageSpec::new("https://b.example.com/y/pkg.deb"),
        ];
        assert!(cfg.validate().is_err());

        let mut cfg = NpuConfig::default();
        cfg.packages[0].sha256 = Some("abc".into());
        assert!(cfg.validate().is_err());

        let mut cfg = NpuConfig::default();
        cfg.container_tmp_dir = "tmp".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = NpuConfig::default();
        cfg.container_name = "other".into();
        fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();
        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded.container_name, "other");
        assert!(load_from(&dir.path().join("missing.toml")).is_err());
    }
}
