//! In-container install sequence: dpkg, one fix-broken retry, library cache
//! refresh, pip upgrade, temp cleanup.

use crate::container::Container;
use crate::error::InstallError;
use crate::runner::{args, CommandOutput, CommandRunner};
use anyhow::Result;

/// pip refuses system installs on newer Debian/Ubuntu images without this flag.
const PIP_EXTERNALLY_MANAGED: &str = "externally-managed-environment";

/// How the dpkg step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpkgOutcome {
    /// First `dpkg -i` succeeded.
    Installed,
    /// First attempt failed; `apt --fix-broken install` then a second `dpkg -i` succeeded.
    InstalledAfterFix,
}

fn dpkg_install_argv(container_paths: &[String]) -> Vec<String> {
    let mut argv = args(["dpkg", "-i"]);
    argv.extend(container_paths.iter().cloned());
    argv
}

fn failure_text(out: &CommandOutput) -> String {
    let text = if out.stderr.trim().is_empty() {
        &out.stdout
    } else {
        &out.stderr
    };
    text.trim().to_string()
}

/// `dpkg -i` every package; on failure run `apt --fix-broken install -y` and retry once.
pub async fn install_packages<R: CommandRunner>(
    container: &Container<'_, R>,
    container_paths: &[String],
) -> Result<DpkgOutcome> {
    if container_paths.is_empty() {
        anyhow::bail!("no packages to install");
    }
    let dpkg = dpkg_install_argv(container_paths);

    let first = container.exec(&dpkg).await?;
    if first.success() {
        tracing::info!(count = container_paths.len(), "dpkg installed packages");
        return Ok(DpkgOutcome::Installed);
    }
    tracing::warn!(
        code = ?first.code,
        "dpkg -i failed, running apt --fix-broken install: {}",
        failure_text(&first)
    );

    container
        .exec_checked(&args(["apt", "--fix-broken", "install", "-y"]))
        .await?;

    let second = container.exec(&dpkg).await?;
    if !second.success() {
        return Err(InstallError::DpkgFailed(failure_text(&second)).into());
    }
    tracing::info!(count = container_paths.len(), "dpkg installed packages after fix-broken");
    Ok(DpkgOutcome::InstalledAfterFix)
}

/// Refresh the shared library cache so the Level Zero loader finds the NPU driver.
pub async fn refresh_library_cache<R: CommandRunner>(container: &Container<'_, R>) -> Result<()> {
    container.exec_checked(&args(["ldconfig"])).await?;
    Ok(())
}

/// `pip install --upgrade <package>`, retried with `--break-system-packages`
/// only when pip reports an externally managed environment.
pub async fn upgrade_python_package<R: CommandRunner>(
    container: &Container<'_, R>,
    package: &str,
) -> Result<()> {
    let argv = args(["pip", "install", "--upgrade", package]);
    let out = container.exec(&argv).await?;
    if out.success() {
        tracing::info!(package, "pip upgraded package");
        return Ok(());
    }
    if out.stderr.contains(PIP_EXTERNALLY_MANAGED) || out.stdout.contains(PIP_EXTERNALLY_MANAGED) {
        tracing::debug!(package, "pip environment is externally managed, retrying");
        let mut forced = argv.clone();
        forced.push("--break-system-packages".to_string());
        container.exec_checked(&forced).await?;
        tracing::info!(package, "pip upgraded package");
        return Ok(());
    }
    Err(InstallError::CommandFailed {
        program: "pip".to_string(),
        args: argv[1..].to_vec(),
        code: out.code,
        stderr: failure_text(&out),
    }
    .into())
}

/// Remove copied packages from the container. Failures are logged, not raised.
pub async fn remove_copied<R: CommandRunner>(container: &Container<'_, R>, container_paths: &[String]) {
    let mut argv = args(["rm", "-f"]);
    argv.extend(container_paths.iter().cloned());
    match container.exec(&argv).await {
        Ok(out) if out.success() => {
            tracing::debug!(count = container_paths.len(), "removed copied packages from container")
        }
        Ok(out) => tracing::warn!("could not remove copied packages: {}", failure_text(&out)),
        Err(e) => tracing::warn!("could not remove copied packages: {:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::{fail, ok, ScriptedRunner};

    fn paths() -> Vec<String> {
        args(["/tmp/a.deb", "/tmp/b.deb"])
    }

    #[tokio::test]
    async fn dpkg_success_first_try() {
        let runner = ScriptedRunner::new();
        let c = Container::new(&runner, "frigate");
        let outcome = install_packages(&c, &paths()).await.unwrap();
        assert_eq!(outcome, DpkgOutcome::Installed);
        assert_eq!(
            runner.call_lines(),
            vec!["docker exec frigate dpkg -i /tmp/a.deb /tmp/b.deb"]
        );
    }

    #[tokio::test]
    async fn dpkg_failure_runs_fix_broken_then_retries() {
        let runner = ScriptedRunner::new().on(
            "dpkg -i",
            vec![fail(1, "dependency problems - leaving unconfigured"), ok("")],
        );
        let c = Container::new(&runner, "frigate");
        let outcome = install_packages(&c, &paths()).await.unwrap();
        assert_eq!(outcome, DpkgOutcome::InstalledAfterFix);
        let lines = runner.call_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("dpkg -i /tmp/a.deb /tmp/b.deb"));
        assert_eq!(lines[1], "docker exec frigate apt --fix-broken install -y");
        assert!(lines[2].ends_with("dpkg -i /tmp/a.deb /tmp/b.deb"));
    }

    #[tokio::test]
    async fn second_dpkg_failure_is_fatal() {
        let runner = ScriptedRunner::new().on("dpkg -i", vec![fail(1, "broken")]);
        let c = Container::new(&runner, "frigate");
        let err = install_packages(&c, &paths()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::DpkgFailed(msg)) if msg == "broken"
        ));
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn fix_broken_failure_stops_before_retry() {
        let runner = ScriptedRunner::new()
            .on("dpkg -i", vec![fail(1, "broken")])
            .on("--fix-broken", vec![fail(100, "E: Unable to locate package")]);
        let c = Container::new(&runner, "frigate");
        let err = install_packages(&c, &paths()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::CommandFailed { program, .. }) if program == "apt"
        ));
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn empty_package_list_rejected() {
        let runner = ScriptedRunner::new();
        let c = Container::new(&runner, "frigate");
        assert!(install_packages(&c, &[]).await.is_err());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn pip_retries_when_externally_managed() {
        let runner = ScriptedRunner::new().on(
            "pip install",
            vec![fail(1, "error: externally-managed-environment"), ok("")],
        );
        let c = Container::new(&runner, "frigate");
        upgrade_python_package(&c, "openvino").await.unwrap();
        let lines = runner.call_lines();
        assert_eq!(lines[0], "docker exec frigate pip install --upgrade openvino");
        assert_eq!(
            lines[1],
            "docker exec frigate pip install --upgrade openvino --break-system-packages"
        );
    }

    #[tokio::test]
    async fn pip_other_failure_is_fatal() {
        let runner = ScriptedRunner::new().on("pip install", vec![fail(1, "No matching distribution")]);
        let c = Container::new(&runner, "frigate");
        let err = upgrade_python_package(&c, "openvino").await.unwrap_err();
        assert!(err.to_string().contains("No matching distribution"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn remove_copied_ignores_failure() {
        let runner = ScriptedRunner::new().on("rm -f", vec![fail(1, "read-only file system")]);
        let c = Container::new(&runner, "frigate");
        remove_copied(&c, &paths()).await;
        assert_eq!(
            runner.call_lines(),
            vec!["docker exec frigate rm -f /tmp/a.deb /tmp/b.deb"]
        );
    }
}
