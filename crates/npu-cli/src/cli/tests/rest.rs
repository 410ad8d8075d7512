//! Tests for download, verify, packages, clean, completions.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_download() {
    let cli = parse(&["npu-setup", "download"]);
    assert!(matches!(cli.command, CliCommand::Download));
    assert!(cli.command.install_options().is_none());
}

#[test]
fn cli_parse_verify() {
    match parse(&["npu-setup", "verify"]).command {
        CliCommand::Verify { after_restart } => assert!(!after_restart),
        _ => panic!("expected Verify"),
    }
    match parse(&["npu-setup", "verify", "--after-restart"]).command {
        CliCommand::Verify { after_restart } => assert!(after_restart),
        _ => panic!("expected Verify with --after-restart"),
    }
}

#[test]
fn cli_parse_packages_sha256() {
    match parse(&["npu-setup", "packages", "--sha256"]).command {
        CliCommand::Packages { sha256 } => assert!(sha256),
        _ => panic!("expected Packages"),
    }
}

#[test]
fn cli_parse_clean_with_config() {
    let cli = parse(&["npu-setup", "--config", "/etc/npu.toml", "clean"]);
    assert!(matches!(cli.command, CliCommand::Clean));
    assert_eq!(
        cli.config.as_deref(),
        Some(std::path::Path::new("/etc/npu.toml"))
    );
}

#[test]
fn cli_parse_completions() {
    match parse(&["npu-setup", "completions", "bash"]).command {
        CliCommand::Completions { shell } => assert_eq!(shell, clap_complete::Shell::Bash),
        _ => panic!("expected Completions"),
    }
    assert!(Cli::try_parse_from(["npu-setup", "completions", "tcsh"]).is_err());
}

#[test]
fn cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["npu-setup"]).is_err());
}

#[test]
fn cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
