//! CLI command handlers, one file per command.

mod clean;
mod completions;
mod download;
mod install;
mod packages;
mod verify;

pub use clean::run_clean;
pub use completions::run_completions;
pub use download::run_download;
pub use install::run_install;
pub use packages::run_packages;
pub use verify::run_verify;
