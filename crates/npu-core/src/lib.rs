pub mod config;
pub mod logging;

pub mod checksum;
pub mod container;
pub mod download;
pub mod error;
pub mod install;
pub mod manifest;
pub mod pipeline;
pub mod retry;
pub mod runner;
pub mod verify;
