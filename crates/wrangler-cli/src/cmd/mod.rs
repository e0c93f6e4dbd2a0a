pub mod check;
pub mod config;
pub mod health;
pub mod order;
pub mod plan;
pub mod runner;
pub mod validate;

use std::path::Path;

use anyhow::Context;
use wrangler_core::config::{Config, WarnLevel};

pub(crate) fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load_or_default(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

pub(crate) fn level_label(level: &WarnLevel) -> &'static str {
    match level {
        WarnLevel::Warning => "warning",
        WarnLevel::Error => "error",
    }
}

/// Runtime for the commands that talk to the order runner.
pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}
