//! Configuration loading functionality.
//!
//! Resolves the config path, creates a default file when none exists, parses
//! TOML, applies environment overrides, validates, and fills in defaults.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::common::constants::*;
use crate::common::utils::private_path;

/// Custom configuration directory from `--config`, set once at startup.
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for this process. Can only be called once.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Path of `dreamhouse.toml`, honoring `--config`.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = CONFIG_DIR.get().and_then(|d| d.clone()) {
        return Ok(custom_dir.join("dreamhouse.toml"));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("dreamhouse").join("dreamhouse.toml"))
}

/// Load configuration from the default location, creating it if missing.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        super::builder::create_default_config(&config_path)
            .context("Failed to create default config during load")?;
        log_block_start!("Created default config at {}", private_path(&config_path));
    }

    load_from_path(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            private_path(&config_path)
        )
    })
}

/// Load configuration from a specific path. Does not create missing files.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found at {}", private_path(path));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", private_path(path)))?;

    let mut config = parse_config(&content)
        .with_context(|| format!("Failed to parse config from {}", private_path(path)))?;

    config.apply_env_overrides();
    validate_config(&config)?;
    apply_defaults(&mut config);

    Ok(config)
}

/// Parse TOML text into a [`Config`] without validation.
pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

/// Fill every unset field with its default.
pub fn apply_defaults(config: &mut Config) {
    config
        .request_timeout_ms
        .get_or_insert(DEFAULT_REQUEST_TIMEOUT_MS);
    config.duration.get_or_insert(DEFAULT_DURATION_SECS);
    config
        .exclude
        .get_or_insert_with(|| DEFAULT_EXCLUDED_LIGHTS.iter().map(|s| s.to_string()).collect());
    config.pacing_ms.get_or_insert(DEFAULT_PACING_MS);
    config.stagger_ms.get_or_insert(DEFAULT_STAGGER_MS);
    config.transition_time.get_or_insert(DEFAULT_TRANSITION_TIME);
    config
        .seed_hues
        .get_or_insert_with(|| DEFAULT_SEED_HUES.iter().map(|&h| h as u32).collect());
    config.jitter_range.get_or_insert(DEFAULT_JITTER_RANGE);
    config.drift.get_or_insert_default();
    config
        .diffuse_interval_ms
        .get_or_insert(DEFAULT_DIFFUSE_INTERVAL_MS);
    config.stall_guard.get_or_insert(DEFAULT_STALL_GUARD);
    config.stall_grace_ms.get_or_insert(DEFAULT_STALL_GRACE_MS);
}
