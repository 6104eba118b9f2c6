//! Configuration system for dreamhouse.
//!
//! Settings live in `dreamhouse.toml` under `$XDG_CONFIG_HOME/dreamhouse/`
//! (or the directory given with `--config`). A commented default file is
//! generated on first run.
//!
//! ```toml
//! #[Bridge]
//! # bridge_ip = "192.168.1.20"  # Bridge address (unset = discover via SSDP)
//! # username = "..."            # API username (unset = run registration)
//! request_timeout_ms = 2000     # HTTP connect/read timeout (100-30000)ms
//!
//! #[Sequence]
//! duration = 10                 # Run length in seconds (1-3600)
//! exclude = ["Dobbin Street"]   # Lights left out of the sequence
//! pacing_ms = 200               # Pause after each write (10-10000)ms
//! stagger_ms = 10               # Per-light stagger modulus (0-1000)ms
//! transition_time = 1           # Transition hint per write (0-100) x 100ms
//!
//! #[Hue pool]
//! seed_hues = [20000, 20100, 20300, 0]
//! jitter_range = 500            # Jitter span per draw (0-65536)
//! drift = "render"              # "render" or "walk"
//! diffuse_interval_ms = 1       # Diffuser pause between attempts (1-1000)ms
//!
//! #[Stall guard]
//! stall_guard = true            # Let barrier waits give up after the deadline
//! stall_grace_ms = 2000         # Grace period past the deadline (0-60000)ms
//! ```
//!
//! `HUE_IP` and `HUE_USER` in the environment override `bridge_ip` and
//! `username`, matching how bridge credentials are usually supplied in scripts.

pub mod builder;
pub mod loading;
pub mod validation;

use serde::Deserialize;
use std::time::Duration;

use crate::common::constants::*;

pub use builder::{create_default_config, update_username};
pub use loading::{get_config_path, load, load_from_path, set_config_dir};

/// How a pool draw affects the value stored in the pool.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriftMode {
    /// The drawn value goes back unchanged; only the rendered hue is jittered.
    #[default]
    Render,
    /// The jittered value goes back, so pool entries random-walk over time.
    Walk,
}

impl DriftMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftMode::Render => "render",
            DriftMode::Walk => "walk",
        }
    }
}

/// Settings loaded from `dreamhouse.toml`.
///
/// Every field is optional in the file; [`loading::apply_defaults`] fills the
/// gaps after validation so the rest of the program can read plain values
/// through the accessor methods.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub bridge_ip: Option<String>,
    pub username: Option<String>,
    pub request_timeout_ms: Option<u64>,

    pub duration: Option<u64>, // seconds
    pub exclude: Option<Vec<String>>,
    pub pacing_ms: Option<u64>,
    pub stagger_ms: Option<u64>,
    pub transition_time: Option<u16>, // units of 100ms

    pub seed_hues: Option<Vec<u32>>,
    pub jitter_range: Option<u32>,
    pub drift: Option<DriftMode>,
    pub diffuse_interval_ms: Option<u64>,

    pub stall_guard: Option<bool>,
    pub stall_grace_ms: Option<u64>,
}

impl Config {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration.unwrap_or(DEFAULT_DURATION_SECS))
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms.unwrap_or(DEFAULT_PACING_MS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS))
    }

    pub fn diffuse_interval(&self) -> Duration {
        Duration::from_millis(
            self.diffuse_interval_ms
                .unwrap_or(DEFAULT_DIFFUSE_INTERVAL_MS),
        )
    }

    /// Grace period for barrier waits past the deadline, `None` when the guard is off.
    pub fn stall_grace(&self) -> Option<Duration> {
        self.stall_guard
            .unwrap_or(DEFAULT_STALL_GUARD)
            .then(|| Duration::from_millis(self.stall_grace_ms.unwrap_or(DEFAULT_STALL_GRACE_MS)))
    }

    /// Configured seed hues; validation guarantees each is below [`HUE_SPACE`].
    pub fn seed_hues(&self) -> Vec<u16> {
        match &self.seed_hues {
            Some(hues) => hues.iter().map(|&h| (h % HUE_SPACE) as u16).collect(),
            None => DEFAULT_SEED_HUES.to_vec(),
        }
    }

    pub fn excluded(&self) -> Vec<String> {
        match &self.exclude {
            Some(names) => names.clone(),
            None => DEFAULT_EXCLUDED_LIGHTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Apply `HUE_IP` / `HUE_USER` from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(ip) = std::env::var("HUE_IP")
            && !ip.is_empty()
        {
            self.bridge_ip = Some(ip);
        }
        if let Ok(user) = std::env::var("HUE_USER")
            && !user.is_empty()
        {
            self.username = Some(user);
        }
    }

    /// Print the effective settings as an indented block.
    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        match &self.bridge_ip {
            Some(ip) => log_indented!("Bridge: {ip}"),
            None => log_indented!("Bridge: discover"),
        }
        log_indented!(
            "Registered: {}",
            if self.username.is_some() { "yes" } else { "no" }
        );
        log_indented!("Duration: {}s", self.duration().as_secs());
        log_indented!("Pacing: {}ms", self.pacing().as_millis());
        log_indented!(
            "Stagger: {}ms",
            self.stagger_ms.unwrap_or(DEFAULT_STAGGER_MS)
        );
        log_indented!(
            "Jitter range: {}",
            self.jitter_range.unwrap_or(DEFAULT_JITTER_RANGE)
        );
        log_indented!("Seed hues: {:?}", self.seed_hues());
        log_indented!("Drift: {}", self.drift.unwrap_or_default().as_str());
        match self.stall_grace() {
            Some(grace) => log_indented!("Stall guard: on ({}ms grace)", grace.as_millis()),
            None => log_indented!("Stall guard: off"),
        }
        let excluded = self.excluded();
        if !excluded.is_empty() {
            log_indented!("Excluded: {}", excluded.join(", "));
        }
    }
}

#[cfg(test)]
mod tests;
