//! Application coordinator that manages the complete lifecycle of a run.
//!
//! This module handles resource acquisition and initialization before handing
//! off to [`Core`]:
//! - Configuration loading (and the `--duration` override)
//! - Signal handler setup
//! - Bridge discovery when no address is configured
//! - Registration when no username is configured
//! - Light enumeration
//!
//! ```no_run
//! use dreamhouse::Dreamhouse;
//!
//! # fn main() -> anyhow::Result<()> {
//! Dreamhouse::new(false).with_duration(Some(30)).run()?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};

use crate::{
    bridge,
    commands::register::register_and_store,
    common::logger::Log,
    config,
    core::{Core, CoreParams},
    device::LightController,
    io::signals::setup_signal_handler,
};

/// Builder for configuring and running one oscillation sequence.
pub struct Dreamhouse {
    debug_enabled: bool,
    duration: Option<u64>,
    show_headers: bool,
}

impl Dreamhouse {
    /// Create a new runner with defaults matching a normal run
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            duration: None,
            show_headers: true,
        }
    }

    /// Override the configured run length (seconds)
    pub fn with_duration(mut self, duration: Option<u64>) -> Self {
        self.duration = duration;
        self
    }

    /// Skip the version header
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Execute the run: load config, connect, animate every light, restore.
    pub fn run(self) -> Result<()> {
        Log::set_debug(self.debug_enabled);

        if self.show_headers {
            log_version!();
        }

        let mut config = config::load()?;
        if let Some(duration) = self.duration {
            config.duration = Some(duration);
            config::validation::validate_config(&config)
                .context("Invalid --duration override")?;
        }
        config.log_config();

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        let mut bridge = bridge::connect(&config)?;
        if bridge.username.is_none() {
            log_block_start!("No username configured, starting registration");
            let username = register_and_store(&mut bridge, &signal_state.running)?;
            config.username = Some(username);
        }

        let devices = bridge
            .enumerate()
            .with_context(|| format!("Failed to enumerate lights on {}", bridge.address()))?;
        log_block_start!(
            "Found {} light{} on bridge {}",
            devices.len(),
            if devices.len() == 1 { "" } else { "s" },
            bridge.address()
        );
        for device in &devices {
            log_indented!("{}", device.name());
        }

        let core = Core::new(CoreParams {
            devices,
            config,
            signal_state,
        });
        core.execute()?;

        log_end!();
        Ok(())
    }
}
