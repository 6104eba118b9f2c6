//! `dreamhouse lights`: list the bridge's lights.
//!
//! Useful for finding the exact names to put in `exclude`.

use anyhow::Result;

use crate::bridge;
use crate::config::{self, Config};

/// List every light with its id, power state and hue, marking excluded ones.
pub fn handle_lights_command(debug_enabled: bool) -> Result<()> {
    crate::common::logger::Log::set_debug(debug_enabled);
    log_version!();

    let config = config::load()?;
    let bridge = bridge::connect(&config)?;
    let lights = bridge.lights()?;

    log_block_start!(
        "Bridge {} has {} light{}",
        bridge.address(),
        lights.len(),
        if lights.len() == 1 { "" } else { "s" }
    );
    for line in format_light_lines(&lights, &config) {
        log_indented!("{line}");
    }

    log_end!();
    Ok(())
}

/// One display line per light: `[id] name (on, hue 8402)`.
pub(crate) fn format_light_lines(lights: &[bridge::LightInfo], config: &Config) -> Vec<String> {
    let excluded = config.excluded();
    lights
        .iter()
        .map(|light| {
            let power = if light.state.on { "on" } else { "off" };
            let hue = light
                .state
                .hue
                .map_or_else(|| "no color".to_string(), |h| format!("hue {h}"));
            let marker = if excluded.contains(&light.name) {
                " [excluded]"
            } else {
                ""
            };
            format!("[{}] {} ({power}, {hue}){marker}", light.id, light.name)
        })
        .collect()
}

pub fn display_help() {
    log_version!();
    log_block_start!("lights - List the bridge's lights");
    log_block_start!("Usage: dreamhouse lights");
    log_block_start!("Output:");
    log_indented!("[id] name (power, hue)");
    log_indented!("Lights named in 'exclude' are marked [excluded]");
    log_end!();
}
