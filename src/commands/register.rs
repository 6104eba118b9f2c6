//! `dreamhouse register`: pair with the bridge and store the username.

use anyhow::Result;

use crate::bridge::{self, Bridge};
use crate::common::utils::device_type;
use crate::config;
use crate::io::signals::setup_signal_handler;

/// Run the registration loop and persist the issued username.
pub fn handle_register_command(debug_enabled: bool) -> Result<()> {
    crate::common::logger::Log::set_debug(debug_enabled);
    log_version!();

    let config = config::load()?;
    if config.username.is_some() {
        log_block_start!("A username is already configured; registering a new one");
    }

    let signal_state = setup_signal_handler(debug_enabled)?;
    let mut bridge = bridge::connect(&config)?;
    register_and_store(&mut bridge, &signal_state.running)?;

    log_end!();
    Ok(())
}

/// Register `bridge` and write the new username into the active config file.
pub fn register_and_store(
    bridge: &mut Bridge,
    running: &std::sync::atomic::AtomicBool,
) -> Result<String> {
    let username = bridge.register(&device_type(), running)?;
    config::update_username(&config::get_config_path()?, &username)?;
    Ok(username)
}

pub fn display_help() {
    log_version!();
    log_block_start!("register - Pair with the bridge");
    log_block_start!("Usage: dreamhouse register");
    log_block_start!("Steps:");
    log_indented!("1. Run the command");
    log_indented!("2. Press the link button on the bridge");
    log_indented!("3. The issued username is saved to dreamhouse.toml");
    log_pipe!();
    log_info!("A normal run registers automatically when no username is set.");
    log_end!();
}
