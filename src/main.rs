//! Main application entry point.
//!
//! Parses the command line and dispatches to the matching action. All real
//! work lives in the library: [`Dreamhouse`] for a run, `commands` for the
//! one-shot commands.

use anyhow::Result;

use dreamhouse::Dreamhouse;
use dreamhouse::args::{self, CliAction, ParsedArgs};
use dreamhouse::commands;
use dreamhouse::common::constants::EXIT_FAILURE;
use dreamhouse::common::logger::Log;
use dreamhouse::config;
use dreamhouse::log_error_exit;

fn main() {
    let parsed_args = ParsedArgs::from_env();

    // The guard must outlive dispatch so the final error line reaches the file
    let log_guard = match &parsed_args.action {
        CliAction::Run {
            log_file: Some(path),
            ..
        } => match Log::start_file_logging(path.clone()) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("Failed to start file logging: {e:?}");
                std::process::exit(EXIT_FAILURE);
            }
        },
        _ => None,
    };

    if let Err(e) = dispatch(parsed_args.action) {
        log_error_exit!("dreamhouse failed");
        // Print the error chain in the default format which already looks good
        eprintln!("{:?}", e);
        drop(log_guard);
        std::process::exit(EXIT_FAILURE);
    }
}

fn dispatch(action: CliAction) -> Result<()> {
    match action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp | CliAction::ShowHelpDueToError => {
            args::display_help();
            Ok(())
        }
        CliAction::Help(command) => commands::help::run_help_command(command.as_deref()),
        CliAction::Run {
            debug_enabled,
            config_dir,
            duration,
            ..
        } => {
            config::set_config_dir(config_dir)?;
            Dreamhouse::new(debug_enabled).with_duration(duration).run()
        }
        CliAction::Lights {
            debug_enabled,
            config_dir,
        } => {
            config::set_config_dir(config_dir)?;
            commands::lights::handle_lights_command(debug_enabled)
        }
        CliAction::Register {
            debug_enabled,
            config_dir,
        } => {
            config::set_config_dir(config_dir)?;
            commands::register::handle_register_command(debug_enabled)
        }
    }
}
