//! Command-line argument parsing and processing.
//!
//! This module handles parsing of command-line arguments and provides a clean
//! interface for the main application logic. It supports the standard help,
//! version, and debug flags, a handful of value-taking options, and the
//! `lights`, `register`, and `help` commands.

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the oscillation sequence with these settings
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        duration: Option<u64>, // seconds, overrides the config file
        log_file: Option<String>,
    },
    /// List the bridge's lights
    Lights {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Register with the bridge and store the issued username
    Register {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Help for a specific command, or general help
    Help(Option<String>),

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first argument is the program name and is skipped. Flags may appear
    /// before or after the command. Help and version flags take precedence
    /// over everything else.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut unknown_arg_found = false;
        let mut config_dir: Option<String> = None;
        let mut duration: Option<u64> = None;
        let mut log_file: Option<String> = None;
        let mut command: Option<String> = None;
        let mut command_args: Vec<String> = Vec::new();

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut iter = args_vec.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => match iter.next() {
                    Some(dir) => config_dir = Some(dir),
                    None => {
                        log_warning_standalone!("Missing directory for {}", arg);
                        unknown_arg_found = true;
                    }
                },
                "--duration" | "-D" => match iter.next().map(|v| v.parse::<u64>()) {
                    Some(Ok(secs)) if secs > 0 => duration = Some(secs),
                    Some(_) => {
                        log_warning_standalone!("--duration needs a positive number of seconds");
                        unknown_arg_found = true;
                    }
                    None => {
                        log_warning_standalone!("Missing value for {}", arg);
                        unknown_arg_found = true;
                    }
                },
                "--log" => match iter.next() {
                    Some(path) => log_file = Some(path),
                    None => {
                        log_warning_standalone!("Missing path for --log");
                        unknown_arg_found = true;
                    }
                },
                _ if arg.starts_with('-') => {
                    log_warning_standalone!("Unknown argument: {}", arg);
                    unknown_arg_found = true;
                }
                _ if command.is_none() => command = Some(arg),
                _ => command_args.push(arg),
            }
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if display_help {
            CliAction::ShowHelp
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else {
            match command.as_deref() {
                None => CliAction::Run {
                    debug_enabled,
                    config_dir,
                    duration,
                    log_file,
                },
                Some("lights" | "l") if command_args.is_empty() => CliAction::Lights {
                    debug_enabled,
                    config_dir,
                },
                Some("register" | "r") if command_args.is_empty() => CliAction::Register {
                    debug_enabled,
                    config_dir,
                },
                Some("help" | "h") if command_args.len() <= 1 => {
                    CliAction::Help(command_args.into_iter().next())
                }
                Some(other) => {
                    log_warning_standalone!("Unexpected argument: {}", other);
                    CliAction::ShowHelpDueToError
                }
            }
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("dreamhouse [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>      Use custom configuration directory");
    log_indented!("-d, --debug             Enable detailed debug output");
    log_indented!("-D, --duration <secs>   Run length, overrides the config file");
    log_indented!("-h, --help              Print help information");
    log_indented!("    --log <path>        Write output to a file instead of the terminal");
    log_indented!("-V, --version           Print version information");
    log_block_start!("Commands:");
    log_indented!("(none)                  Run the color sequence");
    log_indented!("lights, l               List the bridge's lights");
    log_indented!("register, r             Pair with the bridge (press the link button)");
    log_indented!("help, h [COMMAND]       Show detailed help for a command");
    log_end!();
}
