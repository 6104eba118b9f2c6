//! Structured logging with box-drawing output.
//!
//! Every line dreamhouse prints goes through the macros in this module so the
//! output keeps one visual shape:
//!
//! ```text
//! ┏ dreamhouse v0.3.0 ━━╸
//! ┃
//! ┣ Found 3 lights on bridge 192.168.1.20
//! ┃   Kitchen
//! ┣[DEBUG] Kitchen: hue=20112 duration=41ms count=3
//! ╹
//! ```
//!
//! ## Logging Conventions
//!
//! - **`log_block_start!`** opens a new conceptual block (phase changes, run start,
//!   registration). It prints a spacer pipe and then `┣ message`.
//! - **`log_decorated!`** continues the current block with `┣ message`.
//! - **`log_indented!`** lists details under the previous line as `┃   message`.
//! - **`log_pipe!`** inserts a bare `┃` spacer, normally before a leveled message
//!   that starts its own block.
//! - **`log_version!`** / **`log_end!`** frame the whole run.
//! - **`log_info!`** and **`log_warning!`** carry a colored `[LEVEL]` tag, and
//!   **`log_error_exit!`** closes the output on a fatal error. **`log_debug!`**
//!   additionally requires the debug flag, which is how per-render latency
//!   lines stay out of normal output.
//!
//! Output can be silenced process-wide with [`Log::set_enabled`], and redirected
//! to a file with [`Log::start_file_logging`].

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

// Set once when --log is given; every later line goes to the writer thread
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Process-wide logging switches.
pub struct Log;

impl Log {
    /// Enable or disable all output. Tests use this to keep runs quiet.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Turn `log_debug!` output on or off.
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Route all further output to `file_path`.
    ///
    /// Lines are handed to a dedicated writer thread so that device workers never
    /// block on disk I/O. ANSI color codes are stripped before writing. The
    /// returned guard flushes and joins the writer when dropped.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::File::create(&file_path)?;

            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => {
                        file.write_all(text.as_bytes())?;
                    }
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Wall-clock prefix used when logging to a file.
    ///
    /// Terminal output has no timestamps; the file log gets `[HH:MM:SS.mmm] ` so
    /// that render latencies from different workers can be lined up afterwards.
    pub fn timestamp_prefix() -> String {
        if LOG_CHANNEL.get().is_some() {
            format!("[{}] ", chrono::Local::now().format("%H:%M:%S%.3f"))
        } else {
            String::new()
        }
    }
}

/// Guard for file logging that ensures clean shutdown.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Write one or more already formatted lines. Public for macro access.
pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        // Whole lines in a single locked write so concurrent workers don't interleave
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = lock.write_all(text.as_bytes());
        let _ = lock.flush();
    }
}

// # Logging Macros

#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($marker:expr, $($arg:tt)+) => {{
        use $crate::common::logger::Log;
        if Log::is_enabled() {
            let prefix = Log::timestamp_prefix();
            let message = format!($($arg)+);
            $crate::common::logger::write_output(&format!("{prefix}{}{message}\n", $marker));
        }
    }};
}

/// Log a decorated message as part of the current block.
#[macro_export]
macro_rules! log_decorated {
    ($fmt:literal $($arg:tt)*) => { $crate::__log_line!("┣ ", $fmt $($arg)*) };
    ($expr:expr) => { $crate::__log_line!("┣ ", "{}", $expr) };
}

/// Log an indented detail line.
#[macro_export]
macro_rules! log_indented {
    ($fmt:literal $($arg:tt)*) => { $crate::__log_line!("┃   ", $fmt $($arg)*) };
    ($expr:expr) => { $crate::__log_line!("┃   ", "{}", $expr) };
}

/// Log a bare pipe for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::__log_line!("┃", "")
    };
}

/// Start a new block: spacer pipe followed by a decorated line.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => {{
        $crate::log_pipe!();
        $crate::log_decorated!($($arg)+);
    }};
}

/// Log the application version header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::__log_line!("┏ ", "dreamhouse v{} ━━╸", env!("CARGO_PKG_VERSION"))
    };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::__log_line!("╹", "")
    };
}

#[macro_export]
macro_rules! log_warning {
    ($fmt:literal $($arg:tt)*) => { $crate::__log_line!("┣[\x1b[33mWARNING\x1b[0m] ", $fmt $($arg)*) };
    ($expr:expr) => { $crate::__log_line!("┣[\x1b[33mWARNING\x1b[0m] ", "{}", $expr) };
}

/// Log a warning outside the box structure (used before the header is printed).
#[macro_export]
macro_rules! log_warning_standalone {
    ($fmt:literal $($arg:tt)*) => { $crate::__log_line!("[\x1b[33mWARNING\x1b[0m] ", $fmt $($arg)*) };
    ($expr:expr) => { $crate::__log_line!("[\x1b[33mWARNING\x1b[0m] ", "{}", $expr) };
}

/// Log an error that terminates the flow: spacer pipe, then a closing corner.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => {{
        $crate::log_pipe!();
        $crate::__log_line!("┗[\x1b[31mERROR\x1b[0m] ", $($arg)+);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($fmt:literal $($arg:tt)*) => { $crate::__log_line!("┣[\x1b[32mINFO\x1b[0m] ", $fmt $($arg)*) };
    ($expr:expr) => { $crate::__log_line!("┣[\x1b[32mINFO\x1b[0m] ", "{}", $expr) };
}

/// Log a debug message; only printed when the debug flag is set.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => {{
        if $crate::common::logger::Log::is_debug() {
            $crate::__log_line!("┣[\x1b[36mDEBUG\x1b[0m] ", $($arg)+);
        }
    }};
}
