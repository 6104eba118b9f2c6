//! Signal handling for dreamhouse.
//!
//! SIGINT, SIGTERM and SIGHUP all mean "stop": they clear the shared `running`
//! flag. Workers check that flag before every render and while waiting at the
//! round barrier, so a signal ends the sequence early but still lets every
//! light receive its restore write.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

/// Signal handling state shared between threads
#[derive(Clone)]
pub struct SignalState {
    /// Atomic flag indicating if the application should keep running
    pub running: Arc<AtomicBool>,
}

impl SignalState {
    /// State with no OS handlers attached; the flag only changes via [`SignalState::request_shutdown`].
    pub fn detached() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Register shutdown signal handlers and return the shared state.
///
/// A background thread waits for the signals. The first one clears the
/// running flag; a second one while shutdown is in progress is logged and
/// otherwise ignored so restores are not cut short.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let state = SignalState::detached();

    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGHUP]).context("failed to register signal handlers")?;

    let running_clone = state.running.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            let already_stopping = !running_clone.swap(false, Ordering::SeqCst);

            log_pipe!();
            if already_stopping {
                log_info!("Shutdown already in progress, waiting for lights to restore...");
                continue;
            }

            match sig {
                SIGINT if debug_enabled => {
                    log_info!("Received SIGINT (Ctrl+C), restoring lights...")
                }
                SIGINT => log_info!("Received interrupt signal, restoring lights..."),
                SIGTERM => log_info!("Received termination request, restoring lights..."),
                SIGHUP => log_info!("Received hangup signal, restoring lights..."),
                _ => log_info!("Received signal {sig}, restoring lights..."),
            }
        }
    });

    Ok(state)
}
