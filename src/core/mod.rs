//! Run orchestration for the oscillation sequence.
//!
//! This module wires the pieces of a run together:
//!
//! - one [`HuePool`] with capacity `lights + 1`, seeded before any worker starts
//! - one background diffuser thread perturbing idle pool entries
//! - one [`RoundBarrier`] shared by all workers
//! - one [`DeviceWorker`] thread per light
//! - one supervisor thread owning the run's time limit
//!
//! All threads are scoped to [`run_sequence`], so nothing outlives the run.
//! Worker errors are collected first-error-wins: the error of the worker that
//! failed earliest is returned once every worker has restored its light.
//!
//! Workers never see the process-wide shutdown flag directly. They watch a
//! run-scoped flag that the supervisor clears on a shutdown request, on the
//! first worker failure, or at the cutoff (deadline plus stall grace). That
//! bounds the run even when barrier waits have no deadline of their own.

pub mod barrier;
pub mod pool;
pub mod worker;

use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::common::constants::*;
use crate::config::{Config, DriftMode};
use crate::device::LightDevice;
use crate::io::signals::SignalState;

pub use barrier::{ArriveOutcome, RoundBarrier};
pub use pool::HuePool;
pub use worker::{DeviceWorker, LoopExit, SequenceTiming, WorkerReport};

/// Everything a run needs besides the lights themselves.
#[derive(Debug, Clone)]
pub struct SequenceParams {
    pub duration: Duration,
    pub exclude: Vec<String>,
    pub seed_hues: Vec<u16>,
    pub drift: DriftMode,
    pub diffuse_interval: Duration,
    pub timing: SequenceTiming,
}

impl SequenceParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            duration: config.duration(),
            exclude: config.excluded(),
            seed_hues: config.seed_hues(),
            drift: config.drift.unwrap_or_default(),
            diffuse_interval: config.diffuse_interval(),
            timing: SequenceTiming {
                pacing: config.pacing(),
                stagger_ms: config.stagger_ms.unwrap_or(DEFAULT_STAGGER_MS),
                jitter_range: config.jitter_range.unwrap_or(DEFAULT_JITTER_RANGE),
                transition_time: config.transition_time.unwrap_or(DEFAULT_TRANSITION_TIME),
                stall_grace: config.stall_grace(),
            },
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Reports of workers that finished without error, in light order.
    pub workers: Vec<WorkerReport>,
    /// Workers that ended with an error or a panic.
    pub failed: usize,
    /// Pool entries replaced by the diffuser.
    pub diffused: usize,
    pub elapsed: Duration,
}

/// Drop lights whose name is on the exclusion list.
pub fn filter_excluded(
    devices: Vec<Box<dyn LightDevice>>,
    excluded: &[String],
) -> Vec<Box<dyn LightDevice>> {
    devices
        .into_iter()
        .filter(|device| {
            let skip = excluded.iter().any(|name| name == device.name());
            if skip {
                log_indented!("Skipping excluded light: {}", device.name());
            }
            !skip
        })
        .collect()
}

/// First-error-wins slot shared by the worker threads.
///
/// Errors are recorded when they happen, so "first" means first in time and
/// not first in light order.
struct FirstError {
    slot: Mutex<Option<anyhow::Error>>,
    failed: AtomicBool,
}

impl FirstError {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            failed: AtomicBool::new(false),
        }
    }

    fn record(&self, error: anyhow::Error) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        } else {
            log_warning!("Additional failure: {error:#}");
        }
        self.failed.store(true, Ordering::SeqCst);
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    fn take(self) -> Option<anyhow::Error> {
        self.slot
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Animate `devices` for `params.duration`, then restore each of them.
///
/// Returns the earliest worker error, if any, only after every worker has
/// finished and attempted its restore write.
pub fn run_sequence(
    devices: Vec<Box<dyn LightDevice>>,
    params: &SequenceParams,
    running: &AtomicBool,
) -> Result<RunReport> {
    let devices = filter_excluded(devices, &params.exclude);
    if devices.is_empty() {
        log_warning!("No lights left to animate");
        return Ok(RunReport::default());
    }

    let count = devices.len();
    let capacity = count + 1;

    let pool = HuePool::new(capacity, params.drift)?;
    pool.seed(&pool::seed_values(
        &params.seed_hues,
        capacity,
        &mut rand::thread_rng(),
    ))?;
    let barrier = RoundBarrier::new(count);

    log_block_start!(
        "Animating {} light{} for {}s",
        count,
        if count == 1 { "" } else { "s" },
        params.duration.as_secs()
    );
    log_indented!("Pool: {} hues, drift {}", capacity, params.drift.as_str());

    let started = Instant::now();
    let deadline = started + params.duration;
    let cutoff = deadline
        + params
            .timing
            .stall_grace
            .unwrap_or(Duration::from_millis(DEFAULT_STALL_GRACE_MS));
    let first_error = FirstError::new();
    let run_active = AtomicBool::new(true);
    let workers_done = AtomicBool::new(false);
    let stop_diffuser = AtomicBool::new(false);
    let mut report = RunReport::default();

    std::thread::scope(|s| {
        let diffuser = s.spawn(|| pool.run_diffuser(params.diffuse_interval, &stop_diffuser));
        s.spawn(|| supervise(running, &run_active, &first_error, cutoff, &workers_done));

        let handles: Vec<_> = devices
            .into_iter()
            .enumerate()
            .map(|(index, device)| {
                let name = device.name().to_string();
                let worker = DeviceWorker::new(
                    index,
                    &pool,
                    &barrier,
                    &params.timing,
                    deadline,
                    &run_active,
                );
                let first_error = &first_error;
                let worker_name = name.clone();
                let handle = s.spawn(move || {
                    // The restore guard still runs while the panic unwinds
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.run(device)))
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("{worker_name}: worker panicked")));
                    match outcome {
                        Ok(report) => Some(report),
                        Err(e) => {
                            first_error.record(e);
                            None
                        }
                    }
                });
                (name, handle)
            })
            .collect();

        for (name, handle) in handles {
            match handle.join() {
                Ok(Some(worker_report)) => report.workers.push(worker_report),
                Ok(None) => report.failed += 1,
                Err(_) => {
                    report.failed += 1;
                    first_error.record(anyhow::anyhow!("{name}: worker panicked"));
                }
            }
        }

        workers_done.store(true, Ordering::SeqCst);
        stop_diffuser.store(true, Ordering::SeqCst);
        report.diffused = diffuser.join().unwrap_or_default();
    });

    report.elapsed = started.elapsed();
    log_report(&report);

    match first_error.take() {
        Some(error) => Err(error),
        None => Ok(report),
    }
}

/// Clear `run_active` on shutdown, on the first worker failure, or at `cutoff`.
///
/// Polls in [`BARRIER_POLL_MS`] slices and returns once the flag is cleared or
/// every worker has finished.
fn supervise(
    running: &AtomicBool,
    run_active: &AtomicBool,
    first_error: &FirstError,
    cutoff: Instant,
    workers_done: &AtomicBool,
) {
    let poll = Duration::from_millis(BARRIER_POLL_MS);

    while !workers_done.load(Ordering::SeqCst) {
        if !running.load(Ordering::SeqCst) {
            run_active.store(false, Ordering::SeqCst);
            return;
        }
        if first_error.has_failed() {
            log_decorated!("Stopping the remaining lights after a failure");
            run_active.store(false, Ordering::SeqCst);
            return;
        }
        if Instant::now() >= cutoff {
            log_warning!("Run overran its deadline, stopping the remaining lights");
            run_active.store(false, Ordering::SeqCst);
            return;
        }
        std::thread::sleep(poll);
    }
}

fn log_report(report: &RunReport) {
    log_block_start!(
        "Sequence finished after {:.1}s",
        report.elapsed.as_secs_f64()
    );
    for worker in &report.workers {
        let exit = match worker.exit {
            LoopExit::Deadline => "deadline",
            LoopExit::Cancelled => "cancelled",
            LoopExit::Stalled => "stalled",
        };
        log_indented!("{}: {} rounds ({exit})", worker.name, worker.rounds);
    }
    if report.failed > 0 {
        log_indented!("Failed lights: {}", report.failed);
    }
    log_debug!("Diffuser replaced {} pool entries", report.diffused);
}

/// Parameters for creating a [`Core`].
pub struct CoreParams {
    pub devices: Vec<Box<dyn LightDevice>>,
    pub config: Config,
    pub signal_state: SignalState,
}

/// One oscillation run against an already enumerated set of lights.
pub struct Core {
    devices: Vec<Box<dyn LightDevice>>,
    params: SequenceParams,
    signal_state: SignalState,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        Self {
            devices: params.devices,
            params: SequenceParams::from_config(&params.config),
            signal_state: params.signal_state,
        }
    }

    /// Run the sequence to completion (deadline, signal, or failure).
    pub fn execute(self) -> Result<RunReport> {
        let report = run_sequence(self.devices, &self.params, &self.signal_state.running)?;

        if !self.signal_state.is_running() {
            log_block_start!("Stopped early by shutdown request");
        }
        Ok(report)
    }
}
