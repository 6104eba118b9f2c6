//! Per-device animation worker.
//!
//! A worker owns one light for the whole run. It captures the light's state,
//! renders pool hues in lockstep rounds with its peers until the deadline, and
//! then writes the captured state back.
//!
//! The restore write is bound to [`RestoreGuard`]'s `Drop`, so it happens on
//! every exit path once the original state has been read: normal completion,
//! a render error propagated with `?`, a cancelled run, or a panic.

use anyhow::{Context, Result};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::common::utils::format_ms;
use crate::core::barrier::{ArriveOutcome, RoundBarrier};
use crate::core::pool::HuePool;
use crate::device::{LightDevice, RenderState, StateUpdate};

/// Lifecycle of a single worker.
///
/// `Restoring` is entered from both `Succeeded` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Starting,
    Animating,
    Succeeded,
    Failed,
    Restoring,
    Done,
}

/// Why an animation loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The run deadline passed.
    Deadline,
    /// The run-scoped running flag was cleared by a shutdown request or the run supervisor.
    Cancelled,
    /// A round never completed before the stall guard gave up.
    Stalled,
}

/// Timing knobs shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct SequenceTiming {
    pub pacing: Duration,
    pub stagger_ms: u64,
    pub jitter_range: u32,
    pub transition_time: u16,
    /// How long past the deadline a barrier wait may block; `None` waits
    /// until the round completes or the run is cancelled.
    pub stall_grace: Option<Duration>,
}

impl SequenceTiming {
    /// Pre-render delay for worker `index` in iteration `count`.
    ///
    /// The modulus changes every iteration and differs per worker, so lights
    /// rarely hit the network in the same millisecond.
    pub fn stagger(&self, count: usize, index: usize) -> Duration {
        Duration::from_millis(self.stagger_ms % (count as u64 + index as u64 + 1))
    }
}

/// Outcome of a worker that finished without a render error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub name: String,
    pub rounds: usize,
    pub exit: LoopExit,
}

/// Owns a light and writes its original state back when dropped.
pub struct RestoreGuard {
    device: Box<dyn LightDevice>,
    original: StateUpdate,
}

impl RestoreGuard {
    pub fn new(device: Box<dyn LightDevice>, original: StateUpdate) -> Self {
        Self { device, original }
    }
}

impl Deref for RestoreGuard {
    type Target = dyn LightDevice;

    fn deref(&self) -> &Self::Target {
        self.device.as_ref()
    }
}

impl DerefMut for RestoreGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.device.as_mut()
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        let name = self.device.name().to_string();
        match self.device.write_state(&self.original) {
            Ok(()) => log_debug!("{name}: restored original state"),
            Err(e) => log_warning!("{name}: failed to restore original state: {e}"),
        }
    }
}

/// One device's animate → restore lifecycle.
pub struct DeviceWorker<'a> {
    index: usize,
    pool: &'a HuePool,
    barrier: &'a RoundBarrier,
    timing: &'a SequenceTiming,
    deadline: Instant,
    running: &'a AtomicBool,
    phase: WorkerPhase,
}

impl<'a> DeviceWorker<'a> {
    pub fn new(
        index: usize,
        pool: &'a HuePool,
        barrier: &'a RoundBarrier,
        timing: &'a SequenceTiming,
        deadline: Instant,
        running: &'a AtomicBool,
    ) -> Self {
        Self {
            index,
            pool,
            barrier,
            timing,
            deadline,
            running,
            phase: WorkerPhase::Starting,
        }
    }

    fn enter(&mut self, phase: WorkerPhase, name: &str) {
        log_debug!("{name}: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Run the full lifecycle for `device`.
    ///
    /// A failed initial read returns an error without any restore write since
    /// nothing was captured. Once the read succeeds exactly one restore write
    /// is attempted, whatever happens afterwards.
    pub fn run(mut self, mut device: Box<dyn LightDevice>) -> Result<WorkerReport> {
        let name = device.name().to_string();

        let original = device
            .read_state()
            .with_context(|| format!("{name}: failed to read state"))?;

        let mut guard = RestoreGuard::new(device, original.to_restore_update());

        self.enter(WorkerPhase::Animating, &name);
        let outcome = self.animate(&mut guard, &name);

        let next = if outcome.is_ok() {
            WorkerPhase::Succeeded
        } else {
            WorkerPhase::Failed
        };
        self.enter(next, &name);

        self.enter(WorkerPhase::Restoring, &name);
        drop(guard);
        self.enter(WorkerPhase::Done, &name);

        outcome
    }

    fn animate(&self, device: &mut RestoreGuard, name: &str) -> Result<WorkerReport> {
        let stall_deadline = self.timing.stall_grace.map(|grace| self.deadline + grace);
        let mut count = 0;

        let exit = loop {
            if !self.running.load(Ordering::SeqCst) {
                break LoopExit::Cancelled;
            }
            // Judged on the shared round start so every party leaves after the same round
            if self.barrier.round_started() >= self.deadline {
                break LoopExit::Deadline;
            }

            std::thread::sleep(self.timing.stagger(count, self.index));

            let hue = self.pool.take_and_return(self.timing.jitter_range)?;
            let update = StateUpdate::from(RenderState::new(hue, self.timing.transition_time));

            let start = Instant::now();
            device
                .write_state(&update)
                .with_context(|| format!("{name}: failed to write state"))?;
            log_debug!(
                "{name}: hue={hue} duration={} count={count}",
                format_ms(start.elapsed())
            );

            std::thread::sleep(self.timing.pacing);
            count += 1;

            match self.barrier.arrive_until(stall_deadline, self.running) {
                ArriveOutcome::Released => {}
                ArriveOutcome::Cancelled => break LoopExit::Cancelled,
                ArriveOutcome::Expired => {
                    log_warning!("{name}: round {count} never completed, leaving the sequence");
                    break LoopExit::Stalled;
                }
            }
        };

        Ok(WorkerReport {
            name: name.to_string(),
            rounds: count,
            exit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::logger::Log;
    use crate::config::DriftMode;
    use crate::device::{LightState, MockLightDevice};

    fn original_state() -> LightState {
        LightState {
            on: false,
            bri: Some(120),
            hue: Some(8402),
            sat: Some(140),
            ct: Some(366),
            xy: Some([0.4573, 0.41]),
            alert: Some("none".to_string()),
            effect: Some("none".to_string()),
        }
    }

    fn timing() -> SequenceTiming {
        SequenceTiming {
            pacing: Duration::from_millis(10),
            stagger_ms: 0,
            jitter_range: 500,
            transition_time: 1,
            stall_grace: Some(Duration::from_millis(200)),
        }
    }

    fn pool() -> HuePool {
        let pool = HuePool::new(2, DriftMode::Render).unwrap();
        pool.seed(&[20000, 0]).unwrap();
        pool
    }

    fn is_restore(update: &StateUpdate) -> bool {
        *update == original_state().to_restore_update()
    }

    fn mock_light(name: &str) -> MockLightDevice {
        let mut light = MockLightDevice::new();
        light.expect_name().return_const(name.to_string());
        light
            .expect_read_state()
            .times(1)
            .returning(|| Ok(original_state()));
        light
    }

    #[test]
    fn test_stagger_varies_per_iteration_and_index() {
        let timing = SequenceTiming {
            stagger_ms: 10,
            ..timing()
        };
        assert_eq!(timing.stagger(0, 0), Duration::from_millis(0));
        assert_eq!(timing.stagger(2, 0), Duration::from_millis(1));
        assert_eq!(timing.stagger(0, 3), Duration::from_millis(2));
        assert_eq!(timing.stagger(20, 0), Duration::from_millis(10));
    }

    #[test]
    fn test_deadline_path_restores_exactly_once() {
        Log::set_enabled(false);
        let mut light = mock_light("Hallway");
        light
            .expect_write_state()
            .withf(|u| !is_restore(u))
            .returning(|u| {
                assert_eq!(u.sat, Some(254));
                assert_eq!(u.on, Some(true));
                Ok(())
            });
        light
            .expect_write_state()
            .withf(is_restore)
            .times(1)
            .returning(|_| Ok(()));

        let pool = pool();
        let barrier = RoundBarrier::new(1);
        let running = AtomicBool::new(true);
        let timing = timing();
        let deadline = Instant::now() + Duration::from_millis(150);

        let worker = DeviceWorker::new(0, &pool, &barrier, &timing, deadline, &running);
        let report = worker.run(Box::new(light)).unwrap();

        assert_eq!(report.name, "Hallway");
        assert_eq!(report.exit, LoopExit::Deadline);
        assert!(report.rounds >= 1);
        assert!(Instant::now() >= deadline);
        assert_eq!(pool.len(), pool.capacity());
    }

    #[test]
    fn test_round_begun_before_deadline_is_completed() {
        Log::set_enabled(false);
        let mut light = mock_light("Landing");
        light
            .expect_write_state()
            .withf(|u| !is_restore(u))
            .times(1)
            .returning(|_| Ok(()));
        light
            .expect_write_state()
            .withf(is_restore)
            .times(1)
            .returning(|_| Ok(()));

        let pool = pool();
        let barrier = RoundBarrier::new(1);
        std::thread::sleep(Duration::from_millis(5));
        // Already past when the worker starts, but after round 0 began
        let deadline = Instant::now();
        let running = AtomicBool::new(true);
        let timing = timing();

        let worker = DeviceWorker::new(0, &pool, &barrier, &timing, deadline, &running);
        let report = worker.run(Box::new(light)).unwrap();

        assert_eq!(report.rounds, 1);
        assert_eq!(report.exit, LoopExit::Deadline);
    }

    #[test]
    fn test_render_error_restores_and_names_the_light() {
        Log::set_enabled(false);
        let mut light = mock_light("Porch");
        light
            .expect_write_state()
            .withf(|u| !is_restore(u))
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        light
            .expect_write_state()
            .withf(is_restore)
            .times(1)
            .returning(|_| Ok(()));

        let pool = pool();
        let barrier = RoundBarrier::new(1);
        let running = AtomicBool::new(true);
        let timing = timing();
        let deadline = Instant::now() + Duration::from_secs(5);

        let worker = DeviceWorker::new(0, &pool, &barrier, &timing, deadline, &running);
        let err = worker.run(Box::new(light)).unwrap_err();

        assert_eq!(err.to_string(), "Porch: failed to write state");
        assert_eq!(err.root_cause().to_string(), "connection reset");
    }

    #[test]
    fn test_restore_failure_is_not_propagated() {
        Log::set_enabled(false);
        let mut light = mock_light("Attic");
        light
            .expect_write_state()
            .withf(is_restore)
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("bridge unreachable")));

        let pool = pool();
        let barrier = RoundBarrier::new(1);
        let running = AtomicBool::new(false);
        let timing = timing();

        let worker = DeviceWorker::new(0, &pool, &barrier, &timing, Instant::now(), &running);
        let report = worker.run(Box::new(light)).unwrap();
        assert_eq!(report.exit, LoopExit::Cancelled);
        assert_eq!(report.rounds, 0);
    }

    #[test]
    fn test_failed_read_skips_restore() {
        Log::set_enabled(false);
        let mut light = MockLightDevice::new();
        light.expect_name().return_const("Cellar".to_string());
        light
            .expect_read_state()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("timed out")));
        light.expect_write_state().times(0);

        let pool = pool();
        let barrier = RoundBarrier::new(1);
        let running = AtomicBool::new(true);
        let timing = timing();
        let deadline = Instant::now() + Duration::from_secs(1);

        let worker = DeviceWorker::new(0, &pool, &barrier, &timing, deadline, &running);
        let err = worker.run(Box::new(light)).unwrap_err();
        assert_eq!(err.to_string(), "Cellar: failed to read state");
    }

    #[test]
    fn test_expired_round_ends_as_stalled() {
        Log::set_enabled(false);
        let mut light = mock_light("Kitchen");
        light
            .expect_write_state()
            .withf(|u| !is_restore(u))
            .times(1)
            .returning(|_| Ok(()));
        light
            .expect_write_state()
            .withf(is_restore)
            .times(1)
            .returning(|_| Ok(()));

        let pool = pool();
        // The second party never shows up
        let barrier = RoundBarrier::new(2);
        let running = AtomicBool::new(true);
        let timing = SequenceTiming {
            stall_grace: Some(Duration::from_millis(50)),
            ..timing()
        };
        let deadline = Instant::now() + Duration::from_millis(50);

        let worker = DeviceWorker::new(0, &pool, &barrier, &timing, deadline, &running);
        let report = worker.run(Box::new(light)).unwrap();

        assert_eq!(report.exit, LoopExit::Stalled);
        assert_eq!(report.rounds, 1);
        assert_eq!(barrier.arrived(), 0);
    }

    #[test]
    fn test_guard_exposes_device_and_restores_on_drop() {
        Log::set_enabled(false);
        let mut light = MockLightDevice::new();
        light.expect_name().return_const("Study".to_string());
        light
            .expect_write_state()
            .withf(is_restore)
            .times(1)
            .returning(|_| Ok(()));

        let guard = RestoreGuard::new(Box::new(light), original_state().to_restore_update());
        assert_eq!(guard.name(), "Study");
        drop(guard);
    }
}
