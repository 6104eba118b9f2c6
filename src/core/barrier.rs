//! Reusable round barrier for device workers.
//!
//! Every worker calls [`RoundBarrier::arrive`] (or [`RoundBarrier::arrive_until`])
//! once per round. The last arrival resets the counter and wakes everyone, so
//! no worker starts round `k + 1` before all of them have finished round `k`.
//!
//! A generation counter distinguishes "my round was released" from spurious
//! wakeups, and keeps a fast worker that re-enters the barrier from being
//! mistaken for a late arrival of the previous round.
//!
//! Each release also stamps the start of the next round. Every party of a
//! round reads the same stamp, so decisions taken from it (such as "has the
//! run deadline passed?") come out the same for all of them.
//!
//! If a worker exits early it never arrives again and the remaining parties
//! would wait forever. `arrive_until` bounds that wait with an optional
//! deadline and a shared `running` flag. A waiter that gives up withdraws its
//! arrival so the counter stays consistent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::common::constants::BARRIER_POLL_MS;

/// How a barrier wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArriveOutcome {
    /// All parties arrived; the round is complete.
    Released,
    /// The wait deadline passed before the round completed.
    Expired,
    /// The shared running flag was cleared while waiting.
    Cancelled,
}

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    round_started: Instant,
}

/// Counter + mutex + broadcast condition, reusable across unbounded rounds.
#[derive(Debug)]
pub struct RoundBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl RoundBarrier {
    /// Barrier for `parties` workers. A party size of zero is treated as one.
    pub fn new(parties: usize) -> Self {
        Self {
            parties: parties.max(1),
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                round_started: Instant::now(),
            }),
            released: Condvar::new(),
        }
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Number of workers currently waiting in this round.
    pub fn arrived(&self) -> usize {
        self.lock().arrived
    }

    /// Number of completed rounds.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// When the current round began: barrier creation for round 0, otherwise
    /// the release of the previous round. Stable until this caller arrives.
    pub fn round_started(&self) -> Instant {
        self.lock().round_started
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        // Every update is a plain field store; a panicking holder cannot leave it torn
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arrive and block until the round completes, with no escape.
    pub fn arrive(&self) {
        let mut state = self.lock();
        if self.register_arrival(&mut state) {
            return;
        }

        let generation = state.generation;
        while state.generation == generation {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Arrive and block until the round completes, `deadline` passes, or
    /// `running` is cleared, whichever comes first.
    pub fn arrive_until(&self, deadline: Option<Instant>, running: &AtomicBool) -> ArriveOutcome {
        let mut state = self.lock();
        if self.register_arrival(&mut state) {
            return ArriveOutcome::Released;
        }

        let generation = state.generation;
        let poll = Duration::from_millis(BARRIER_POLL_MS);

        loop {
            if state.generation != generation {
                return ArriveOutcome::Released;
            }
            if !running.load(Ordering::SeqCst) {
                state.arrived -= 1;
                return ArriveOutcome::Cancelled;
            }

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        state.arrived -= 1;
                        return ArriveOutcome::Expired;
                    }
                    poll.min(deadline - now)
                }
                None => poll,
            };

            state = self
                .released
                .wait_timeout(state, slice)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Count an arrival; completes the round if it is the last one.
    fn register_arrival(&self, state: &mut BarrierState) -> bool {
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            state.round_started = Instant::now();
            self.released.notify_all();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_single_party_never_blocks() {
        let barrier = RoundBarrier::new(1);
        let running = AtomicBool::new(true);

        for _ in 0..100 {
            barrier.arrive();
            assert_eq!(
                barrier.arrive_until(None, &running),
                ArriveOutcome::Released
            );
        }
        assert_eq!(barrier.arrived(), 0);
        assert_eq!(barrier.generation(), 200);
    }

    #[test]
    fn test_zero_parties_behaves_like_one() {
        let barrier = RoundBarrier::new(0);
        assert_eq!(barrier.parties(), 1);
        barrier.arrive();
    }

    #[test]
    fn test_no_worker_runs_ahead_of_a_round() {
        const PARTIES: usize = 4;
        const ROUNDS: usize = 50;

        let barrier = RoundBarrier::new(PARTIES);
        let completed = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..PARTIES {
                s.spawn(|| {
                    for round in 0..ROUNDS {
                        completed.fetch_add(1, Ordering::SeqCst);
                        barrier.arrive();
                        // Everyone has finished this round's work once released
                        assert!(completed.load(Ordering::SeqCst) >= (round + 1) * PARTIES);
                        // And nobody can have finished the next round yet
                        assert!(completed.load(Ordering::SeqCst) <= (round + 2) * PARTIES);
                    }
                });
            }
        });

        assert_eq!(completed.load(Ordering::SeqCst), PARTIES * ROUNDS);
        assert_eq!(barrier.arrived(), 0);
        assert_eq!(barrier.generation(), ROUNDS as u64);
    }

    #[test]
    fn test_counter_resets_after_each_round() {
        let barrier = RoundBarrier::new(2);

        std::thread::scope(|s| {
            for _ in 0..10 {
                let waiter = s.spawn(|| barrier.arrive());
                while barrier.arrived() != 1 {
                    std::thread::yield_now();
                }
                barrier.arrive();
                waiter.join().unwrap();
                assert_eq!(barrier.arrived(), 0);
            }
        });
    }

    #[test]
    fn test_round_start_is_shared_and_moves_only_on_release() {
        let barrier = RoundBarrier::new(2);
        let initial = barrier.round_started();

        std::thread::scope(|s| {
            let waiter = s.spawn(|| {
                barrier.arrive();
                barrier.round_started()
            });
            while barrier.arrived() != 1 {
                std::thread::yield_now();
            }
            // A pending arrival does not start a new round
            assert_eq!(barrier.round_started(), initial);

            std::thread::sleep(Duration::from_millis(5));
            barrier.arrive();
            let seen_by_waiter = waiter.join().unwrap();

            assert!(seen_by_waiter > initial);
            assert_eq!(seen_by_waiter, barrier.round_started());
        });
    }

    #[test]
    fn test_missing_peer_expires_at_deadline() {
        let barrier = RoundBarrier::new(2);
        let running = AtomicBool::new(true);

        let start = Instant::now();
        let outcome = barrier.arrive_until(Some(start + Duration::from_millis(120)), &running);

        assert_eq!(outcome, ArriveOutcome::Expired);
        assert!(start.elapsed() >= Duration::from_millis(120));
        // The withdrawn arrival leaves no trace in the counter
        assert_eq!(barrier.arrived(), 0);
        assert_eq!(barrier.generation(), 0);
    }

    #[test]
    fn test_cleared_running_flag_cancels_wait() {
        let barrier = RoundBarrier::new(3);
        let running = AtomicBool::new(true);

        std::thread::scope(|s| {
            let waiter = s.spawn(|| barrier.arrive_until(None, &running));
            while barrier.arrived() != 1 {
                std::thread::yield_now();
            }
            // Noticed at the next poll slice
            running.store(false, Ordering::SeqCst);
            assert_eq!(waiter.join().unwrap(), ArriveOutcome::Cancelled);
        });

        assert_eq!(barrier.arrived(), 0);
    }

    #[test]
    fn test_release_wins_over_later_deadline() {
        let barrier = RoundBarrier::new(2);
        let running = AtomicBool::new(true);
        let deadline = Instant::now() + Duration::from_secs(5);

        std::thread::scope(|s| {
            let waiter = s.spawn(|| barrier.arrive_until(Some(deadline), &running));
            while barrier.arrived() != 1 {
                std::thread::yield_now();
            }
            assert_eq!(
                barrier.arrive_until(Some(deadline), &running),
                ArriveOutcome::Released
            );
            assert_eq!(waiter.join().unwrap(), ArriveOutcome::Released);
        });
    }
}
