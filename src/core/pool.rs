//! Shared hue pool with background diffusion.
//!
//! The pool is a fixed-capacity reservoir of hue values that all device
//! workers draw from. Drawing from one shared reservoir keeps the lights'
//! colors correlated, and jittering every draw keeps them from being
//! identical.
//!
//! ## Invariant
//!
//! The pool holds exactly `capacity` values at every quiescent point. Nothing
//! is ever pushed without first being taken: a draw takes one value and pushes
//! one value back, and the diffuser does the same. Because every push is
//! preceded by its own take, a push always finds a free slot and never blocks
//! indefinitely.
//!
//! ## Drift
//!
//! With [`DriftMode::Render`] the drawn value goes back unchanged and only the
//! caller sees the jittered hue, so stored values never wander. With
//! [`DriftMode::Walk`] the jittered value is what goes back, which turns the
//! pool into a true random walk.
//!
//! ## Diffusion
//!
//! [`HuePool::run_diffuser`] is a background loop that replaces one idle entry
//! with a fresh random hue whenever no worker is waiting on the pool, so
//! entries that no worker happens to draw still change over time.

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::common::constants::HUE_SPACE;
use crate::config::DriftMode;

/// Fixed-capacity concurrent store of hue values.
pub struct HuePool {
    tx: Sender<u16>,
    rx: Receiver<u16>,
    capacity: usize,
    drift: DriftMode,
    // Workers currently blocked in (or about to enter) a take
    waiting: AtomicUsize,
    seeded: AtomicBool,
}

impl HuePool {
    /// Create an empty pool. Must be seeded before the first draw.
    pub fn new(capacity: usize, drift: DriftMode) -> Result<Self> {
        if capacity == 0 {
            anyhow::bail!("Hue pool capacity must be at least 1");
        }

        let (tx, rx) = channel::bounded(capacity);
        Ok(Self {
            tx,
            rx,
            capacity,
            drift,
            waiting: AtomicUsize::new(0),
            seeded: AtomicBool::new(false),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of values currently resting in the pool.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Fill the pool with exactly `capacity` values. Allowed once.
    pub fn seed(&self, values: &[u16]) -> Result<()> {
        if values.len() != self.capacity {
            anyhow::bail!(
                "Hue pool needs exactly {} seed values, got {}",
                self.capacity,
                values.len()
            );
        }
        if self.seeded.swap(true, Ordering::SeqCst) {
            anyhow::bail!("Hue pool has already been seeded");
        }

        for &value in values {
            self.tx
                .try_send(value)
                .context("Hue pool rejected a seed value")?;
        }
        Ok(())
    }

    /// Take one value, push it back, and hand out a jittered copy.
    ///
    /// The returned hue is the drawn value plus a uniform offset in
    /// `[-jitter_range/2, jitter_range/2)`, wrapped onto the hue wheel. Which
    /// value is drawn is arbitrary. Blocks while every value is held by other
    /// callers.
    pub fn take_and_return(&self, jitter_range: u32) -> Result<u16> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let taken = self.rx.recv();
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        let value = taken.context("Hue pool closed")?;

        let jittered = jitter(value, jitter_range, &mut rand::thread_rng());
        let returned = match self.drift {
            DriftMode::Render => value,
            DriftMode::Walk => jittered,
        };

        self.tx
            .send(returned)
            .context("Hue pool closed while returning a value")?;
        Ok(jittered)
    }

    /// One diffusion attempt: swap an idle entry for a random hue.
    ///
    /// Yields to real consumers: nothing is taken while a worker is waiting.
    /// Returns whether an entry was replaced.
    pub fn diffuse_once(&self, rng: &mut impl Rng) -> bool {
        if self.waiting.load(Ordering::SeqCst) > 0 {
            return false;
        }

        match self.rx.try_recv() {
            Ok(_) => {
                let fresh = rng.gen_range(0..HUE_SPACE) as u16;
                // A slot was freed by the take above and only takers push
                let _ = self.tx.send(fresh);
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Run diffusion until `stop` is set, pausing `interval` between attempts.
    pub fn run_diffuser(&self, interval: Duration, stop: &AtomicBool) -> usize {
        let mut rng = rand::thread_rng();
        let mut replaced = 0;

        while !stop.load(Ordering::SeqCst) {
            if self.diffuse_once(&mut rng) {
                replaced += 1;
            }
            std::thread::sleep(interval);
        }

        replaced
    }

    /// Snapshot of the resting values, for tests and diagnostics.
    ///
    /// Drains and refills the channel, so it must only be called while no
    /// other thread uses the pool.
    pub fn snapshot(&self) -> Vec<u16> {
        let values: Vec<u16> = self.rx.try_iter().collect();
        for &value in &values {
            let _ = self.tx.try_send(value);
        }
        values
    }
}

/// Offset `value` by a uniform amount in `[-range/2, range/2)`, wrapping at the wheel edge.
pub fn jitter(value: u16, jitter_range: u32, rng: &mut impl Rng) -> u16 {
    let half = i64::from(jitter_range / 2);
    if half == 0 {
        return value;
    }

    let offset = rng.gen_range(-half..half);
    (i64::from(value) + offset).rem_euclid(i64::from(HUE_SPACE)) as u16
}

/// Build exactly `capacity` seed values from the configured hues.
///
/// Configured hues are used in order; a shortfall is filled with random hues
/// and any surplus is dropped.
pub fn seed_values(configured: &[u16], capacity: usize, rng: &mut impl Rng) -> Vec<u16> {
    let mut values: Vec<u16> = configured.iter().copied().take(capacity).collect();
    while values.len() < capacity {
        values.push(rng.gen_range(0..HUE_SPACE) as u16);
    }
    values
}
