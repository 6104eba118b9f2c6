//! Configuration validation functionality.
//!
//! Rejects values that would make a run impossible (zero-length sequences,
//! hues outside the wheel) or hammer the bridge (sub-10ms pacing).

use anyhow::Result;

use super::Config;
use crate::common::constants::*;

/// Validate every set field against its allowed range.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(ip) = &config.bridge_ip
        && ip.trim().is_empty()
    {
        anyhow::bail!("bridge_ip must not be empty (remove it to use discovery)");
    }

    if let Some(user) = &config.username
        && user.trim().is_empty()
    {
        anyhow::bail!("username must not be empty (remove it to register)");
    }

    if let Some(timeout) = config.request_timeout_ms
        && !(MINIMUM_REQUEST_TIMEOUT_MS..=MAXIMUM_REQUEST_TIMEOUT_MS).contains(&timeout)
    {
        anyhow::bail!(
            "request_timeout_ms ({} ms) must be between {} and {} milliseconds",
            timeout,
            MINIMUM_REQUEST_TIMEOUT_MS,
            MAXIMUM_REQUEST_TIMEOUT_MS
        );
    }

    if let Some(duration) = config.duration
        && !(MINIMUM_DURATION_SECS..=MAXIMUM_DURATION_SECS).contains(&duration)
    {
        anyhow::bail!(
            "duration ({} s) must be between {} and {} seconds",
            duration,
            MINIMUM_DURATION_SECS,
            MAXIMUM_DURATION_SECS
        );
    }

    if let Some(pacing) = config.pacing_ms
        && !(MINIMUM_PACING_MS..=MAXIMUM_PACING_MS).contains(&pacing)
    {
        anyhow::bail!(
            "pacing_ms ({} ms) must be between {} and {} milliseconds",
            pacing,
            MINIMUM_PACING_MS,
            MAXIMUM_PACING_MS
        );
    }

    if let Some(stagger) = config.stagger_ms
        && stagger > MAXIMUM_STAGGER_MS
    {
        anyhow::bail!(
            "stagger_ms ({} ms) must be at most {} milliseconds",
            stagger,
            MAXIMUM_STAGGER_MS
        );
    }

    if let Some(transition) = config.transition_time
        && transition > MAXIMUM_TRANSITION_TIME
    {
        anyhow::bail!(
            "transition_time ({}) must be at most {} (x 100ms)",
            transition,
            MAXIMUM_TRANSITION_TIME
        );
    }

    if let Some(hues) = &config.seed_hues {
        if hues.is_empty() {
            anyhow::bail!("seed_hues must contain at least one hue");
        }
        if let Some(bad) = hues.iter().find(|&&h| h >= HUE_SPACE) {
            anyhow::bail!(
                "seed_hues entry {} is outside the hue wheel (0-{})",
                bad,
                HUE_SPACE - 1
            );
        }
    }

    if let Some(jitter) = config.jitter_range
        && jitter > MAXIMUM_JITTER_RANGE
    {
        anyhow::bail!(
            "jitter_range ({}) must be at most {}",
            jitter,
            MAXIMUM_JITTER_RANGE
        );
    }

    if let Some(interval) = config.diffuse_interval_ms
        && !(MINIMUM_DIFFUSE_INTERVAL_MS..=MAXIMUM_DIFFUSE_INTERVAL_MS).contains(&interval)
    {
        anyhow::bail!(
            "diffuse_interval_ms ({} ms) must be between {} and {} milliseconds",
            interval,
            MINIMUM_DIFFUSE_INTERVAL_MS,
            MAXIMUM_DIFFUSE_INTERVAL_MS
        );
    }

    if let Some(grace) = config.stall_grace_ms
        && grace > MAXIMUM_STALL_GRACE_MS
    {
        anyhow::bail!(
            "stall_grace_ms ({} ms) must be at most {} milliseconds",
            grace,
            MAXIMUM_STALL_GRACE_MS
        );
    }

    Ok(())
}
