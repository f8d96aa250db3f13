// Licensed under the Apache-2.0 license

//! Bounded polling helpers.
//!
//! Hardware status bits are waited on with a fixed interval and a hard
//! ceiling; a wait either observes the condition or fails after the last
//! attempt. `poll_until` sleeps on the calling thread; `poll_until_with`
//! takes the sleep function from the caller so tests can run the full
//! attempt schedule without consuming wall-clock time.

use anyhow::{bail, Result};
use std::time::Duration;

/// Number of condition checks performed for a `timeout`/`interval` pair.
///
/// ceil(timeout / interval), at least one.
pub fn attempts_for(timeout: Duration, interval: Duration) -> u32 {
    let interval_ms = interval.as_millis().max(1);
    timeout.as_millis().div_ceil(interval_ms).max(1) as u32
}

/// Polls `f` until it returns `Ok(true)`, sleeping `interval` between
/// attempts, for at most `attempts_for(timeout, interval)` attempts.
///
/// An `Err` from `f` aborts the poll immediately and is returned as-is.
pub fn poll_until<F>(timeout: Duration, interval: Duration, f: F) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    poll_until_with(timeout, interval, std::thread::sleep, f)
}

/// `poll_until` with a caller-supplied sleep function.
pub fn poll_until_with<S, F>(
    timeout: Duration,
    interval: Duration,
    mut sleep: S,
    mut f: F,
) -> Result<()>
where
    S: FnMut(Duration),
    F: FnMut() -> Result<bool>,
{
    let attempts = attempts_for(timeout, interval);
    for attempt in 0..attempts {
        if f()? {
            return Ok(());
        }
        if attempt + 1 < attempts {
            sleep(interval);
        }
    }
    bail!("condition not met within {timeout:?} ({attempts} attempts)");
}
