//! Backoff schedules.
//!
//! Each generator returns the full list of waits up front, one per retry, so
//! a schedule can be inspected before any attempt runs.

use std::time::Duration;

/// `n` waits of `amount` each.
pub fn constant(n: usize, amount: Duration) -> Vec<Duration> {
    vec![amount; n]
}

/// `n` waits doubling from `initial`. Saturates at [`Duration::MAX`].
pub fn exponential(n: usize, initial: Duration) -> Vec<Duration> {
    let mut waits = Vec::with_capacity(n);
    let mut next = initial;
    for _ in 0..n {
        waits.push(next);
        next = next.checked_mul(2).unwrap_or(Duration::MAX);
    }
    waits
}

/// `n` waits starting at `initial`, each growing by `floor(ln(i + 5))`
/// seconds over the previous one.
///
/// With a one second start: 1s 2s 3s 4s 6s 8s 10s ... 45s 48s 51s 54s.
pub fn logarithmic(n: usize, initial: Duration) -> Vec<Duration> {
    let mut waits = Vec::with_capacity(n);
    let mut next = initial;
    for i in 0..n {
        waits.push(next);
        let step = ((i as f64) + 5.0).ln().floor() as u64;
        next = next.saturating_add(Duration::from_secs(step));
    }
    waits
}
