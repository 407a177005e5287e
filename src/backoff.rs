use std::time::Duration;

/// Delay after the `attempt`-th failed attempt (1-based): `base * 2^(attempt - 1)`.
///
/// No jitter and no ceiling. Saturates at [`Duration::MAX`] instead of
/// overflowing for very large attempt counts.
pub fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    if base.is_zero() {
        return Duration::ZERO;
    }
    let exp = attempt - 1;
    let scaled = if exp >= 128 {
        None
    } else {
        base.as_nanos().checked_mul(1u128 << exp)
    };
    scaled.map_or(Duration::MAX, from_nanos_saturating)
}

fn from_nanos_saturating(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    match u64::try_from(nanos / NANOS_PER_SEC) {
        Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
        Err(_) => Duration::MAX,
    }
}

/// Sum of every delay inserted by `retries` failed attempts.
pub fn total_backoff(base: Duration, retries: usize) -> Duration {
    (1..=retries).fold(Duration::ZERO, |total, attempt| {
        total.saturating_add(backoff_delay(base, attempt))
    })
}
