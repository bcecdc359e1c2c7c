//! Process-wide monotonic wall clock.
//!
//! Every timestamp handed out is strictly greater than the previous one, so
//! ledger rows written by one process never share a timestamp even when the
//! system clock stalls or steps backwards.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_US: AtomicI64 = AtomicI64::new(0);

/// Next timestamp in microseconds since the Unix epoch.
pub fn next_timestamp_us() -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_US.load(Ordering::Relaxed);
    loop {
        let next = std::cmp::max(now, last + 1);
        match LAST_US.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Next timestamp as a `DateTime`.
pub fn now() -> DateTime<Utc> {
    from_micros(next_timestamp_us())
}

/// Convert stored microseconds back into a `DateTime`. Out-of-range values
/// clamp to the epoch.
#[must_use]
pub fn from_micros(us: i64) -> DateTime<Utc> {
    let secs = us.div_euclid(1_000_000);
    let nanos = u32::try_from(us.rem_euclid(1_000_000) * 1_000).unwrap_or(0);
    Utc.timestamp_opt(secs, nanos)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
