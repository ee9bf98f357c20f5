//! Deterministic clocks for ledger timestamps

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use elif_database::migrations::Clock;

/// Fixed instant used as the default test epoch
pub fn test_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Clock that always returns `at`
pub fn frozen_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}

/// Clock that starts at `start` and advances `step_ms` milliseconds per reading
pub fn stepping_clock(start: DateTime<Utc>, step_ms: i64) -> Clock {
    let tick = Arc::new(AtomicI64::new(0));
    Arc::new(move || {
        let n = tick.fetch_add(1, Ordering::SeqCst);
        start + Duration::milliseconds(n * step_ms)
    })
}
