//! Wall-clock access
//!
//! Services take timestamps as parameters wherever determinism matters;
//! this helper sits at the edges that need real time.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as Unix nanoseconds
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
