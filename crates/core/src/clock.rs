//! Time source for record timestamps.

use chrono::{SubsecRound, Utc};

use crate::types::Timestamp;

/// PostgreSQL `TIMESTAMPTZ` stores microseconds.
pub const TIMESTAMP_PRECISION_DIGITS: u16 = 6;

/// Supplies the instants written to `created_at`, `updated_at` and `deleted_at`.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock, truncated to the precision the database keeps so an in-memory
/// timestamp compares equal to the value read back.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().trunc_subsecs(TIMESTAMP_PRECISION_DIGITS)
    }
}

/// A clock frozen at a single instant. Useful when a caller needs several
/// operations to share one timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
