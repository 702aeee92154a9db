//! Deletion lifecycle of a single record.
//!
//! A record is either live or soft-deleted. Soft deletion happens at most
//! once: the first timestamp sticks and later attempts change nothing.
//! Erasure removes the row entirely and has no in-memory state; there is no
//! way back from soft-deleted to live.

use serde::Serialize;

use crate::types::Timestamp;

/// Column names shared by every soft-deletable table.
pub const ID_COLUMN: &str = "id";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";
pub const DELETED_AT_COLUMN: &str = "deleted_at";

/// Bookkeeping columns, in the order they are selected and inserted.
pub const META_COLUMNS: &[&str] = &[
    ID_COLUMN,
    CREATED_AT_COLUMN,
    UPDATED_AT_COLUMN,
    DELETED_AT_COLUMN,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeletionState {
    Live,
    SoftDeleted { at: Timestamp },
}

impl DeletionState {
    pub fn from_deleted_at(deleted_at: Option<Timestamp>) -> Self {
        match deleted_at {
            None => Self::Live,
            Some(at) => Self::SoftDeleted { at },
        }
    }

    pub fn deleted_at(self) -> Option<Timestamp> {
        match self {
            Self::Live => None,
            Self::SoftDeleted { at } => Some(at),
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Apply a soft delete at `now`.
    ///
    /// Returns the resulting state and whether anything changed. An already
    /// soft-deleted state keeps its first timestamp.
    pub fn soft_delete(self, now: Timestamp) -> (Self, bool) {
        match self {
            Self::Live => (Self::SoftDeleted { at: now }, true),
            deleted @ Self::SoftDeleted { .. } => (deleted, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn instant() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn null_deleted_at_is_live() {
        assert_eq!(DeletionState::from_deleted_at(None), DeletionState::Live);
        assert!(DeletionState::Live.is_live());
    }

    #[test]
    fn soft_delete_from_live_sets_timestamp() {
        let (state, changed) = DeletionState::Live.soft_delete(instant());
        assert!(changed);
        assert_eq!(state.deleted_at(), Some(instant()));
        assert!(!state.is_live());
    }

    #[test]
    fn soft_delete_twice_keeps_first_timestamp() {
        let (state, _) = DeletionState::Live.soft_delete(instant());
        let (again, changed) = state.soft_delete(instant() + Duration::hours(1));
        assert!(!changed);
        assert_eq!(again.deleted_at(), Some(instant()));
    }

    #[test]
    fn round_trips_through_deleted_at() {
        let state = DeletionState::SoftDeleted { at: instant() };
        assert_eq!(DeletionState::from_deleted_at(state.deleted_at()), state);
    }

    #[test]
    fn meta_columns_start_with_primary_key() {
        assert_eq!(META_COLUMNS[0], ID_COLUMN);
        assert!(META_COLUMNS.contains(&DELETED_AT_COLUMN));
    }
}
