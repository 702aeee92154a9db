//! The record contract shared by every soft-deletable table.

use sakuya_core::lifecycle::{
    DeletionState, CREATED_AT_COLUMN, DELETED_AT_COLUMN, ID_COLUMN, META_COLUMNS,
    UPDATED_AT_COLUMN,
};
use sakuya_core::types::{RecordId, Timestamp};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::predicate::Fields;

/// Bookkeeping columns carried by every record.
///
/// Embed it in a record struct with `#[sqlx(flatten)]`. Rows loaded from the
/// database always produce a persisted meta; [`RecordMeta::transient`]
/// produces one for a record that has not been saved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordMeta {
    pub id: RecordId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    #[serde(skip)]
    persisted: bool,
}

impl RecordMeta {
    /// Meta for a record that exists only in memory. The timestamps are
    /// placeholders until the first save.
    pub fn transient(id: RecordId) -> Self {
        Self {
            id,
            created_at: Timestamp::default(),
            updated_at: Timestamp::default(),
            deleted_at: None,
            persisted: false,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn deletion_state(&self) -> DeletionState {
        DeletionState::from_deleted_at(self.deleted_at)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub(crate) fn mark_persisted(&mut self, created_at: Timestamp, updated_at: Timestamp) {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self.persisted = true;
    }

    pub(crate) fn mark_erased(&mut self) {
        self.persisted = false;
    }
}

impl<'r> FromRow<'r, PgRow> for RecordMeta {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
            updated_at: row.try_get(UPDATED_AT_COLUMN)?,
            deleted_at: row.try_get(DELETED_AT_COLUMN)?,
            persisted: true,
        })
    }
}

/// A row type stored in a soft-deletable table.
///
/// The table must have the columns `id UUID PRIMARY KEY`,
/// `created_at TIMESTAMPTZ NOT NULL`, `updated_at TIMESTAMPTZ NOT NULL` and
/// `deleted_at TIMESTAMPTZ NULL`, plus the columns named in [`Record::FIELDS`].
pub trait Record: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static {
    /// Table name. Also used as the entity name in errors.
    const TABLE: &'static str;

    /// Record-specific columns, excluding the bookkeeping columns.
    const FIELDS: &'static [&'static str];

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Current values of the record-specific columns, written on save.
    fn fields(&self) -> Fields;
}

pub fn is_known_column<R: Record>(column: &str) -> bool {
    META_COLUMNS.contains(&column) || R::FIELDS.contains(&column)
}

/// `id, created_at, updated_at, deleted_at, <fields...>`
pub(crate) fn select_list<R: Record>() -> String {
    META_COLUMNS
        .iter()
        .chain(R::FIELDS.iter())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}


#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::test_support::Gadget;
    use super::*;

    #[test]
    fn transient_meta_is_not_persisted() {
        let meta = RecordMeta::transient(Uuid::now_v7());
        assert!(!meta.is_persisted());
        assert!(!meta.is_deleted());
        assert!(meta.deletion_state().is_live());
    }

    #[test]
    fn mark_persisted_sets_timestamps() {
        let mut meta = RecordMeta::transient(Uuid::now_v7());
        let now = chrono::Utc::now();
        meta.mark_persisted(now, now);
        assert!(meta.is_persisted());
        assert_eq!(meta.created_at, now);
        assert_eq!(meta.updated_at, now);

        meta.mark_erased();
        assert!(!meta.is_persisted());
    }

    #[test]
    fn select_list_starts_with_bookkeeping_columns() {
        assert_eq!(
            select_list::<Gadget>(),
            "id, created_at, updated_at, deleted_at, name, size"
        );
    }

    #[test]
    fn known_columns_include_meta_and_fields() {
        assert!(is_known_column::<Gadget>("id"));
        assert!(is_known_column::<Gadget>("deleted_at"));
        assert!(is_known_column::<Gadget>("size"));
        assert!(!is_known_column::<Gadget>("colour"));
    }
}
