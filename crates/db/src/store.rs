//! [`SoftDeleteStore`]: the visible and whole views over one record type.

use std::marker::PhantomData;
use std::sync::Arc;

use sakuya_core::clock::{Clock, SystemClock};
use sakuya_core::error::CoreError;
use sakuya_core::ids::{IdGenerator, UuidV7Generator};
use sakuya_core::lifecycle::{
    CREATED_AT_COLUMN, DELETED_AT_COLUMN, ID_COLUMN, META_COLUMNS, UPDATED_AT_COLUMN,
};
use sakuya_core::types::Timestamp;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};

use crate::error::{is_race_conflict, StoreError, StoreResult};
use crate::predicate::{push_value, FieldValue, Fields, Predicate};
use crate::query::{Query, Scope};
use crate::record::{select_list, Record, RecordMeta};

/// Data access for one soft-deletable record type.
///
/// Cheap to clone: the pool and collaborators are shared.
pub struct SoftDeleteStore<R> {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for SoftDeleteStore<R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            clock: Arc::clone(&self.clock),
            ids: Arc::clone(&self.ids),
            _record: PhantomData,
        }
    }
}

impl<R: Record> SoftDeleteStore<R> {
    /// Store using the wall clock and UUID v7 keys.
    pub fn new(pool: PgPool) -> Self {
        Self::with_collaborators(pool, Arc::new(SystemClock), Arc::new(UuidV7Generator))
    }

    pub fn with_collaborators(
        pool: PgPool,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            pool,
            clock,
            ids,
            _record: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Meta for a new, unsaved record with a freshly generated id.
    pub fn new_meta(&self) -> RecordMeta {
        RecordMeta::transient(self.ids.generate())
    }

    // ── Visible view ──────────────────────────────────────────────────

    /// Query over rows that have not been soft-deleted.
    pub fn visible(&self) -> Query<R> {
        Query::new(Scope::Visible)
    }

    pub async fn visible_all(&self) -> StoreResult<Vec<R>> {
        self.visible().fetch_all(&self.pool).await
    }

    pub async fn visible_filter(&self, predicate: impl Into<Predicate>) -> StoreResult<Vec<R>> {
        self.visible().filter(predicate).fetch_all(&self.pool).await
    }

    pub async fn visible_exclude(&self, predicate: impl Into<Predicate>) -> StoreResult<Vec<R>> {
        self.visible().exclude(predicate).fetch_all(&self.pool).await
    }

    /// Exactly one visible record, or `NotFound` / `MultipleMatches`.
    pub async fn visible_get(&self, predicate: impl Into<Predicate>) -> StoreResult<R> {
        self.visible().filter(predicate).fetch_one(&self.pool).await
    }

    pub async fn visible_get_or_none(
        &self,
        predicate: impl Into<Predicate>,
    ) -> StoreResult<Option<R>> {
        self.visible()
            .filter(predicate)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn visible_first(&self) -> StoreResult<Option<R>> {
        self.visible().fetch_first(&self.pool).await
    }

    pub async fn visible_count(&self) -> StoreResult<i64> {
        self.visible().count(&self.pool).await
    }

    // ── Whole view ────────────────────────────────────────────────────

    /// Query over every row, soft-deleted or not.
    pub fn whole(&self) -> Query<R> {
        Query::new(Scope::Whole)
    }

    pub async fn whole_all(&self) -> StoreResult<Vec<R>> {
        self.whole().fetch_all(&self.pool).await
    }

    pub async fn whole_filter(&self, predicate: impl Into<Predicate>) -> StoreResult<Vec<R>> {
        self.whole().filter(predicate).fetch_all(&self.pool).await
    }

    pub async fn whole_exclude(&self, predicate: impl Into<Predicate>) -> StoreResult<Vec<R>> {
        self.whole().exclude(predicate).fetch_all(&self.pool).await
    }

    pub async fn whole_get(&self, predicate: impl Into<Predicate>) -> StoreResult<R> {
        self.whole().filter(predicate).fetch_one(&self.pool).await
    }

    pub async fn whole_get_or_none(
        &self,
        predicate: impl Into<Predicate>,
    ) -> StoreResult<Option<R>> {
        self.whole().filter(predicate).fetch_optional(&self.pool).await
    }

    pub async fn whole_first(&self) -> StoreResult<Option<R>> {
        self.whole().fetch_first(&self.pool).await
    }

    pub async fn whole_count(&self) -> StoreResult<i64> {
        self.whole().count(&self.pool).await
    }

    // ── Persistence ───────────────────────────────────────────────────

    /// Insert a row built from `fields`, returning it as stored.
    pub async fn create(&self, fields: Fields) -> StoreResult<R> {
        self.create_on(&self.pool, fields).await
    }

    pub async fn create_on<'e, E>(&self, executor: E, fields: Fields) -> StoreResult<R>
    where
        E: PgExecutor<'e>,
    {
        fields.check_writable::<R>()?;
        let now = self.clock.now();
        let id = self.ids.generate();

        let mut qb = insert_prefix::<R>(fields.iter().map(|(column, _)| column));
        qb.push_bind(id);
        qb.push(", ");
        qb.push_bind(now);
        qb.push(", ");
        qb.push_bind(now);
        qb.push(", NULL");
        for (_, value) in fields.iter() {
            qb.push(", ");
            push_value(&mut qb, value);
        }
        qb.push(format!(") RETURNING {}", select_list::<R>()));

        let record = qb.build_query_as::<R>().fetch_one(executor).await?;
        tracing::debug!(table = R::TABLE, %id, "Created record");
        Ok(record)
    }

    /// Insert a transient record, or write every field of a persisted one.
    ///
    /// Both paths refresh `updated_at`; only the insert sets `created_at`.
    pub async fn save(&self, record: &mut R) -> StoreResult<()> {
        self.save_on(&self.pool, record).await
    }

    pub async fn save_on<'e, E>(&self, executor: E, record: &mut R) -> StoreResult<()>
    where
        E: PgExecutor<'e>,
    {
        let fields = record.fields();
        fields.check_writable::<R>()?;
        let now = self.clock.now();
        let meta = record.meta().clone();

        let stored: Option<RecordMeta> = if meta.is_persisted() {
            let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", R::TABLE));
            for (column, value) in fields.iter() {
                qb.push(format!("{column} = "));
                push_value(&mut qb, value);
                qb.push(", ");
            }
            qb.push(format!("{UPDATED_AT_COLUMN} = "));
            qb.push_bind(now);
            qb.push(format!(" WHERE {ID_COLUMN} = "));
            qb.push_bind(meta.id);
            qb.push(format!(" RETURNING {}", META_COLUMNS.join(", ")));
            qb.build_query_as::<RecordMeta>()
                .fetch_optional(executor)
                .await?
        } else {
            let mut qb = insert_prefix::<R>(fields.iter().map(|(column, _)| column));
            qb.push_bind(meta.id);
            qb.push(", ");
            qb.push_bind(now);
            qb.push(", ");
            qb.push_bind(now);
            qb.push(", ");
            qb.push_bind(meta.deleted_at);
            for (_, value) in fields.iter() {
                qb.push(", ");
                push_value(&mut qb, value);
            }
            qb.push(format!(") RETURNING {}", META_COLUMNS.join(", ")));
            Some(
                qb.build_query_as::<RecordMeta>()
                    .fetch_one(executor)
                    .await?,
            )
        };

        let stored = stored.ok_or(CoreError::NotFound { entity: R::TABLE })?;
        *record.meta_mut() = stored;
        Ok(())
    }

    /// Insert every record in `records` with a single multi-row statement.
    pub async fn bulk_create(&self, records: &mut [R]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let now = self.clock.now();
        let field_sets: Vec<Fields> = records.iter().map(R::fields).collect();
        for fields in &field_sets {
            fields.check_writable::<R>()?;
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} ({}) VALUES ",
            R::TABLE,
            select_list::<R>()
        ));
        for (i, (record, fields)) in records.iter().zip(&field_sets).enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            let meta = record.meta();
            qb.push("(");
            qb.push_bind(meta.id);
            qb.push(", ");
            qb.push_bind(now);
            qb.push(", ");
            qb.push_bind(now);
            qb.push(", ");
            qb.push_bind(meta.deleted_at);
            for column in R::FIELDS {
                qb.push(", ");
                push_value(&mut qb, fields.get(column).unwrap_or(&FieldValue::Null));
            }
            qb.push(")");
        }
        qb.build().execute(&self.pool).await?;

        for record in records.iter_mut() {
            record.meta_mut().mark_persisted(now, now);
        }
        tracing::debug!(table = R::TABLE, rows = field_sets.len(), "Bulk created records");
        Ok(())
    }

    // ── Deletion ──────────────────────────────────────────────────────

    /// Soft-delete one record.
    ///
    /// Fails with `Unpersisted` for a record that was never saved. A record
    /// already carrying `deleted_at` is left untouched. Only the
    /// `deleted_at` column is written, and only while it is still null in
    /// the database.
    pub async fn soft_delete(&self, record: &mut R) -> StoreResult<()> {
        self.soft_delete_on(&self.pool, record).await
    }

    pub async fn soft_delete_on<'e, E>(&self, executor: E, record: &mut R) -> StoreResult<()>
    where
        E: PgExecutor<'e>,
    {
        let meta = record.meta();
        if !meta.is_persisted() {
            return Err(CoreError::Unpersisted { entity: R::TABLE }.into());
        }
        let (state, changed) = meta.deletion_state().soft_delete(self.clock.now());
        if !changed {
            return Ok(());
        }

        let id = meta.id;
        let deleted_at = state.deleted_at();
        sqlx::query(&format!(
            "UPDATE {} SET {DELETED_AT_COLUMN} = $1 \
             WHERE {ID_COLUMN} = $2 AND {DELETED_AT_COLUMN} IS NULL",
            R::TABLE
        ))
        .bind(deleted_at)
        .bind(id)
        .execute(executor)
        .await?;

        record.meta_mut().deleted_at = deleted_at;
        tracing::debug!(table = R::TABLE, %id, "Soft-deleted record");
        Ok(())
    }

    /// Physically remove one record, whatever its `deleted_at`.
    ///
    /// Fails with `Unpersisted` for a record that was never saved. The
    /// in-memory record is marked unsaved afterwards.
    pub async fn erase(&self, record: &mut R) -> StoreResult<()> {
        self.erase_on(&self.pool, record).await
    }

    pub async fn erase_on<'e, E>(&self, executor: E, record: &mut R) -> StoreResult<()>
    where
        E: PgExecutor<'e>,
    {
        let meta = record.meta();
        if !meta.is_persisted() {
            return Err(CoreError::Unpersisted { entity: R::TABLE }.into());
        }
        let id = meta.id;
        sqlx::query(&format!("DELETE FROM {} WHERE {ID_COLUMN} = $1", R::TABLE))
            .bind(id)
            .execute(executor)
            .await?;

        record.meta_mut().mark_erased();
        tracing::debug!(table = R::TABLE, %id, "Erased record");
        Ok(())
    }

    /// Soft-delete every visible row matching `predicate` in one statement.
    pub async fn soft_delete_matching(&self, predicate: impl Into<Predicate>) -> StoreResult<u64> {
        self.visible()
            .filter(predicate)
            .soft_delete(&self.pool, self.clock.now())
            .await
    }

    /// Erase every row matching `predicate`, soft-deleted or not, in one
    /// statement.
    pub async fn erase_matching(&self, predicate: impl Into<Predicate>) -> StoreResult<u64> {
        self.whole().filter(predicate).erase(&self.pool).await
    }

    // ── Find or create ────────────────────────────────────────────────

    /// Fetch the visible record matching `lookup`, or create one from
    /// `defaults` overlaid with `lookup`. The flag is `true` when created.
    ///
    /// Lookup and insert share a transaction. If the insert loses a race to
    /// a concurrent writer (integrity conflict or unusable transaction), the
    /// transaction is rolled back and the winner's row is read afresh
    /// outside it. That final read is a strict `visible_get`: under an
    /// isolation level where the winner's commit is not yet visible it
    /// fails with `NotFound`.
    pub async fn find_or_create(&self, lookup: Fields, defaults: Fields) -> StoreResult<(R, bool)> {
        let predicate = lookup.to_predicate();
        let values = lookup.merged_over(&defaults);
        values.check_writable::<R>()?;

        let mut tx = self.pool.begin().await?;
        let found = self
            .visible()
            .filter(predicate.clone())
            .fetch_first(&mut *tx)
            .await?;
        if let Some(found) = found {
            tx.commit().await?;
            return Ok((found, false));
        }

        let created = self.create_on(&mut *tx, values).await;
        match created {
            Ok(created) => match tx.commit().await {
                Ok(()) => return Ok((created, true)),
                Err(err) if is_race_conflict(&err) => {
                    tracing::debug!(table = R::TABLE, error = %err, "Lost find-or-create race at commit");
                }
                Err(err) => return Err(err.into()),
            },
            Err(StoreError::Database(err)) if is_race_conflict(&err) => {
                tracing::debug!(table = R::TABLE, error = %err, "Lost find-or-create race");
                tx.rollback().await?;
            }
            Err(err) => return Err(err),
        }

        let existing = self.visible_get(predicate).await?;
        Ok((existing, false))
    }
}

/// `INSERT INTO <table> (id, created_at, updated_at, deleted_at, <columns>) VALUES (`
fn insert_prefix<'a, R: Record>(
    columns: impl Iterator<Item = &'a str>,
) -> QueryBuilder<'static, Postgres> {
    let column_list = [ID_COLUMN, CREATED_AT_COLUMN, UPDATED_AT_COLUMN, DELETED_AT_COLUMN]
        .into_iter()
        .chain(columns)
        .collect::<Vec<_>>()
        .join(", ");
    QueryBuilder::new(format!(
        "INSERT INTO {} ({column_list}) VALUES (",
        R::TABLE
    ))
}
