//! Chainable queries over one soft-deletable table.

use std::fmt;
use std::marker::PhantomData;

use sakuya_core::error::CoreError;
use sakuya_core::lifecycle::{CREATED_AT_COLUMN, DELETED_AT_COLUMN, UPDATED_AT_COLUMN};
use sakuya_core::types::Timestamp;
use sqlx::{PgExecutor, Postgres, QueryBuilder};

use crate::error::StoreResult;
use crate::predicate::Predicate;
use crate::record::{is_known_column, select_list, Record};

/// Which rows a query can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only rows with `deleted_at IS NULL`.
    Visible,
    /// Every row.
    Whole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("ASC"),
            Direction::Desc => f.write_str("DESC"),
        }
    }
}

/// Most recently updated first, then most recently created.
pub const DEFAULT_ORDERING: &[(&str, Direction)] = &[
    (UPDATED_AT_COLUMN, Direction::Desc),
    (CREATED_AT_COLUMN, Direction::Desc),
];

/// A lazily evaluated query against `R`'s table.
///
/// Builders consume and return the query; terminal methods borrow it and take
/// any Postgres executor (pool, connection or transaction), so a query can be
/// run more than once.
pub struct Query<R> {
    scope: Scope,
    conditions: Vec<Predicate>,
    ordering: Option<Vec<(String, Direction)>>,
    limit: Option<i64>,
    offset: Option<i64>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Query<R> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope,
            conditions: self.conditions.clone(),
            ordering: self.ordering.clone(),
            limit: self.limit,
            offset: self.offset,
            _record: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Query<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("scope", &self.scope)
            .field("conditions", &self.conditions)
            .field("ordering", &self.ordering)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<R: Record> Query<R> {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            conditions: Vec::new(),
            ordering: None,
            limit: None,
            offset: None,
            _record: PhantomData,
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Keep only rows matching `predicate`. Repeated calls are AND-ed.
    pub fn filter(mut self, predicate: impl Into<Predicate>) -> Self {
        self.conditions.push(predicate.into());
        self
    }

    /// Drop rows matching `predicate`. Repeated calls are AND-ed.
    pub fn exclude(mut self, predicate: impl Into<Predicate>) -> Self {
        self.conditions.push(predicate.into().negate());
        self
    }

    /// Order by `column`. The first call replaces the default ordering;
    /// later calls add tie-breakers.
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.ordering
            .get_or_insert_with(Vec::new)
            .push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    // ── Terminal operations ───────────────────────────────────────────

    /// Every matching row, in order.
    pub async fn fetch_all<'e, E>(&self, executor: E) -> StoreResult<Vec<R>>
    where
        E: PgExecutor<'e>,
    {
        let mut qb = self.select_builder()?;
        let rows = qb.build_query_as::<R>().fetch_all(executor).await?;
        Ok(rows)
    }

    /// The first matching row under the query's ordering.
    pub async fn fetch_first<'e, E>(&self, executor: E) -> StoreResult<Option<R>>
    where
        E: PgExecutor<'e>,
    {
        let mut qb = self.clone().limit(1).select_builder()?;
        let row = qb.build_query_as::<R>().fetch_optional(executor).await?;
        Ok(row)
    }

    /// Exactly one matching row.
    ///
    /// Fails with `NotFound` on zero matches and `MultipleMatches` on more
    /// than one.
    pub async fn fetch_one<'e, E>(&self, executor: E) -> StoreResult<R>
    where
        E: PgExecutor<'e>,
    {
        self.fetch_optional(executor)
            .await?
            .ok_or_else(|| CoreError::NotFound { entity: R::TABLE }.into())
    }

    /// At most one matching row; still fails with `MultipleMatches` on more
    /// than one.
    pub async fn fetch_optional<'e, E>(&self, executor: E) -> StoreResult<Option<R>>
    where
        E: PgExecutor<'e>,
    {
        let mut qb = self.clone().limit(2).select_builder()?;
        let mut rows = qb.build_query_as::<R>().fetch_all(executor).await?;
        if rows.len() > 1 {
            return Err(CoreError::MultipleMatches { entity: R::TABLE }.into());
        }
        Ok(rows.pop())
    }

    /// Number of matching rows. Ordering, limit and offset are ignored.
    pub async fn count<'e, E>(&self, executor: E) -> StoreResult<i64>
    where
        E: PgExecutor<'e>,
    {
        self.check_columns()?;
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", R::TABLE));
        self.push_where(&mut qb);
        let count = qb.build_query_scalar::<i64>().fetch_one(executor).await?;
        Ok(count)
    }

    pub async fn exists<'e, E>(&self, executor: E) -> StoreResult<bool>
    where
        E: PgExecutor<'e>,
    {
        self.check_columns()?;
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT EXISTS (SELECT 1 FROM {}", R::TABLE));
        self.push_where(&mut qb);
        qb.push(")");
        let exists = qb.build_query_scalar::<bool>().fetch_one(executor).await?;
        Ok(exists)
    }

    /// Stamp `deleted_at = now` on every matching live row in one statement.
    ///
    /// Rows that are already soft-deleted keep their timestamp, whatever the
    /// scope. Only `deleted_at` is written. Returns the number of rows
    /// changed.
    pub async fn soft_delete<'e, E>(&self, executor: E, now: Timestamp) -> StoreResult<u64>
    where
        E: PgExecutor<'e>,
    {
        self.check_columns()?;
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "UPDATE {} SET {DELETED_AT_COLUMN} = ",
            R::TABLE
        ));
        qb.push_bind(now);
        self.push_where(&mut qb);
        qb.push(format!(" AND {DELETED_AT_COLUMN} IS NULL"));
        let result = qb.build().execute(executor).await?;
        tracing::debug!(
            table = R::TABLE,
            scope = ?self.scope,
            rows = result.rows_affected(),
            "Bulk soft delete"
        );
        Ok(result.rows_affected())
    }

    /// Physically remove every matching row in one statement. Returns the
    /// number of rows removed.
    pub async fn erase<'e, E>(&self, executor: E) -> StoreResult<u64>
    where
        E: PgExecutor<'e>,
    {
        self.check_columns()?;
        let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {}", R::TABLE));
        self.push_where(&mut qb);
        let result = qb.build().execute(executor).await?;
        tracing::debug!(
            table = R::TABLE,
            scope = ?self.scope,
            rows = result.rows_affected(),
            "Bulk erase"
        );
        Ok(result.rows_affected())
    }

    // ── SQL construction ──────────────────────────────────────────────

    fn check_columns(&self) -> Result<(), CoreError> {
        for condition in &self.conditions {
            condition.check_columns::<R>()?;
        }
        for (column, _) in self.ordering.iter().flatten() {
            if !is_known_column::<R>(column) {
                return Err(CoreError::UnknownColumn {
                    entity: R::TABLE,
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if self.scope == Scope::Visible {
            qb.push(format!(" AND {DELETED_AT_COLUMN} IS NULL"));
        }
        for condition in &self.conditions {
            qb.push(" AND ");
            condition.push_sql(qb);
        }
    }

    fn push_order(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        let clauses: Vec<String> = match &self.ordering {
            Some(ordering) => ordering
                .iter()
                .map(|(column, direction)| format!("{column} {direction}"))
                .collect(),
            None => DEFAULT_ORDERING
                .iter()
                .map(|(column, direction)| format!("{column} {direction}"))
                .collect(),
        };
        qb.push(" ORDER BY ");
        qb.push(clauses.join(", "));
    }

    fn select_builder(&self) -> Result<QueryBuilder<'static, Postgres>, CoreError> {
        self.check_columns()?;
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {}",
            select_list::<R>(),
            R::TABLE
        ));
        self.push_where(&mut qb);
        self.push_order(&mut qb);
        if let Some(limit) = self.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit);
        }
        if let Some(offset) = self.offset {
            qb.push(" OFFSET ");
            qb.push_bind(offset);
        }
        Ok(qb)
    }
}
