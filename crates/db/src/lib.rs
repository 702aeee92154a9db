//! Soft-delete aware persistence on top of PostgreSQL.
//!
//! Every table managed here carries the same four bookkeeping columns
//! (`id`, `created_at`, `updated_at`, `deleted_at`). [`SoftDeleteStore`]
//! exposes two views over such a table:
//!
//! - the *visible* view, which hides rows whose `deleted_at` is set;
//! - the *whole* view, which sees every row.
//!
//! Soft deletion stamps `deleted_at`; erasure removes the row.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod predicate;
pub mod query;
pub mod record;
pub mod store;

pub use error::{is_race_conflict, StoreError, StoreResult};
pub use predicate::{FieldValue, Fields, Predicate};
pub use query::{Direction, Query, Scope};
pub use record::{Record, RecordMeta};
pub use store::SoftDeleteStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
