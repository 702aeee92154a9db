//! Integration tests for `SoftDeleteStore::find_or_create`, including the
//! concurrent check-then-create race.

mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use common::{create_widget, label, slug_store, widget_store};
use futures::future::join_all;
use sakuya_core::error::CoreError;
use sakuya_db::predicate::eq;
use sakuya_db::{Fields, StoreError};
use sqlx::PgPool;

#[sqlx::test(migrations = "tests/migrations")]
async fn test_returns_existing_record(pool: PgPool) {
    let store = widget_store(pool);
    let existing = create_widget(&store, "present").await;

    let (found, created) = store
        .find_or_create(label("present"), Fields::new().with("quantity", 99))
        .await
        .unwrap();

    assert!(!created);
    assert_eq!(found.meta.id, existing.meta.id);
    assert_eq!(found.quantity, existing.quantity);
    assert_eq!(store.whole_count().await.unwrap(), 1);
}

#[sqlx::test(migrations = "tests/migrations")]
async fn test_creates_from_defaults_and_lookup(pool: PgPool) {
    let store = widget_store(pool);

    let defaults = Fields::new()
        .with("label", "ignored")
        .with("quantity", 7)
        .with("note", "from defaults");
    let (widget, created) = store
        .find_or_create(label("fresh"), defaults)
        .await
        .unwrap();

    assert!(created);
    assert!(widget.meta.is_persisted());
    assert_eq!(widget.label, "fresh");
    assert_eq!(widget.quantity, 7);
    assert_eq!(widget.note.as_deref(), Some("from defaults"));

    let (again, created) = store
        .find_or_create(label("fresh"), Fields::new())
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(again.meta.id, widget.meta.id);
}

#[sqlx::test(migrations = "tests/migrations")]
async fn test_soft_deleted_match_is_not_reused(pool: PgPool) {
    let store = widget_store(pool);
    let mut old = create_widget(&store, "recycled").await;
    store.soft_delete(&mut old).await.unwrap();

    let (widget, created) = store
        .find_or_create(label("recycled"), Fields::new())
        .await
        .unwrap();

    assert!(created);
    assert_ne!(widget.meta.id, old.meta.id);
    assert_eq!(store.whole_filter(eq("label", "recycled")).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "tests/migrations")]
async fn test_invalid_columns_fail_before_touching_database(pool: PgPool) {
    let store = widget_store(pool);

    assert_matches!(
        store
            .find_or_create(Fields::new().with("colour", "red"), Fields::new())
            .await,
        Err(StoreError::Core(CoreError::UnknownColumn { .. }))
    );
    assert_matches!(
        store
            .find_or_create(label("a"), Fields::new().with("id", uuid::Uuid::nil()))
            .await,
        Err(StoreError::Core(CoreError::Validation(_)))
    );
    assert_eq!(store.whole_count().await.unwrap(), 0);
}

#[sqlx::test(migrations = "tests/migrations")]
async fn test_integrity_error_falls_back_to_lookup(pool: PgPool) {
    let store = widget_store(pool);

    // `label` is NOT NULL with no default, so the insert fails with an
    // integrity error. That is handled like a lost race: the lookup is
    // re-run outside the transaction and finds nothing.
    let result = store
        .find_or_create(Fields::new().with("quantity", 3), Fields::new())
        .await;
    assert_matches!(
        result,
        Err(StoreError::Core(CoreError::NotFound { entity: "widgets" }))
    );
}

#[sqlx::test(migrations = "tests/migrations")]
async fn test_conflict_on_unlooked_column_surfaces_not_found(pool: PgPool) {
    let store = slug_store(pool);
    store
        .create(Fields::new().with("slug", "taken").with("title", "first"))
        .await
        .unwrap();

    // Lookup on title misses, the insert then collides on the unique slug.
    let result = store
        .find_or_create(
            Fields::new().with("title", "second"),
            Fields::new().with("slug", "taken"),
        )
        .await;
    assert_matches!(
        result,
        Err(StoreError::Core(CoreError::NotFound { entity: "slugs" }))
    );
    assert_eq!(store.whole_count().await.unwrap(), 1);
}

#[sqlx::test(migrations = "tests/migrations")]
async fn test_concurrent_callers_agree_on_one_record(pool: PgPool) {
    const CALLERS: usize = 8;
    let store = slug_store(pool);

    let attempts = (0..CALLERS).map(|i| {
        let store = store.clone();
        async move {
            store
                .find_or_create(
                    Fields::new().with("slug", "contended"),
                    Fields::new().with("title", format!("caller {i}")),
                )
                .await
        }
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let created = results.iter().filter(|(_, created)| *created).count();
    assert_eq!(created, 1, "exactly one caller should create the row");

    let ids: HashSet<_> = results.iter().map(|(slug, _)| slug.meta.id).collect();
    assert_eq!(ids.len(), 1, "every caller should see the same row");
    assert_eq!(store.whole_count().await.unwrap(), 1);
}
