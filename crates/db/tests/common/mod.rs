//! Record types and helpers shared by the database integration tests.
//!
//! Tables come from `tests/migrations`, applied by `#[sqlx::test]`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use sakuya_core::clock::Clock;
use sakuya_core::ids::UuidV7Generator;
use sakuya_core::types::Timestamp;
use sakuya_db::{Fields, Record, RecordMeta, SoftDeleteStore};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Widget {
    #[sqlx(flatten)]
    pub meta: RecordMeta,
    pub label: String,
    pub quantity: i32,
    pub note: Option<String>,
}

impl Record for Widget {
    const TABLE: &'static str = "widgets";
    const FIELDS: &'static [&'static str] = &["label", "quantity", "note"];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn fields(&self) -> Fields {
        Fields::new()
            .with("label", self.label.clone())
            .with("quantity", self.quantity)
            .with("note", self.note.clone())
    }
}

/// A record whose `slug` column is unique, for find-or-create races.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Slug {
    #[sqlx(flatten)]
    pub meta: RecordMeta,
    pub slug: String,
    pub title: Option<String>,
}

impl Record for Slug {
    const TABLE: &'static str = "slugs";
    const FIELDS: &'static [&'static str] = &["slug", "title"];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn fields(&self) -> Fields {
        Fields::new()
            .with("slug", self.slug.clone())
            .with("title", self.title.clone())
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Advances one second on every reading so timestamps are strictly ordered.
pub struct SteppingClock {
    start: Timestamp,
    ticks: AtomicI64,
}

impl SteppingClock {
    pub fn new() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        self.start + Duration::seconds(self.ticks.fetch_add(1, Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn widget_store(pool: PgPool) -> SoftDeleteStore<Widget> {
    SoftDeleteStore::with_collaborators(
        pool,
        Arc::new(SteppingClock::new()),
        Arc::new(UuidV7Generator),
    )
}

pub fn slug_store(pool: PgPool) -> SoftDeleteStore<Slug> {
    SoftDeleteStore::new(pool)
}

/// An unsaved widget.
pub fn new_widget(store: &SoftDeleteStore<Widget>, label: &str) -> Widget {
    Widget {
        meta: store.new_meta(),
        label: label.to_string(),
        quantity: 1,
        note: None,
    }
}

pub fn label(value: &str) -> Fields {
    Fields::new().with("label", value)
}

pub async fn create_widget(store: &SoftDeleteStore<Widget>, value: &str) -> Widget {
    store.create(label(value)).await.unwrap()
}
