//! Domain types and pure logic shared by the persistence and HTTP layers.
//!
//! Nothing in this crate touches the database.

pub mod clock;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod types;
