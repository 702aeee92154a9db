//! Primary key generation.

use uuid::Uuid;

use crate::types::RecordId;

/// Produces globally unique primary keys at record construction.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> RecordId;
}

/// Time-ordered UUID v7 keys, so insertion order roughly follows key order.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn generate(&self) -> RecordId {
        Uuid::now_v7()
    }
}
