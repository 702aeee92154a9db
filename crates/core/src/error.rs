#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("No {entity} record matches the given lookup")]
    NotFound { entity: &'static str },

    #[error("More than one {entity} record matches a lookup expected to be unique")]
    MultipleMatches { entity: &'static str },

    #[error("Cannot delete unpersisted {entity} record")]
    Unpersisted { entity: &'static str },

    #[error("Unknown column '{column}' on {entity}")]
    UnknownColumn { entity: &'static str, column: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
