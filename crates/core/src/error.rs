use crate::types::EntryId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cannot {action} while upload is {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
}

impl CoreError {
    /// Shorthand for a missing upload entry.
    pub fn entry_not_found(id: EntryId) -> Self {
        Self::NotFound {
            entity: "upload_entry",
            id: id.to_string(),
        }
    }
}
