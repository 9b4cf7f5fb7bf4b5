//! Intake events broadcast by the coordinator.
//!
//! Subscribers (a UI, the CLI progress printer) get every event through a
//! [`tokio::sync::broadcast`] channel. Events published with no
//! subscriber are dropped.

use serde::Serialize;

use sellerdesk_core::mismatch_gate::MismatchPrompt;
use sellerdesk_core::types::{AccountId, EntryId};

use crate::coordinator::BatchReport;

/// Broadcast channel capacity for intake events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A state change in the upload batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntakeEvent {
    EntryAdded {
        entry_id: EntryId,
        file_name: String,
        detected_username: Option<String>,
    },

    EntryRemoved { entry_id: EntryId },

    UploadStarted {
        entry_id: EntryId,
        account_id: AccountId,
    },

    UploadProgress {
        entry_id: EntryId,
        /// Completion percentage (0-100).
        percent: u8,
        message: Option<String>,
    },

    UploadCompleted {
        entry_id: EntryId,
        rows_processed: u64,
        records_created: u64,
    },

    UploadFailed { entry_id: EntryId, error: String },

    /// An upload is waiting on the user to confirm an account mismatch.
    MismatchPrompted { prompt: MismatchPrompt },

    /// The user declined; the entry was left untouched.
    MismatchCancelled { entry_id: EntryId },

    /// An "upload all" run finished.
    BatchFinished { report: BatchReport },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = IntakeEvent::UploadProgress {
            entry_id: uuid::Uuid::nil(),
            percent: 42,
            message: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "upload_progress");
        assert_eq!(json["percent"], 42);
        assert!(json["message"].is_null());
    }
}
