//! Confirmation gate in front of every upload start.
//!
//! When the selected account does not exactly match the username detected
//! in the file, the upload is held until the user confirms. Partial and
//! unrelated matches are presented identically.

use serde::{Deserialize, Serialize};

use crate::account_match::{Account, MatchStatus};
use crate::types::{AccountId, EntryId};
use crate::upload_entry::UploadEntry;

/// What the user is shown before a mismatched upload may start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchPrompt {
    pub entry_id: EntryId,
    pub file_name: String,
    pub detected_username: String,
    pub account_id: AccountId,
    pub account_name: String,
    pub account_platform_username: Option<String>,
}

impl MismatchPrompt {
    /// Single-paragraph description suitable for a dialog or terminal.
    pub fn describe(&self) -> String {
        let linked = match &self.account_platform_username {
            Some(username) => format!("'{}' ({username})", self.account_name),
            None => format!("'{}' (no linked username)", self.account_name),
        };
        format!(
            "File '{}' looks like it belongs to '{}', but it is about to be uploaded to {linked}.",
            self.file_name, self.detected_username
        )
    }
}

/// Outcome of consulting the gate for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// No detection, no selection, or an exact match.
    Proceed,
    /// Hold the transition until the user answers.
    Confirm(MismatchPrompt),
}

/// Consult the gate for `entry` with its current selection and detection.
pub fn evaluate(entry: &UploadEntry, accounts: &[Account]) -> GateDecision {
    if entry.match_status(accounts) != MatchStatus::Warning {
        return GateDecision::Proceed;
    }
    // Warning implies both a detection and a resolvable selection.
    let (Some(account), Some(detected)) =
        (entry.selected_account(accounts), entry.detected_username())
    else {
        return GateDecision::Proceed;
    };

    GateDecision::Confirm(MismatchPrompt {
        entry_id: entry.id(),
        file_name: entry.file_name().to_string(),
        detected_username: detected.to_string(),
        account_id: account.id,
        account_name: account.name.clone(),
        account_platform_username: account.platform_username.clone(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
