//! The ordered collection of upload entries shown in the bulk upload table.
//!
//! [`UploadBatch`] owns entries in insertion order and exposes the derived
//! [`BatchSummary`]. Counts are recomputed from the entries on every call
//! and never stored.

use serde::{Deserialize, Serialize};

use crate::account_match::Account;
use crate::error::CoreError;
use crate::types::{AccountId, EntryId};
use crate::upload_entry::{validate_file, DataType, FileRef, UploadEntry, UploadStatus};

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Per-status counts over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub completed: usize,
    pub failed: usize,
    /// Entries "upload all" would pick up right now.
    pub ready: usize,
}

impl BatchSummary {
    /// Compute the summary for a slice of entries.
    pub fn from_entries(entries: &[UploadEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };
        for entry in entries {
            match entry.status() {
                UploadStatus::Pending => summary.pending += 1,
                UploadStatus::Uploading => summary.uploading += 1,
                UploadStatus::Completed => summary.completed += 1,
                UploadStatus::Failed => summary.failed += 1,
            }
            if entry.is_eligible() {
                summary.ready += 1;
            }
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Ordered, id-addressable set of upload entries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadBatch {
    entries: Vec<UploadEntry>,
}

impl UploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in display (insertion) order.
    pub fn entries(&self) -> &[UploadEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&UploadEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn entry(&self, id: EntryId) -> Result<&UploadEntry, CoreError> {
        self.get(id).ok_or_else(|| CoreError::entry_not_found(id))
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Result<&mut UploadEntry, CoreError> {
        self.entries
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or_else(|| CoreError::entry_not_found(id))
    }

    /// Validate `file`, create a pending entry for it and append it.
    pub fn add_file(
        &mut self,
        file: FileRef,
        data_type: DataType,
        accounts: &[Account],
    ) -> Result<EntryId, CoreError> {
        validate_file(&file)?;
        let entry = UploadEntry::new(file, data_type, accounts);
        let id = entry.id();
        self.entries.push(entry);
        Ok(id)
    }

    pub fn select_account(
        &mut self,
        id: EntryId,
        account_id: Option<AccountId>,
    ) -> Result<(), CoreError> {
        self.entry_mut(id)?.select_account(account_id)
    }

    pub fn set_data_type(&mut self, id: EntryId, data_type: DataType) -> Result<(), CoreError> {
        self.entry_mut(id)?.set_data_type(data_type)
    }

    pub fn retry(&mut self, id: EntryId) -> Result<(), CoreError> {
        self.entry_mut(id)?.retry()
    }

    /// Remove one entry. Rejected while that entry is uploading.
    pub fn remove(&mut self, id: EntryId) -> Result<UploadEntry, CoreError> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| CoreError::entry_not_found(id))?;
        self.entries[idx].ensure_removable()?;
        Ok(self.entries.remove(idx))
    }

    /// Drop every completed entry. Returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.status() != UploadStatus::Completed);
        before - self.entries.len()
    }

    /// Empty the batch. Rejected while any entry is uploading.
    pub fn reset(&mut self) -> Result<usize, CoreError> {
        if self.is_uploading() {
            return Err(CoreError::Conflict(
                "Cannot reset the batch while an upload is in progress".to_string(),
            ));
        }
        let removed = self.entries.len();
        self.entries.clear();
        Ok(removed)
    }

    /// Re-run account suggestions after the account list changed.
    pub fn refresh_suggestions(&mut self, accounts: &[Account]) {
        for entry in &mut self.entries {
            entry.refresh_suggestions(accounts);
        }
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_entries(&self.entries)
    }

    /// Ids "upload all" should process, in display order.
    pub fn eligible_ids(&self) -> Vec<EntryId> {
        self.entries
            .iter()
            .filter(|e| e.is_eligible())
            .map(UploadEntry::id)
            .collect()
    }

    pub fn is_uploading(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.status() == UploadStatus::Uploading)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
