//! Batch coordinator: the single owner of the upload batch.
//!
//! [`IntakeCoordinator`] holds the [`UploadBatch`], the account snapshot
//! and the transfer collaborator. Every mutation goes through `&mut self`,
//! so the batch is only ever changed by one operation at a time. While a
//! transfer is in flight its progress reports arrive over a channel and
//! are applied between polls of the transfer future.
//!
//! Uploads are sequential: "upload all" ships eligible entries one at a
//! time in display order, and a failed transfer never stops the run.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use sellerdesk_core::account_match::Account;
use sellerdesk_core::batch::{BatchSummary, UploadBatch};
use sellerdesk_core::error::CoreError;
use sellerdesk_core::mismatch_gate::{self, GateDecision};
use sellerdesk_core::types::{AccountId, EntryId};
use sellerdesk_core::upload_entry::{DataType, FileRef, TransferReceipt, UploadEntry, UploadStatus};

use crate::confirm::MismatchConfirmer;
use crate::directory::{AccountDirectory, DirectoryError};
use crate::events::{IntakeEvent, EVENT_CHANNEL_CAPACITY};
use crate::transfer::{FileTransfer, ProgressReporter, TransferProgress, TransferRequest};

/// Errors returned by coordinator operations.
///
/// Transfer failures are not errors here; they become the entry's
/// `failed` state.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// How a single upload attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed(TransferReceipt),
    Failed(String),
    /// The user declined the mismatch prompt; nothing changed.
    Cancelled,
}

/// Aggregate result of an "upload all" run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Entries that were eligible when the run started.
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    /// Entries left untouched: mismatch cancelled, or refused before start.
    pub skipped: usize,
    /// Batch counts after the run.
    pub summary: BatchSummary,
}

pub struct IntakeCoordinator {
    batch: UploadBatch,
    accounts: Vec<Account>,
    transfer: Arc<dyn FileTransfer>,
    event_tx: broadcast::Sender<IntakeEvent>,
}

impl IntakeCoordinator {
    pub fn new(transfer: Arc<dyn FileTransfer>, accounts: Vec<Account>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            batch: UploadBatch::new(),
            accounts,
            transfer,
            event_tx,
        }
    }

    /// Create a coordinator with the accounts currently in `directory`.
    pub async fn load(
        transfer: Arc<dyn FileTransfer>,
        directory: &dyn AccountDirectory,
    ) -> Result<Self, IntakeError> {
        let accounts = directory.list_accounts().await?;
        tracing::info!(count = accounts.len(), "Loaded seller accounts");
        Ok(Self::new(transfer, accounts))
    }

    /// Subscribe to intake events.
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.event_tx.subscribe()
    }

    pub fn batch(&self) -> &UploadBatch {
        &self.batch
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn entry(&self, id: EntryId) -> Result<&UploadEntry, IntakeError> {
        Ok(self.batch.entry(id)?)
    }

    pub fn summary(&self) -> BatchSummary {
        self.batch.summary()
    }

    /// Reload the account list and re-rank every entry's suggestions.
    ///
    /// Existing selections are kept; one that no longer resolves is caught
    /// when its upload starts.
    pub async fn refresh_accounts(
        &mut self,
        directory: &dyn AccountDirectory,
    ) -> Result<(), IntakeError> {
        self.accounts = directory.list_accounts().await?;
        self.batch.refresh_suggestions(&self.accounts);
        tracing::info!(count = self.accounts.len(), "Refreshed seller accounts");
        Ok(())
    }

    // ---- batch editing ----

    pub fn add_file(&mut self, file: FileRef, data_type: DataType) -> Result<EntryId, IntakeError> {
        let id = self.batch.add_file(file, data_type, &self.accounts)?;
        let entry = self.batch.entry(id)?;

        tracing::info!(
            entry_id = %id,
            file = %entry.file_name(),
            size_bytes = entry.file().size_bytes,
            detected = ?entry.detected_username(),
            suggestions = entry.suggested_accounts().len(),
            "File added to batch",
        );
        self.publish(IntakeEvent::EntryAdded {
            entry_id: id,
            file_name: entry.file_name().to_string(),
            detected_username: entry.detected_username().map(str::to_string),
        });
        Ok(id)
    }

    pub fn select_account(
        &mut self,
        id: EntryId,
        account_id: Option<AccountId>,
    ) -> Result<(), IntakeError> {
        Ok(self.batch.select_account(id, account_id)?)
    }

    pub fn set_data_type(&mut self, id: EntryId, data_type: DataType) -> Result<(), IntakeError> {
        Ok(self.batch.set_data_type(id, data_type)?)
    }

    /// `failed → pending` for one entry.
    pub fn retry(&mut self, id: EntryId) -> Result<(), IntakeError> {
        self.batch.retry(id)?;
        tracing::debug!(entry_id = %id, "Entry reset for retry");
        Ok(())
    }

    pub fn remove(&mut self, id: EntryId) -> Result<(), IntakeError> {
        self.batch.remove(id)?;
        self.publish(IntakeEvent::EntryRemoved { entry_id: id });
        Ok(())
    }

    /// Remove every completed entry. Returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let completed: Vec<EntryId> = self
            .batch
            .entries()
            .iter()
            .filter(|e| e.status() == UploadStatus::Completed)
            .map(UploadEntry::id)
            .collect();
        let removed = self.batch.clear_completed();
        for entry_id in completed {
            self.publish(IntakeEvent::EntryRemoved { entry_id });
        }
        removed
    }

    /// Empty the batch. Rejected while an upload is in flight.
    pub fn reset(&mut self) -> Result<usize, IntakeError> {
        let ids: Vec<EntryId> = self.batch.entries().iter().map(UploadEntry::id).collect();
        let removed = self.batch.reset()?;
        for entry_id in ids {
            self.publish(IntakeEvent::EntryRemoved { entry_id });
        }
        tracing::info!(removed, "Batch reset");
        Ok(removed)
    }

    // ---- uploads ----

    /// Upload one entry, passing through the mismatch gate first.
    ///
    /// Returns `Err` only when the upload could not start (wrong state,
    /// no selection, unknown account). A transfer failure is
    /// `Ok(UploadOutcome::Failed)`.
    pub async fn upload_one(
        &mut self,
        id: EntryId,
        confirmer: &dyn MismatchConfirmer,
    ) -> Result<UploadOutcome, IntakeError> {
        let entry = self.batch.entry(id)?;
        if !matches!(entry.status(), UploadStatus::Pending | UploadStatus::Failed) {
            return Err(CoreError::InvalidTransition {
                from: entry.status().as_str(),
                action: "start upload",
            }
            .into());
        }
        if entry.selected_account_id().is_none() {
            return Err(CoreError::Validation(format!(
                "Select an account for '{}' before uploading",
                entry.file_name()
            ))
            .into());
        }

        if let GateDecision::Confirm(prompt) = mismatch_gate::evaluate(entry, &self.accounts) {
            tracing::warn!(
                entry_id = %id,
                file = %prompt.file_name,
                detected = %prompt.detected_username,
                account_id = prompt.account_id,
                "Account mismatch, waiting for confirmation",
            );
            self.publish(IntakeEvent::MismatchPrompted {
                prompt: prompt.clone(),
            });

            if !confirmer.confirm(&prompt).await {
                tracing::info!(entry_id = %id, "Mismatch upload cancelled");
                self.publish(IntakeEvent::MismatchCancelled { entry_id: id });
                return Ok(UploadOutcome::Cancelled);
            }
        }

        let entry = self.batch.entry_mut(id)?;
        entry.begin_upload(&self.accounts)?;
        let request = TransferRequest {
            entry_id: id,
            file_name: entry.file_name().to_string(),
            content: entry.file().content(),
            // begin_upload guarantees a resolvable selection
            account_id: entry.selected_account_id().unwrap_or_default(),
            data_type: entry.data_type(),
        };

        tracing::info!(
            entry_id = %id,
            file = %request.file_name,
            account_id = request.account_id,
            data_type = %request.data_type,
            "Upload started",
        );
        self.publish(IntakeEvent::UploadStarted {
            entry_id: id,
            account_id: request.account_id,
        });

        Ok(self.drive_transfer(request).await)
    }

    /// Upload every eligible entry, one at a time, in display order.
    ///
    /// Refused while any entry is uploading.
    pub async fn upload_all(
        &mut self,
        confirmer: &dyn MismatchConfirmer,
    ) -> Result<BatchReport, IntakeError> {
        if self.batch.is_uploading() {
            return Err(CoreError::Conflict("An upload is already in progress".to_string()).into());
        }

        let ids = self.batch.eligible_ids();
        let mut report = BatchReport {
            attempted: ids.len(),
            ..BatchReport::default()
        };
        tracing::info!(eligible = ids.len(), "Uploading all eligible files");

        for id in ids {
            match self.upload_one(id, confirmer).await {
                Ok(UploadOutcome::Completed(_)) => report.completed += 1,
                Ok(UploadOutcome::Failed(_)) => report.failed += 1,
                Ok(UploadOutcome::Cancelled) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(entry_id = %id, error = %e, "Skipping entry");
                    report.skipped += 1;
                }
            }
        }

        report.summary = self.batch.summary();
        tracing::info!(
            attempted = report.attempted,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            "Upload all finished",
        );
        self.publish(IntakeEvent::BatchFinished {
            report: report.clone(),
        });
        Ok(report)
    }

    // ---- private helpers ----

    /// Run one transfer to completion, applying progress as it arrives,
    /// then resolve the entry to completed or failed.
    async fn drive_transfer(&mut self, request: TransferRequest) -> UploadOutcome {
        let id = request.entry_id;
        let (reporter, mut progress_rx) = ProgressReporter::channel();
        let transfer = Arc::clone(&self.transfer);
        let mut transfer_fut = transfer.transfer(request, reporter);

        let result = loop {
            tokio::select! {
                biased;
                Some(progress) = progress_rx.recv() => self.apply_progress(id, progress),
                result = &mut transfer_fut => break result,
            }
        };
        // Reports still queued belong to the finished attempt.
        drop(progress_rx);

        match result {
            Ok(receipt) => self.resolve_completed(id, receipt),
            Err(e) => self.resolve_failed(id, e.to_string()),
        }
    }

    fn apply_progress(&mut self, id: EntryId, progress: TransferProgress) {
        let TransferProgress { percent, message } = progress;
        let applied = self
            .batch
            .entry_mut(id)
            .and_then(|entry| entry.apply_progress(percent, message.clone()).map(|_| entry.progress()));

        match applied {
            Ok(percent) => {
                tracing::debug!(entry_id = %id, percent, "Upload progress");
                self.publish(IntakeEvent::UploadProgress {
                    entry_id: id,
                    percent,
                    message,
                });
            }
            Err(e) => tracing::warn!(entry_id = %id, error = %e, "Dropped progress report"),
        }
    }

    fn resolve_completed(&mut self, id: EntryId, receipt: TransferReceipt) -> UploadOutcome {
        if let Err(e) = self
            .batch
            .entry_mut(id)
            .and_then(|entry| entry.complete(receipt.clone()))
        {
            tracing::error!(entry_id = %id, error = %e, "Failed to mark upload completed");
            return UploadOutcome::Failed(e.to_string());
        }

        tracing::info!(
            entry_id = %id,
            rows_processed = receipt.rows_processed,
            records_created = receipt.records_created,
            "Upload completed",
        );
        self.publish(IntakeEvent::UploadCompleted {
            entry_id: id,
            rows_processed: receipt.rows_processed,
            records_created: receipt.records_created,
        });
        UploadOutcome::Completed(receipt)
    }

    fn resolve_failed(&mut self, id: EntryId, reason: String) -> UploadOutcome {
        if let Err(e) = self
            .batch
            .entry_mut(id)
            .and_then(|entry| entry.fail(reason.clone()))
        {
            tracing::error!(entry_id = %id, error = %e, "Failed to mark upload failed");
        }

        tracing::warn!(entry_id = %id, error = %reason, "Upload failed");
        self.publish(IntakeEvent::UploadFailed {
            entry_id: id,
            error: reason.clone(),
        });
        UploadOutcome::Failed(reason)
    }

    fn publish(&self, event: IntakeEvent) {
        // A send error only means nobody is subscribed.
        let _ = self.event_tx.send(event);
    }
}
