//! Per-file upload record and its state machine.
//!
//! ```text
//! pending ──begin_upload──▶ uploading ──complete──▶ completed
//!    ▲                          │
//!    └────────retry──── failed ◀┘ fail
//! ```
//!
//! `begin_upload` is also accepted from `failed`, which applies the retry
//! reset first. Every other transition is rejected with
//! [`CoreError::InvalidTransition`] and leaves the entry untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::account_match::{self, Account, AccountSuggestion, MatchStatus};
use crate::error::CoreError;
use crate::types::{AccountId, EntryId, Timestamp};
use crate::username_detection::detect_username;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// File extensions accepted by the bulk upload table (lowercase, no dot).
pub const ACCEPTED_EXTENSIONS: &[&str] = &["csv"];

/// Largest file accepted into a batch (50 MiB).
pub const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Upload status
// ---------------------------------------------------------------------------

/// Lifecycle state of one upload entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a status string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "uploading" => Some(Self::Uploading),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// All valid status values.
    pub const ALL: &'static [&'static str] = &["pending", "uploading", "completed", "failed"];
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Data type
// ---------------------------------------------------------------------------

/// Category tag telling the server how to interpret the file's rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Order,
    Listing,
    Customer,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Listing => "listing",
            Self::Customer => "customer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "order" => Some(Self::Order),
            "listing" => Some(Self::Listing),
            "customer" => Some(Self::Customer),
            _ => None,
        }
    }

    pub const ALL: &'static [&'static str] = &["order", "listing", "customer"];
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a data type name (case-insensitive, surrounding whitespace ignored).
pub fn parse_data_type(s: &str) -> Result<DataType, CoreError> {
    DataType::from_str(&s.trim().to_lowercase()).ok_or_else(|| {
        CoreError::Validation(format!(
            "Unknown data type: '{s}'. Valid types: {}",
            DataType::ALL.join(", ")
        ))
    })
}

// ---------------------------------------------------------------------------
// File reference and receipt
// ---------------------------------------------------------------------------

/// A user-selected file: name, size and a shared handle to its bytes.
#[derive(Clone, Serialize)]
pub struct FileRef {
    pub name: String,
    pub size_bytes: u64,
    #[serde(skip)]
    content: Arc<[u8]>,
}

impl FileRef {
    pub fn new(name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size_bytes: content.len() as u64,
            content,
        }
    }

    /// Cheap clone of the content handle.
    pub fn content(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }

    /// Lowercase extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

impl std::fmt::Debug for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRef")
            .field("name", &self.name)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// Validate a file before it joins a batch.
pub fn validate_file(file: &FileRef) -> Result<(), CoreError> {
    if file.name.trim().is_empty() {
        return Err(CoreError::Validation("File name must not be empty".to_string()));
    }
    match file.extension() {
        Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => {
            return Err(CoreError::Validation(format!(
                "Unsupported file '{}'. Accepted extensions: {}",
                file.name,
                ACCEPTED_EXTENSIONS.join(", ")
            )))
        }
    }
    if file.size_bytes == 0 {
        return Err(CoreError::Validation(format!("File '{}' is empty", file.name)));
    }
    if file.size_bytes > MAX_FILE_SIZE_BYTES {
        return Err(CoreError::Validation(format!(
            "File '{}' is {} bytes, exceeds maximum of {MAX_FILE_SIZE_BYTES}",
            file.name, file.size_bytes
        )));
    }
    Ok(())
}

/// Record counts reported by the server for a successful transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    #[serde(default)]
    pub rows_processed: u64,
    #[serde(default)]
    pub records_created: u64,
    /// Optional server-provided summary line.
    #[serde(default)]
    pub message: Option<String>,
}

impl TransferReceipt {
    /// Message shown on a completed entry.
    pub fn summary(&self) -> String {
        match &self.message {
            Some(msg) if !msg.trim().is_empty() => msg.clone(),
            _ => format!(
                "Processed {} rows, created {} records",
                self.rows_processed, self.records_created
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Upload entry
// ---------------------------------------------------------------------------

/// One file pending or undergoing transfer.
///
/// Fields are only reachable through the transition methods so that the
/// status/progress invariants cannot be broken from outside.
#[derive(Debug, Clone, Serialize)]
pub struct UploadEntry {
    id: EntryId,
    file: FileRef,
    selected_account_id: Option<AccountId>,
    data_type: DataType,
    status: UploadStatus,
    progress: u8,
    message: Option<String>,
    detected_username: Option<String>,
    suggested_accounts: Vec<AccountSuggestion>,
    receipt: Option<TransferReceipt>,
    added_at: Timestamp,
    completed_at: Option<Timestamp>,
}

impl UploadEntry {
    /// Create a pending entry, running username detection and account
    /// suggestion against `accounts`. No account is preselected.
    pub fn new(file: FileRef, data_type: DataType, accounts: &[Account]) -> Self {
        let detected_username = detect_username(&file.content);
        let suggested_accounts =
            account_match::suggest_accounts(detected_username.as_deref(), accounts);

        Self {
            id: uuid::Uuid::new_v4(),
            file,
            selected_account_id: None,
            data_type,
            status: UploadStatus::Pending,
            progress: 0,
            message: None,
            detected_username,
            suggested_accounts,
            receipt: None,
            added_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    // ---- accessors ----

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    pub fn file_name(&self) -> &str {
        &self.file.name
    }

    pub fn selected_account_id(&self) -> Option<AccountId> {
        self.selected_account_id
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn detected_username(&self) -> Option<&str> {
        self.detected_username.as_deref()
    }

    pub fn suggested_accounts(&self) -> &[AccountSuggestion] {
        &self.suggested_accounts
    }

    pub fn receipt(&self) -> Option<&TransferReceipt> {
        self.receipt.as_ref()
    }

    pub fn added_at(&self) -> Timestamp {
        self.added_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    /// Whether "upload all" should pick this entry up.
    pub fn is_eligible(&self) -> bool {
        matches!(self.status, UploadStatus::Pending | UploadStatus::Failed)
            && self.selected_account_id.is_some()
    }

    /// The selected account, resolved against `accounts`.
    pub fn selected_account<'a>(&self, accounts: &'a [Account]) -> Option<&'a Account> {
        self.selected_account_id
            .and_then(|id| account_match::find_account(accounts, id))
    }

    /// Match status of the current selection against the detection.
    pub fn match_status(&self, accounts: &[Account]) -> MatchStatus {
        account_match::match_status(self.selected_account(accounts), self.detected_username())
    }

    // ---- configuration (pending / failed only) ----

    pub fn select_account(&mut self, account_id: Option<AccountId>) -> Result<(), CoreError> {
        self.ensure_editable("change account")?;
        self.selected_account_id = account_id;
        Ok(())
    }

    pub fn set_data_type(&mut self, data_type: DataType) -> Result<(), CoreError> {
        self.ensure_editable("change data type")?;
        self.data_type = data_type;
        Ok(())
    }

    /// Re-run suggestions after the account list changed.
    pub fn refresh_suggestions(&mut self, accounts: &[Account]) {
        self.suggested_accounts =
            account_match::suggest_accounts(self.detected_username.as_deref(), accounts);
    }

    // ---- transitions ----

    /// `pending | failed → uploading`.
    ///
    /// Requires a selection that resolves against `accounts`.
    pub fn begin_upload(&mut self, accounts: &[Account]) -> Result<(), CoreError> {
        self.ensure_editable("start upload")?;
        let account_id = self.selected_account_id.ok_or_else(|| {
            CoreError::Validation(format!(
                "Select an account for '{}' before uploading",
                self.file.name
            ))
        })?;
        if account_match::find_account(accounts, account_id).is_none() {
            return Err(CoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            });
        }

        if self.status == UploadStatus::Failed {
            self.reset_attempt();
        }
        self.status = UploadStatus::Uploading;
        self.progress = 0;
        self.message = None;
        Ok(())
    }

    /// Apply a progress callback. Percent is clamped to 100 and never
    /// moves backwards within an attempt.
    pub fn apply_progress(&mut self, percent: u8, message: Option<String>) -> Result<(), CoreError> {
        self.ensure_status(UploadStatus::Uploading, "report progress")?;
        self.progress = self.progress.max(percent.min(100));
        if message.is_some() {
            self.message = message;
        }
        Ok(())
    }

    /// `uploading → completed`.
    pub fn complete(&mut self, receipt: TransferReceipt) -> Result<(), CoreError> {
        self.ensure_status(UploadStatus::Uploading, "complete upload")?;
        self.status = UploadStatus::Completed;
        self.progress = 100;
        self.message = Some(receipt.summary());
        self.receipt = Some(receipt);
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// `uploading → failed`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        self.ensure_status(UploadStatus::Uploading, "fail upload")?;
        self.status = UploadStatus::Failed;
        self.progress = 0;
        self.message = Some(reason.into());
        Ok(())
    }

    /// `failed → pending`: progress back to 0, message cleared.
    pub fn retry(&mut self) -> Result<(), CoreError> {
        self.ensure_status(UploadStatus::Failed, "retry")?;
        self.reset_attempt();
        self.status = UploadStatus::Pending;
        Ok(())
    }

    /// Removal is allowed from every state except `uploading`.
    pub fn ensure_removable(&self) -> Result<(), CoreError> {
        if self.status == UploadStatus::Uploading {
            return Err(CoreError::InvalidTransition {
                from: self.status.as_str(),
                action: "remove",
            });
        }
        Ok(())
    }

    // ---- private helpers ----

    fn reset_attempt(&mut self) {
        self.progress = 0;
        self.message = None;
        self.receipt = None;
        self.completed_at = None;
    }

    fn ensure_editable(&self, action: &'static str) -> Result<(), CoreError> {
        match self.status {
            UploadStatus::Pending | UploadStatus::Failed => Ok(()),
            other => Err(CoreError::InvalidTransition {
                from: other.as_str(),
                action,
            }),
        }
    }

    fn ensure_status(&self, expected: UploadStatus, action: &'static str) -> Result<(), CoreError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: self.status.as_str(),
                action,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
