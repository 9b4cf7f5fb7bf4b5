//! File-transfer collaborator: the capability that actually ships a file's
//! bytes to the dashboard for one account and data type.
//!
//! Implementations report progress through a [`ProgressReporter`]; the
//! coordinator applies those reports to the entry on its own task.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use sellerdesk_core::types::{AccountId, EntryId};
use sellerdesk_core::upload_entry::{DataType, TransferReceipt};

/// Everything a transfer needs about one entry.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub entry_id: EntryId,
    pub file_name: String,
    pub content: Arc<[u8]>,
    pub account_id: AccountId,
    pub data_type: DataType,
}

/// A single progress callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProgress {
    /// Percent complete (0-100).
    pub percent: u8,
    pub message: Option<String>,
}

/// Progress callback handed to a [`FileTransfer`].
///
/// Reports after the coordinator stopped listening are dropped.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<TransferProgress>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::UnboundedSender<TransferProgress>) -> Self {
        Self { tx }
    }

    /// A reporter connected to a fresh channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransferProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn report(&self, percent: u8, message: Option<String>) {
        let _ = self.tx.send(TransferProgress { percent, message });
    }
}

/// Errors from a transfer attempt. All of them end in the entry's
/// `failed` state; none abort the batch.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The upload endpoint returned a non-2xx status code.
    #[error("Upload API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The server accepted the request but refused the file's contents.
    #[error("Upload rejected: {0}")]
    Rejected(String),

    /// The client gave up waiting, e.g. the request timeout elapsed.
    #[error("Upload aborted: {0}")]
    Aborted(String),
}

/// Ships one file to the dashboard.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressReporter,
    ) -> Result<TransferReceipt, TransferError>;
}
