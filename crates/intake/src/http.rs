//! HTTP implementations of the transfer and account-directory
//! collaborators, using [`reqwest`].
//!
//! Endpoints, relative to the configured API base URL:
//!
//! - `POST /uploads/{data_type}`: multipart form with `account_id`,
//!   `data_type` and a `file` part.
//! - `GET /accounts`: the account list.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use sellerdesk_core::account_match::Account;
use sellerdesk_core::upload_entry::TransferReceipt;

use crate::config::IntakeConfig;
use crate::directory::{AccountDirectory, AccountList, DirectoryError};
use crate::transfer::{FileTransfer, ProgressReporter, TransferError, TransferRequest};

/// Streaming progress stops here; the last step is the server's reply.
pub const MAX_STREAMING_PERCENT: u8 = 95;

/// Body returned by the upload endpoint.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    rows_processed: u64,
    #[serde(default)]
    records_created: u64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Percent of the body handed to the connection, scaled to
/// `0..=MAX_STREAMING_PERCENT`.
pub fn streaming_percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return MAX_STREAMING_PERCENT;
    }
    let scaled = (sent.min(total) as u128 * MAX_STREAMING_PERCENT as u128) / total as u128;
    scaled as u8
}

/// Build a client with the configured whole-request timeout.
pub fn build_client(config: &IntakeConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Uploads files as streamed multipart bodies.
pub struct HttpFileTransfer {
    client: reqwest::Client,
    api_url: String,
    chunk_size: usize,
}

impl HttpFileTransfer {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &IntakeConfig) -> Self {
        Self::new(client, config.api_url.clone(), config.chunk_size_bytes)
    }

    fn upload_url(&self, request: &TransferRequest) -> String {
        format!("{}/uploads/{}", self.api_url, request.data_type)
    }

    /// Wrap the file content in a body stream that reports progress as
    /// each chunk is pulled by the connection. Chunks are views into the
    /// shared content, never copies.
    fn progress_body(&self, request: &TransferRequest, progress: ProgressReporter) -> reqwest::Body {
        let content = Bytes::from_owner(request.content.clone());
        let total = content.len();
        let chunk_size = self.chunk_size;

        let chunks = (0..total).step_by(chunk_size).map(move |start| {
            Ok::<_, std::io::Error>(content.slice(start..(start + chunk_size).min(total)))
        });
        let mut sent = 0usize;
        let stream = futures::stream::iter(chunks).inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                sent += bytes.len();
                progress.report(streaming_percent(sent, total), None);
            }
        });
        reqwest::Body::wrap_stream(stream)
    }
}

#[async_trait]
impl FileTransfer for HttpFileTransfer {
    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressReporter,
    ) -> Result<TransferReceipt, TransferError> {
        progress.report(0, Some(format!("Uploading {}", request.file_name)));

        let body = self.progress_body(&request, progress.clone());
        let part = Part::stream_with_length(body, request.content.len() as u64)
            .file_name(request.file_name.clone())
            .mime_str("text/csv")?;
        let form = Form::new()
            .text("account_id", request.account_id.to_string())
            .text("data_type", request.data_type.as_str())
            .part("file", part);

        let response = self
            .client
            .post(self.upload_url(&request))
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;

        progress.report(MAX_STREAMING_PERCENT, Some("Processing on server".into()));

        let response = ensure_success(response, |status, body| TransferError::Api { status, body })
            .await?;
        let body: UploadResponse = response.json().await.map_err(request_error)?;
        into_receipt(body)
    }
}

/// A timed-out request is the client giving up, not a transport failure.
fn request_error(e: reqwest::Error) -> TransferError {
    if e.is_timeout() {
        TransferError::Aborted("no response before the request timeout".to_string())
    } else {
        TransferError::Request(e)
    }
}

fn into_receipt(body: UploadResponse) -> Result<TransferReceipt, TransferError> {
    if body.success == Some(false) {
        let reason = body
            .error
            .or(body.message)
            .unwrap_or_else(|| "server reported failure".to_string());
        return Err(TransferError::Rejected(reason));
    }
    Ok(TransferReceipt {
        rows_processed: body.rows_processed,
        records_created: body.records_created,
        message: body.message,
    })
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Reads the account list from the dashboard API.
pub struct HttpAccountDirectory {
    client: reqwest::Client,
    api_url: String,
}

impl HttpAccountDirectory {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl AccountDirectory for HttpAccountDirectory {
    async fn list_accounts(&self) -> Result<Vec<Account>, DirectoryError> {
        let response = self
            .client
            .get(format!("{}/accounts", self.api_url))
            .send()
            .await?;
        let response = ensure_success(response, |status, body| DirectoryError::Api { status, body })
            .await?;
        let list: AccountList = response.json().await?;
        Ok(list.into_accounts())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Return the response unchanged on a success status, or build an error
/// from the status code and body text.
async fn ensure_success<E>(
    response: reqwest::Response,
    to_error: impl FnOnce(u16, String) -> E,
) -> Result<reqwest::Response, E> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(to_error(status.as_u16(), body));
    }
    Ok(response)
}
