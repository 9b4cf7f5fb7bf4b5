//! Integration tests for the HTTP transfer and account directory.
//!
//! Runs the real reqwest collaborators against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use mockito::Matcher;

use sellerdesk_core::upload_entry::{DataType, TransferReceipt};
use sellerdesk_intake::directory::{AccountDirectory, DirectoryError};
use sellerdesk_intake::http::{HttpAccountDirectory, HttpFileTransfer, MAX_STREAMING_PERCENT};
use sellerdesk_intake::transfer::{
    FileTransfer, ProgressReporter, TransferError, TransferProgress, TransferRequest,
};

const CSV: &str = "Order Id,Seller Username,Total\n1001,alice,19.99\n1002,alice,5.00\n";

fn request(data_type: DataType) -> TransferRequest {
    TransferRequest {
        entry_id: uuid::Uuid::new_v4(),
        file_name: "orders.csv".into(),
        content: Arc::from(CSV.as_bytes()),
        account_id: 7,
        data_type,
    }
}

async fn run_transfer(
    transfer: &HttpFileTransfer,
    request: TransferRequest,
) -> (Result<TransferReceipt, TransferError>, Vec<TransferProgress>) {
    let (reporter, mut rx) = ProgressReporter::channel();
    let result = transfer.transfer(request, reporter).await;
    let mut reports = Vec::new();
    while let Ok(report) = rx.try_recv() {
        reports.push(report);
    }
    (result, reports)
}

// ---------------------------------------------------------------------------
// Test: upload
// ---------------------------------------------------------------------------

/// A 200 reply with counts becomes the receipt, and the multipart form
/// carries the account, the data type and the file.
#[tokio::test]
async fn upload_success_returns_counts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/uploads/listing")
        .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("name=\"account_id\"\r\n\r\n7\r\n".into()),
            Matcher::Regex("name=\"data_type\"\r\n\r\nlisting\r\n".into()),
            Matcher::Regex("name=\"file\"; filename=\"orders.csv\"".into()),
            Matcher::Regex("(?i)content-type: text/csv".into()),
            Matcher::Regex("1002,alice,5.00".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "rows_processed": 2, "records_created": 2}"#)
        .create_async()
        .await;

    let transfer = HttpFileTransfer::new(reqwest::Client::new(), server.url(), 16);
    let (result, _) = run_transfer(&transfer, request(DataType::Listing)).await;

    let receipt = result.expect("upload should succeed");
    assert_eq!(receipt.rows_processed, 2);
    assert_eq!(receipt.records_created, 2);
    mock.assert_async().await;
}

/// A non-2xx status is an API error carrying the status and body text.
#[tokio::test]
async fn upload_error_status_keeps_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/uploads/order")
        .with_status(422)
        .with_body("Missing column: Order Number")
        .create_async()
        .await;

    let transfer = HttpFileTransfer::new(reqwest::Client::new(), server.url(), 16);
    let (result, _) = run_transfer(&transfer, request(DataType::Order)).await;

    assert_matches!(
        result,
        Err(TransferError::Api { status: 422, body }) if body == "Missing column: Order Number"
    );
    mock.assert_async().await;
}

/// `success: false` in a 200 reply is a rejection with the server's reason.
#[tokio::test]
async fn upload_success_false_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/uploads/order")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": false, "error": "Duplicate file"}"#)
        .create_async()
        .await;

    let transfer = HttpFileTransfer::new(reqwest::Client::new(), server.url(), 16);
    let (result, _) = run_transfer(&transfer, request(DataType::Order)).await;

    assert_matches!(result, Err(TransferError::Rejected(reason)) if reason == "Duplicate file");
}

/// Streaming progress never passes the cap; the cap itself is reported
/// once the server has the whole body.
#[tokio::test]
async fn upload_progress_stays_under_cap() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/uploads/order")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"rows_processed": 2, "records_created": 2}"#)
        .create_async()
        .await;

    let transfer = HttpFileTransfer::new(reqwest::Client::new(), server.url(), 8);
    let (result, reports) = run_transfer(&transfer, request(DataType::Order)).await;
    assert!(result.is_ok());

    assert_eq!(reports.first().map(|r| r.percent), Some(0));
    assert!(
        reports.iter().all(|r| r.percent <= MAX_STREAMING_PERCENT),
        "progress above cap: {reports:?}"
    );
    let streamed = reports.iter().filter(|r| r.message.is_none()).count();
    assert_eq!(streamed, CSV.len().div_ceil(8));
    assert!(reports
        .iter()
        .any(|r| r.percent == MAX_STREAMING_PERCENT && r.message.as_deref() == Some("Processing on server")));
}

/// A server that never answers ends in `Aborted` once the client timeout
/// elapses.
#[tokio::test]
async fn upload_timeout_is_aborted() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let transfer = HttpFileTransfer::new(client, format!("http://{addr}"), 16);
    let (result, _) = run_transfer(&transfer, request(DataType::Order)).await;

    assert_matches!(result, Err(TransferError::Aborted(_)));
}

// ---------------------------------------------------------------------------
// Test: accounts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accounts_wrapped_payload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/accounts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"accounts": [
                {"id": 1, "name": "Alice", "platform_username": "alice"},
                {"id": 3, "name": "Warehouse", "platform_username": null}
            ]}"#,
        )
        .create_async()
        .await;

    let directory = HttpAccountDirectory::new(reqwest::Client::new(), server.url());
    let accounts = directory.list_accounts().await.unwrap();

    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].platform_username.as_deref(), Some("alice"));
    assert_eq!(accounts[1].platform_username, None);
    mock.assert_async().await;
}

#[tokio::test]
async fn accounts_bare_payload() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/accounts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 2, "name": "Carol", "platform_username": "carol"}]"#)
        .create_async()
        .await;

    let directory = HttpAccountDirectory::new(reqwest::Client::new(), server.url());
    let accounts = directory.list_accounts().await.unwrap();
    assert_eq!(accounts[0].id, 2);
}

#[tokio::test]
async fn accounts_error_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/accounts")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let directory = HttpAccountDirectory::new(reqwest::Client::new(), server.url());
    assert_matches!(
        directory.list_accounts().await,
        Err(DirectoryError::Api { status: 503, body }) if body == "maintenance"
    );
}
