//! Shared fixtures for intake integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sellerdesk_core::account_match::Account;
use sellerdesk_core::upload_entry::{FileRef, TransferReceipt};
use sellerdesk_intake::transfer::{FileTransfer, ProgressReporter, TransferError, TransferRequest};

/// Accounts used across the scenarios: two linked, one unlinked.
pub fn accounts() -> Vec<Account> {
    vec![
        Account::new(1, "Alice", Some("alice")),
        Account::new(2, "Carol", Some("carol")),
        Account::new(3, "Warehouse", None),
    ]
}

/// A CSV export whose seller column names `username`.
pub fn csv_for(name: &str, username: &str) -> FileRef {
    FileRef::new(
        name,
        format!("Order Id,Seller Username,Total\n1001,{username},19.99\n1002,{username},5.00\n")
            .into_bytes(),
    )
}

/// A CSV export with no identity column.
pub fn anonymous_csv(name: &str) -> FileRef {
    FileRef::new(name, b"Order Id,Total\n1001,19.99\n".to_vec())
}

/// What the fake transfer does for one file name.
#[derive(Debug, Clone)]
pub struct Script {
    pub progress: Vec<u8>,
    pub result: Result<TransferReceipt, String>,
}

impl Script {
    pub fn succeed(rows: u64) -> Self {
        Self {
            progress: vec![25, 50, 95],
            result: Ok(TransferReceipt {
                rows_processed: rows,
                records_created: rows,
                message: None,
            }),
        }
    }

    pub fn fail(reason: &str) -> Self {
        Self {
            progress: vec![30],
            result: Err(reason.to_string()),
        }
    }
}

/// In-memory [`FileTransfer`] that replays a [`Script`] per file name and
/// records every request it receives. Unscripted files succeed.
#[derive(Default)]
pub struct FakeTransfer {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<TransferRequest>>,
}

impl FakeTransfer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, file_name: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(file_name.to_string(), script);
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn uploaded_files(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.file_name)
            .collect()
    }
}

#[async_trait]
impl FileTransfer for FakeTransfer {
    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressReporter,
    ) -> Result<TransferReceipt, TransferError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&request.file_name)
            .cloned()
            .unwrap_or_else(|| Script::succeed(1));
        self.requests.lock().unwrap().push(request);

        for percent in script.progress {
            progress.report(percent, None);
            tokio::task::yield_now().await;
        }
        script.result.map_err(TransferError::Rejected)
    }
}
