//! Account-directory collaborator: the read-only source of the seller
//! accounts uploads can target.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use sellerdesk_core::account_match::Account;

/// Errors from loading the account list.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Account API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to read accounts file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed account list: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Supplies the current list of accounts.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<Account>, DirectoryError>;
}

/// Account list payloads accepted from files and the API: either a bare
/// array or `{ "accounts": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AccountList {
    Bare(Vec<Account>),
    Wrapped { accounts: Vec<Account> },
}

impl AccountList {
    pub(crate) fn into_accounts(self) -> Vec<Account> {
        match self {
            Self::Bare(accounts) | Self::Wrapped { accounts } => accounts,
        }
    }
}

/// A fixed account list, typically read from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct StaticAccountDirectory {
    accounts: Vec<Account>,
}

impl StaticAccountDirectory {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    /// Parse an account list from JSON text.
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let list: AccountList = serde_json::from_str(json)?;
        Ok(Self::new(list.into_accounts()))
    }

    /// Read and parse an account list file.
    pub async fn from_json_file(path: &Path) -> Result<Self, DirectoryError> {
        let json = tokio::fs::read_to_string(path).await?;
        let directory = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            count = directory.accounts.len(),
            "Loaded accounts file",
        );
        Ok(directory)
    }
}

#[async_trait]
impl AccountDirectory for StaticAccountDirectory {
    async fn list_accounts(&self) -> Result<Vec<Account>, DirectoryError> {
        Ok(self.accounts.clone())
    }
}
