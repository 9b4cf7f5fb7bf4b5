//! Matching a detected username against the known seller accounts.
//!
//! A plain case-insensitive string heuristic. Its job is to stop data
//! being uploaded into the wrong account by accident; wrong guesses are
//! recoverable through the mismatch gate.

use serde::{Deserialize, Serialize};

use crate::types::AccountId;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A seller account uploads can target. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Display name shown in the dashboard.
    pub name: String,
    /// Marketplace username, when the account is linked to one.
    #[serde(default)]
    pub platform_username: Option<String>,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>, platform_username: Option<&str>) -> Self {
        Self {
            id,
            name: name.into(),
            platform_username: platform_username.map(str::to_string),
        }
    }
}

/// How a suggested account relates to the detected username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Case-insensitive equality.
    Exact,
    /// Case-insensitive substring containment, in either direction.
    Partial,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Partial => "partial",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked account suggestion for an upload entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSuggestion {
    pub account_id: AccountId,
    pub account_name: String,
    pub match_type: MatchType,
}

/// Relationship between an entry's selected account and its detected
/// username.
///
/// Partial overlap and no overlap both surface as [`MatchStatus::Warning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Nothing detected, or nothing selected.
    None,
    Exact,
    Warning,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Exact => "exact",
            Self::Warning => "warning",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pure functions
// ---------------------------------------------------------------------------

/// Classify a single account username against a detected username.
///
/// Both inputs must already be trimmed. Returns `None` when unrelated.
pub fn classify(detected: &str, account_username: &str) -> Option<MatchType> {
    if detected.is_empty() || account_username.is_empty() {
        return None;
    }
    let detected = detected.to_lowercase();
    let candidate = account_username.to_lowercase();

    if detected == candidate {
        Some(MatchType::Exact)
    } else if detected.contains(&candidate) || candidate.contains(&detected) {
        Some(MatchType::Partial)
    } else {
        None
    }
}

/// Rank the accounts related to `detected`: every exact match before every
/// partial match, each tier in account-list order.
pub fn suggest_accounts(detected: Option<&str>, accounts: &[Account]) -> Vec<AccountSuggestion> {
    let Some(detected) = detected.map(str::trim).filter(|d| !d.is_empty()) else {
        return Vec::new();
    };

    let mut suggestions: Vec<AccountSuggestion> = accounts
        .iter()
        .filter_map(|account| {
            let username = account.platform_username.as_deref()?.trim();
            classify(detected, username).map(|match_type| AccountSuggestion {
                account_id: account.id,
                account_name: account.name.clone(),
                match_type,
            })
        })
        .collect();

    // `sort_by_key` is stable, so list order survives within a tier.
    suggestions.sort_by_key(|s| s.match_type);
    suggestions
}

/// The first exact suggestion, if any.
pub fn best_exact_match(suggestions: &[AccountSuggestion]) -> Option<&AccountSuggestion> {
    suggestions
        .iter()
        .find(|s| s.match_type == MatchType::Exact)
}

/// Compare the selected account with the detected username.
pub fn match_status(selected: Option<&Account>, detected: Option<&str>) -> MatchStatus {
    let Some(detected) = detected.map(str::trim).filter(|d| !d.is_empty()) else {
        return MatchStatus::None;
    };
    let Some(account) = selected else {
        return MatchStatus::None;
    };

    match account.platform_username.as_deref().map(str::trim) {
        Some(username) if classify(detected, username) == Some(MatchType::Exact) => {
            MatchStatus::Exact
        }
        _ => MatchStatus::Warning,
    }
}

/// Find an account by id.
pub fn find_account(accounts: &[Account], id: AccountId) -> Option<&Account> {
    accounts.iter().find(|a| a.id == id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
