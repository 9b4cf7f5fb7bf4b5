//! Best-effort detection of the platform username an uploaded CSV
//! belongs to.
//!
//! This module has zero external effects (no I/O, no async). Detection
//! never fails: anything unrecognisable or malformed yields `None`.
//!
//! Two shapes are recognised:
//!
//! - Report preambles: `Seller ID: alice` or `Seller ID,alice` lines above
//!   the real header, as produced by marketplace report exports. A line led
//!   by an identity label with exactly one other non-empty cell is read
//!   this way, so an identity header needs at least three columns.
//! - Identity columns: a header row containing e.g. `Seller Username`,
//!   with the username repeated on every data row.

use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of leading lines inspected for `key: value` preamble metadata,
/// and also the number of rows searched for an identity header.
pub const MAX_PREAMBLE_LINES: usize = 10;

/// Number of data rows below the identity header that are sampled.
pub const MAX_SAMPLE_ROWS: usize = 20;

/// Longest string accepted as a platform username.
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Identity labels in priority order, normalised with [`normalize_label`].
///
/// When a header carries several of these, the earliest entry here wins,
/// regardless of column position. Buyer columns are deliberately absent.
pub const IDENTITY_LABELS: &[&str] = &[
    "sellerusername",
    "selleruserid",
    "sellerid",
    "ebayusername",
    "ebayuserid",
    "seller",
    "username",
    "userid",
    "accountname",
    "account",
    "storeowner",
];

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._*\-]+$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Detect the platform username a tabular file was exported for.
///
/// Preamble metadata takes precedence over identity columns.
pub fn detect_username(content: &[u8]) -> Option<String> {
    let decoded = String::from_utf8_lossy(content);
    let text = decoded.strip_prefix('\u{feff}').unwrap_or(&*decoded);
    if text.trim().is_empty() {
        return None;
    }

    detect_from_preamble(text).or_else(|| detect_from_columns(text))
}

/// Lowercase a header label and drop everything but ASCII alphanumerics,
/// so `"Seller  User-ID"` and `"seller_user_id"` compare equal.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Accept a raw cell value as a username candidate.
///
/// Returns the trimmed value when it is 1..=[`MAX_USERNAME_LENGTH`]
/// characters of `[A-Za-z0-9._*-]`.
pub fn accept_candidate(raw: &str) -> Option<String> {
    let value = raw.trim().trim_matches('"').trim();
    if value.is_empty() || value.len() > MAX_USERNAME_LENGTH {
        return None;
    }
    USERNAME_RE.is_match(value).then(|| value.to_string())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Priority of an identity label (lower wins), or `None` if the label is
/// not an identity label.
fn identity_rank(label: &str) -> Option<usize> {
    let normalized = normalize_label(label);
    IDENTITY_LABELS.iter().position(|l| *l == normalized)
}

fn detect_from_preamble(text: &str) -> Option<String> {
    for line in text.lines().take(MAX_PREAMBLE_LINES) {
        let value = match line.split_once(':') {
            Some((key, value)) if identity_rank(key).is_some() => value
                .trim_matches(|c: char| c == '"' || c == ',' || c.is_whitespace())
                .to_string(),
            _ => match preamble_pair(line) {
                Some(value) => value,
                None => continue,
            },
        };
        if let Some(username) = accept_candidate(&value) {
            return Some(username);
        }
    }
    None
}

/// Value of a `key,value` metadata line: exactly two non-empty cells, the
/// first of them an identity label.
fn preamble_pair(line: &str) -> Option<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    let record = reader.records().next()?.ok()?;

    let first = record.get(0)?;
    if identity_rank(first).is_none() {
        return None;
    }
    let mut cells = record.iter().filter(|cell| !cell.is_empty());
    let (_key, value, rest) = (cells.next()?, cells.next()?, cells.next());
    rest.is_none().then(|| value.to_string())
}

fn detect_from_columns(text: &str) -> Option<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut column: Option<usize> = None;
    let mut rows_seen = 0usize;
    let mut sampled = 0usize;

    for record in reader.records() {
        let Ok(record) = record else {
            return None;
        };
        rows_seen += 1;

        let Some(idx) = column else {
            column = record
                .iter()
                .enumerate()
                .filter_map(|(i, cell)| identity_rank(cell).map(|rank| (rank, i)))
                .min()
                .map(|(_, i)| i);
            if column.is_none() && rows_seen >= MAX_PREAMBLE_LINES {
                return None;
            }
            continue;
        };

        sampled += 1;
        match record.get(idx).map(str::trim) {
            Some(cell) if !cell.is_empty() => return accept_candidate(cell),
            _ => {}
        }
        if sampled >= MAX_SAMPLE_ROWS {
            break;
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
