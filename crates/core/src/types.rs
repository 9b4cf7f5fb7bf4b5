/// Accounts are keyed by the dashboard's BIGSERIAL ids.
pub type AccountId = i64;

/// Upload entries live only in memory; a v4 UUID is unique per entry.
pub type EntryId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
