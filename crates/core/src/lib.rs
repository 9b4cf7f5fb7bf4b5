//! Pure logic for the bulk CSV intake workflow.
//!
//! No database, no async, no I/O. The async driver lives in
//! `sellerdesk-intake`.

pub mod account_match;
pub mod batch;
pub mod error;
pub mod mismatch_gate;
pub mod types;
pub mod upload_entry;
pub mod username_detection;
