//! `sellerdesk-intake` library crate.
//!
//! Drives the bulk CSV intake workflow from `sellerdesk-core` against real
//! collaborators. Re-exports internal modules for integration testing; the
//! binary entrypoint lives in `main.rs`.

pub mod config;
pub mod confirm;
pub mod coordinator;
pub mod directory;
pub mod events;
pub mod http;
pub mod transfer;
