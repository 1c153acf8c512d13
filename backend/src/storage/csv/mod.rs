//! # CSV Storage Module
//!
//! File-based storage for the field ledger: one `ledger.csv` per management
//! plan plus a YAML configuration file, all under a single data directory.
//!
//! ## Features
//!
//! - Per-plan ledger files (`plans/{plan_id}/ledger.csv`)
//! - Atomic rewrites through temp files
//! - Unreadable rows kept verbatim instead of dropped
//! - Implements the same `LedgerStorage` trait as the in-memory store

pub mod config_repository;
pub mod connection;
pub mod ledger_repository;

#[cfg(test)]
pub mod test_utils;

pub use config_repository::LedgerConfigRepository;
pub use connection::{CsvConnection, DATA_DIR_ENV};
pub use ledger_repository::LedgerRepository;
