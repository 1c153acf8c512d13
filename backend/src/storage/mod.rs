//! # Storage Module
//!
//! Persistence for the ledger. The domain layer only sees the traits in
//! `traits`; `csv` and `memory` are interchangeable implementations.

pub mod csv;
pub mod memory;
pub mod traits;

pub use memory::InMemoryLedgerStore;
pub use traits::{LedgerConfigStorage, LedgerStorage, StoreRejection};
