//! # Storage Traits
//!
//! Storage abstraction used by the domain layer. The ledger only needs three
//! operations from its persistence collaborator: list, create and update.
//! Implementations live in `storage::csv` and `storage::memory`.

use anyhow::Result;
use thiserror::Error;

use crate::domain::ledger_filter::LedgerFilter;
use crate::domain::models::{
    EntryPatch, HistoryRecord, LedgerConfig, LedgerEntry, LedgerEntryDraft, PlanId,
};

/// Trait defining the interface for ledger entry storage operations
///
/// All operations are synchronous request/response calls. A write either
/// fully succeeds and returns the stored entry, or fails without changing
/// anything.
pub trait LedgerStorage: Send + Sync {
    /// List the entries of a plan, most recent activity first.
    /// Stores may use `filter` to narrow the result; callers must not rely on it.
    fn list_entries(&self, plan_id: PlanId, filter: Option<&LedgerFilter>) -> Result<Vec<LedgerEntry>>;

    /// Store a new entry. The store assigns the id; history starts empty.
    fn create_entry(&self, draft: &LedgerEntryDraft) -> Result<LedgerEntry>;

    /// Apply a partial update and return the entry as stored.
    /// The caller has already merged the new history record into `patch.history`.
    fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<LedgerEntry>;
}

/// Trait defining the interface for ledger configuration storage
pub trait LedgerConfigStorage: Send + Sync {
    /// Get the configuration, creating the default one if none exists
    fn get_config(&self) -> Result<LedgerConfig>;

    fn update_config(&self, config: &LedgerConfig) -> Result<()>;
}

/// Writes a store refuses to apply. Returned inside `anyhow::Error` so the
/// domain layer can tell them apart from I/O failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreRejection {
    #[error("Entry not found: {0}")]
    NotFound(String),
    #[error("Entry {id} has {found} history records but the update expected {expected}")]
    HistoryConflict {
        id: String,
        expected: usize,
        found: usize,
    },
    #[error("Entry {0} could not be read and cannot be updated")]
    Unreadable(String),
    #[error("Entry {0} is cancelled in the store")]
    Cancelled(String),
}

/// Check a patch against the stored entry and return the entry to store.
///
/// A cancelled entry is never updated again. The stored history is never
/// shortened or rewritten: when the patch was built from an older copy, the
/// records it adds are appended after the ones already stored.
pub fn apply_patch(existing: &LedgerEntry, patch: &EntryPatch) -> Result<LedgerEntry, StoreRejection> {
    if existing.is_cancelled() {
        return Err(StoreRejection::Cancelled(existing.id.clone()));
    }
    if let Some(expected) = patch.expected_history_len {
        let found = existing.history.len();
        if expected != found {
            return Err(StoreRejection::HistoryConflict {
                id: existing.id.clone(),
                expected,
                found,
            });
        }
    }

    let mut updated = patch.apply_to(existing);
    if let Some(incoming) = &patch.history {
        updated.history = merge_history(&existing.history, incoming);
    }
    Ok(updated)
}

fn merge_history(stored: &[HistoryRecord], incoming: &[HistoryRecord]) -> Vec<HistoryRecord> {
    let shared = stored
        .iter()
        .zip(incoming)
        .take_while(|(a, b)| a == b)
        .count();

    let mut merged = stored.to_vec();
    for record in &incoming[shared..] {
        let mut record = record.clone();
        if let Some(last) = merged.last() {
            record.timestamp = record.timestamp.max(last.timestamp);
        }
        merged.push(record);
    }
    merged
}
