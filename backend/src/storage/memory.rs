//! In-memory `LedgerStorage`.
//!
//! Holds entries in a `Mutex<Vec<_>>`. Used by unit and scenario tests and by
//! callers that want a ledger without touching the disk. `set_unavailable`
//! makes every call fail, standing in for an unreachable remote store.

use anyhow::{anyhow, Result};
use log::info;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::traits::{apply_patch, LedgerStorage, StoreRejection};
use crate::domain::ledger_filter::LedgerFilter;
use crate::domain::models::{EntryPatch, LedgerEntry, LedgerEntryDraft, PlanId};

#[derive(Default)]
pub struct InMemoryLedgerStore {
    entries: Mutex<Vec<LedgerEntry>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with entries, e.g. rows imported from elsewhere
    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Default::default()
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful create and update calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of a stored entry, bypassing listing order and filters
    pub fn get(&self, id: &str) -> Option<LedgerEntry> {
        self.lock().iter().find(|e| e.id == id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LedgerEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow!("ledger store is unavailable"));
        }
        Ok(())
    }
}

impl LedgerStorage for InMemoryLedgerStore {
    fn list_entries(&self, plan_id: PlanId, filter: Option<&LedgerFilter>) -> Result<Vec<LedgerEntry>> {
        self.ensure_available()?;
        let mut entries: Vec<LedgerEntry> = self
            .lock()
            .iter()
            .filter(|e| e.plan_id == plan_id)
            .filter(|e| filter.map_or(true, |f| f.matches(e)))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    fn create_entry(&self, draft: &LedgerEntryDraft) -> Result<LedgerEntry> {
        self.ensure_available()?;
        let entry = draft.clone().into_entry(format!("entry::{}", Uuid::new_v4()));
        self.lock().push(entry.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        info!("Stored entry {} for plan {}", entry.id, entry.plan_id);
        Ok(entry)
    }

    fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<LedgerEntry> {
        self.ensure_available()?;
        let mut entries = self.lock();
        let slot = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreRejection::NotFound(id.to_string()))?;

        *slot = apply_patch(slot, patch)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        info!("Updated entry {}", id);
        Ok(slot.clone())
    }
}
