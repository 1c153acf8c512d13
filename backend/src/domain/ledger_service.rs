//! Ledger service domain logic.
//!
//! Orchestrates create, edit and cancel against a `LedgerStorage`. Validation
//! and the justification guard run before anything is sent to the store, and
//! the entry returned to the caller is always the one the store confirmed.
//! Callers should only update their in-memory state from that return value.
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;

use crate::domain::aggregation::{AggregationEngine, QuantityKeys};
use crate::domain::audit_trail::AuditTrail;
use crate::domain::commands::entries::{CancelEntryCommand, CreateEntryCommand, EditEntryCommand};
use crate::domain::detail_schema;
use crate::domain::error::{LedgerError, LedgerResult};
use crate::domain::ledger_filter::LedgerFilter;
use crate::domain::models::{
    split_locations, EntryPatch, LedgerConfig, LedgerEntry, LedgerEntryDraft, PlanId,
};
use crate::storage::traits::{LedgerStorage, StoreRejection};

#[derive(Clone)]
pub struct LedgerService {
    storage: Arc<dyn LedgerStorage>,
    audit: AuditTrail,
    aggregation: AggregationEngine,
    optimistic_concurrency: bool,
}

impl LedgerService {
    pub fn new(storage: Arc<dyn LedgerStorage>) -> Self {
        Self::with_config(storage, &LedgerConfig::default())
    }

    pub fn with_config(storage: Arc<dyn LedgerStorage>, config: &LedgerConfig) -> Self {
        Self {
            storage,
            audit: AuditTrail::from_config(config),
            aggregation: AggregationEngine::from_config(config),
            optimistic_concurrency: config.optimistic_concurrency,
        }
    }

    pub fn audit_trail(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn aggregation(&self) -> &AggregationEngine {
        &self.aggregation
    }

    /// Entries of a plan matching `filter`, most recent first.
    ///
    /// The filter is handed to the store and applied again here, so the result
    /// is the same whether or not the store honours it.
    pub fn list_entries(
        &self,
        plan_id: PlanId,
        filter: Option<&LedgerFilter>,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let mut entries = self.storage.list_entries(plan_id, filter)?;
        if let Some(filter) = filter {
            entries.retain(|e| filter.matches(e));
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    pub fn create_entry(&self, command: CreateEntryCommand) -> LedgerResult<LedgerEntry> {
        if command.activity_type.is_cancelled() {
            return Err(LedgerError::InvalidChange(
                "an entry cannot be created already cancelled".to_string(),
            ));
        }
        let product = command.product.trim();
        if product.is_empty() {
            return Err(LedgerError::Validation("product cannot be empty".to_string()));
        }
        if let Some(value) = command.quantity_value {
            if !value.is_finite() {
                return Err(LedgerError::Validation(format!("invalid quantity: {}", value)));
            }
        }

        let technical_details = detail_schema::normalize(
            command.activity_type,
            command.subtype,
            &command.technical_details,
        );
        if !technical_details.is_validated() {
            warn!(
                "Technical details for new {} entry in plan {} did not validate, storing them as given",
                command.activity_type, command.plan_id
            );
        }

        let draft = LedgerEntryDraft {
            plan_id: command.plan_id,
            timestamp: command.timestamp.unwrap_or_else(|| Utc::now().fixed_offset()),
            activity_type: command.activity_type,
            product: product.to_string(),
            locations: command
                .locations
                .iter()
                .flat_map(|l| split_locations(l))
                .collect(),
            quantity_value: command.quantity_value,
            quantity_unit: command
                .quantity_unit
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            note: command.note,
            technical_details,
        };

        let entry = self.storage.create_entry(&draft)?;
        info!(
            "Created {} entry {} in plan {}",
            entry.activity_type, entry.id, entry.plan_id
        );
        Ok(entry)
    }

    /// Edit an active entry. Returns the entry as stored after the edit.
    pub fn edit_entry(
        &self,
        entry: &LedgerEntry,
        command: EditEntryCommand,
    ) -> LedgerResult<LedgerEntry> {
        let patch = self
            .audit
            .prepare_edit(entry, &command.changes, &command.reason, Utc::now())?;
        if let Some(details) = &patch.technical_details {
            if !details.is_validated() {
                warn!(
                    "Technical details for entry {} did not validate, storing them as given",
                    entry.id
                );
            }
        }

        let updated = self.write(entry, patch)?;
        info!(
            "Edited entry {} ({} history records)",
            updated.id,
            updated.history.len()
        );
        Ok(updated)
    }

    /// Soft-cancel an active entry. Returns the entry as stored after cancellation.
    pub fn cancel_entry(
        &self,
        entry: &LedgerEntry,
        command: CancelEntryCommand,
    ) -> LedgerResult<LedgerEntry> {
        let patch = self
            .audit
            .prepare_cancel(entry, &command.reason, Utc::now())?;
        let cancelled = self.write(entry, patch).map_err(|e| match e {
            LedgerError::EntryCancelled { id } => LedgerError::AlreadyCancelled { id },
            other => other,
        })?;
        info!("Cancelled entry {}", cancelled.id);
        Ok(cancelled)
    }

    /// Production total of the harvests among `entries`, e.g. "3,2 ton + 12 caixas"
    pub fn production_summary(&self, entries: &[LedgerEntry]) -> String {
        let harvests: Vec<LedgerEntry> = entries
            .iter()
            .filter(|e| e.activity_type.counts_for_production())
            .cloned()
            .collect();
        self.aggregation.summarize(&harvests, &QuantityKeys::ENTRY)
    }

    fn write(&self, entry: &LedgerEntry, mut patch: EntryPatch) -> LedgerResult<LedgerEntry> {
        if self.optimistic_concurrency {
            patch.expected_history_len = Some(entry.history.len());
        }
        self.storage
            .update_entry(&entry.id, &patch)
            .map_err(storage_error)
    }
}

fn storage_error(err: anyhow::Error) -> LedgerError {
    match err.downcast_ref::<StoreRejection>() {
        Some(StoreRejection::NotFound(id)) => LedgerError::NotFound(id.clone()),
        Some(StoreRejection::HistoryConflict {
            id,
            expected,
            found,
        }) => LedgerError::Conflict {
            id: id.clone(),
            expected: *expected,
            found: *found,
        },
        Some(StoreRejection::Cancelled(id)) => LedgerError::EntryCancelled { id: id.clone() },
        Some(StoreRejection::Unreadable(_)) | None => LedgerError::Storage(err),
    }
}
