//! Audit trail rules for ledger entries.
//!
//! An entry is `Active` until it is cancelled; `Cancelled` is terminal.
//! Every edit and the cancellation append exactly one `HistoryRecord`
//! holding the justification and a snapshot of the visible fields as they
//! were before the change. Existing records are never rewritten, removed or
//! reordered.
//!
//! This module only builds the `EntryPatch` for a write. Guards run first, so
//! a rejected call never produces a patch and never reaches the store.

use chrono::{DateTime, Utc};

use crate::domain::commands::entries::EntryChanges;
use crate::domain::detail_schema;
use crate::domain::error::{LedgerError, LedgerResult};
use crate::domain::models::{
    ActivityType, EntryPatch, HistoryAction, HistoryRecord, LedgerConfig, LedgerEntry,
    PriorSnapshot,
};

/// Minimum length, in characters after trimming, of an edit or cancel justification
pub const MIN_REASON_CHARS: usize = 5;

/// Check a justification and return it trimmed
pub fn validate_reason(reason: &str) -> LedgerResult<&str> {
    let trimmed = reason.trim();
    let length = trimmed.chars().count();
    if length < MIN_REASON_CHARS {
        return Err(LedgerError::reason_too_short(length));
    }
    Ok(trimmed)
}

#[derive(Debug, Clone)]
pub struct AuditTrail {
    cancellation_marker: String,
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(&LedgerConfig::default().cancellation_marker)
    }
}

impl AuditTrail {
    pub fn new(cancellation_marker: &str) -> Self {
        Self {
            cancellation_marker: cancellation_marker.trim().to_string(),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(&config.cancellation_marker)
    }

    /// Build the patch for an edit of an active entry.
    pub fn prepare_edit(
        &self,
        entry: &LedgerEntry,
        changes: &EntryChanges,
        reason: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<EntryPatch> {
        if entry.is_cancelled() {
            return Err(LedgerError::EntryCancelled {
                id: entry.id.clone(),
            });
        }
        let reason = validate_reason(reason)?;

        if changes.is_empty() {
            return Err(LedgerError::InvalidChange("nothing to change".to_string()));
        }
        if let Some(requested) = changes.activity_type {
            if requested != entry.activity_type {
                return Err(LedgerError::InvalidChange(format!(
                    "the activity type of entry {} is fixed at creation ({} cannot become {})",
                    entry.id, entry.activity_type, requested
                )));
            }
        }
        if let Some(product) = &changes.product {
            if product.trim().is_empty() {
                return Err(LedgerError::Validation("product cannot be empty".to_string()));
            }
        }
        if let Some(Some(value)) = changes.quantity_value {
            if !value.is_finite() {
                return Err(LedgerError::Validation(format!("invalid quantity: {}", value)));
            }
        }

        let technical_details = match &changes.technical_details {
            Some(raw) => Some(detail_schema::normalize(entry.activity_type, changes.subtype, raw)),
            None if changes.subtype.is_some() => Some(detail_schema::normalize(
                entry.activity_type,
                changes.subtype,
                &entry.technical_details.to_map(),
            )),
            None => None,
        };

        Ok(EntryPatch {
            activity_type: None,
            timestamp: changes.timestamp,
            product: changes.product.as_ref().map(|p| p.trim().to_string()),
            locations: changes.locations.as_ref().map(|paths| clean_locations(paths)),
            quantity_value: changes.quantity_value,
            quantity_unit: changes
                .quantity_unit
                .as_ref()
                .map(|unit| unit.as_ref().map(|u| u.trim().to_string()).filter(|u| !u.is_empty())),
            note: changes.note.clone(),
            technical_details,
            history: Some(append_history(entry, HistoryAction::Edit, reason, now)),
            expected_history_len: None,
        })
    }

    /// Build the patch that moves an active entry to `Cancelled`.
    pub fn prepare_cancel(
        &self,
        entry: &LedgerEntry,
        reason: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<EntryPatch> {
        if entry.is_cancelled() {
            return Err(LedgerError::AlreadyCancelled {
                id: entry.id.clone(),
            });
        }
        let reason = validate_reason(reason)?;

        Ok(EntryPatch {
            activity_type: Some(ActivityType::Cancelled),
            product: Some(format!("{} {}", self.cancellation_marker, entry.product)),
            note: Some(self.cancelled_note(reason, &entry.note)),
            history: Some(append_history(entry, HistoryAction::Cancel, reason, now)),
            ..Default::default()
        })
    }

    /// Banner line placed ahead of the note of a cancelled entry
    pub fn cancellation_banner(&self, reason: &str) -> String {
        let single_line: String = reason
            .trim()
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        format!("{} Motivo: {}", self.cancellation_marker, single_line)
    }

    fn cancelled_note(&self, reason: &str, original: &str) -> String {
        let banner = self.cancellation_banner(reason);
        if original.is_empty() {
            banner
        } else {
            format!("{}\n{}", banner, original)
        }
    }

    /// Recover the note as it was before cancellation
    pub fn original_note<'a>(&self, note: &'a str) -> &'a str {
        if !note.starts_with(&self.cancellation_marker) {
            return note;
        }
        match note.split_once('\n') {
            Some((_, original)) => original,
            None => "",
        }
    }

    /// Recover the product label as it was before cancellation
    pub fn original_product<'a>(&self, product: &'a str) -> &'a str {
        product
            .strip_prefix(&self.cancellation_marker)
            .map(str::trim_start)
            .unwrap_or(product)
    }
}

/// Full history with one new record appended. The new record is never
/// stamped earlier than the last one, so the trail stays chronological even
/// if the wall clock steps back.
fn append_history(
    entry: &LedgerEntry,
    action: HistoryAction,
    reason: &str,
    now: DateTime<Utc>,
) -> Vec<HistoryRecord> {
    let timestamp = entry
        .history
        .last()
        .map_or(now, |last| now.max(last.timestamp));

    let mut history = entry.history.clone();
    history.push(HistoryRecord {
        timestamp,
        action,
        reason: reason.to_string(),
        prior_snapshot: PriorSnapshot::of(entry),
    });
    history
}

fn clean_locations(paths: &[String]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
