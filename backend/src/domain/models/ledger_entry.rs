//! Domain model for a ledger entry and its audit trail.
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use std::fmt;

use super::activity::ActivityType;
use super::location::{join_locations, LocationPath};
use super::technical_details::TechnicalDetails;

pub type EntryId = String;
pub type PlanId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Edit,
    Cancel,
}

impl HistoryAction {
    pub fn as_wire(&self) -> &'static str {
        match self {
            HistoryAction::Edit => "EDIT",
            HistoryAction::Cancel => "CANCEL",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "EDIT" => Some(HistoryAction::Edit),
            "CANCEL" => Some(HistoryAction::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Externally visible fields captured just before a change
#[derive(Debug, Clone, PartialEq)]
pub struct PriorSnapshot {
    pub activity_type: ActivityType,
    pub product: String,
    pub quantity_value: Option<f64>,
    pub quantity_unit: Option<String>,
}

impl PriorSnapshot {
    pub fn of(entry: &LedgerEntry) -> Self {
        Self {
            activity_type: entry.activity_type,
            product: entry.product.clone(),
            quantity_value: entry.quantity_value,
            quantity_unit: entry.quantity_unit.clone(),
        }
    }

    /// Visible fields that differ between this snapshot and a later state
    pub fn changes_to(&self, later: &PriorSnapshot) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        if self.activity_type != later.activity_type {
            changes.push(FieldChange::new(
                "activity_type",
                self.activity_type.as_wire(),
                later.activity_type.as_wire(),
            ));
        }
        if self.product != later.product {
            changes.push(FieldChange::new("product", &self.product, &later.product));
        }
        if self.quantity_value != later.quantity_value || self.quantity_unit != later.quantity_unit {
            changes.push(FieldChange::new(
                "quantity",
                &quantity_label(self.quantity_value, self.quantity_unit.as_deref()),
                &quantity_label(later.quantity_value, later.quantity_unit.as_deref()),
            ));
        }
        changes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub before: String,
    pub after: String,
}

impl FieldChange {
    fn new(field: &'static str, before: &str, after: &str) -> Self {
        Self {
            field,
            before: before.to_string(),
            after: after.to_string(),
        }
    }
}

fn quantity_label(value: Option<f64>, unit: Option<&str>) -> String {
    match (value, unit) {
        (Some(v), Some(u)) => format!("{} {}", v, u),
        (Some(v), None) => v.to_string(),
        (None, _) => "-".to_string(),
    }
}

/// One append-only audit trail element
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    pub reason: String,
    pub prior_snapshot: PriorSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub plan_id: PlanId,
    /// When the activity happened, in the offset it was recorded with
    pub timestamp: DateTime<FixedOffset>,
    pub activity_type: ActivityType,
    pub product: String,
    pub locations: Vec<String>,
    pub quantity_value: Option<f64>,
    pub quantity_unit: Option<String>,
    pub note: String,
    pub technical_details: TechnicalDetails,
    pub history: Vec<HistoryRecord>,
}

impl LedgerEntry {
    pub fn is_cancelled(&self) -> bool {
        self.activity_type.is_cancelled()
    }

    pub fn joined_locations(&self) -> String {
        join_locations(&self.locations)
    }

    pub fn location_paths(&self) -> Vec<LocationPath> {
        self.locations
            .iter()
            .filter_map(|p| LocationPath::parse(p))
            .collect()
    }

    /// The activity type the entry had before it was cancelled, if it was
    pub fn type_before_cancellation(&self) -> Option<ActivityType> {
        self.history
            .iter()
            .rev()
            .find(|h| h.action == HistoryAction::Cancel)
            .map(|h| h.prior_snapshot.activity_type)
    }

    /// Read a field by its stored name. Top-level quantity columns first,
    /// then canonical technical detail keys.
    pub fn field_value(&self, key: &str) -> Option<Value> {
        match key {
            "quantity_value" => self.quantity_value.map(Value::from),
            "quantity_unit" => self.quantity_unit.clone().map(Value::String),
            "product" => Some(Value::String(self.product.clone())),
            "note" => Some(Value::String(self.note.clone())),
            _ => self.technical_details.field(key),
        }
    }

    /// Each history record paired with the visible changes it introduced
    pub fn change_log(&self) -> Vec<(&HistoryRecord, Vec<FieldChange>)> {
        let current = PriorSnapshot::of(self);
        self.history
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let after = self
                    .history
                    .get(i + 1)
                    .map(|next| &next.prior_snapshot)
                    .unwrap_or(&current);
                (record, record.prior_snapshot.changes_to(after))
            })
            .collect()
    }
}

/// A new entry before the store assigns its id and history
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntryDraft {
    pub plan_id: PlanId,
    pub timestamp: DateTime<FixedOffset>,
    pub activity_type: ActivityType,
    pub product: String,
    pub locations: Vec<String>,
    pub quantity_value: Option<f64>,
    pub quantity_unit: Option<String>,
    pub note: String,
    pub technical_details: TechnicalDetails,
}

impl LedgerEntryDraft {
    pub fn into_entry(self, id: EntryId) -> LedgerEntry {
        LedgerEntry {
            id,
            plan_id: self.plan_id,
            timestamp: self.timestamp,
            activity_type: self.activity_type,
            product: self.product,
            locations: self.locations,
            quantity_value: self.quantity_value,
            quantity_unit: self.quantity_unit,
            note: self.note,
            technical_details: self.technical_details,
            history: Vec::new(),
        }
    }
}

/// Partial update sent to the store.
///
/// `history`, when present, must be the full trail: the previous records
/// unchanged followed by the new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub activity_type: Option<ActivityType>,
    pub product: Option<String>,
    pub locations: Option<Vec<String>>,
    pub quantity_value: Option<Option<f64>>,
    pub quantity_unit: Option<Option<String>>,
    pub note: Option<String>,
    pub technical_details: Option<TechnicalDetails>,
    pub history: Option<Vec<HistoryRecord>>,
    /// History length the patch was built against; checked by stores when set
    pub expected_history_len: Option<usize>,
}

impl EntryPatch {
    pub fn apply_to(&self, entry: &LedgerEntry) -> LedgerEntry {
        let mut updated = entry.clone();
        if let Some(timestamp) = self.timestamp {
            updated.timestamp = timestamp;
        }
        if let Some(activity_type) = self.activity_type {
            updated.activity_type = activity_type;
        }
        if let Some(product) = &self.product {
            updated.product = product.clone();
        }
        if let Some(locations) = &self.locations {
            updated.locations = locations.clone();
        }
        if let Some(quantity_value) = self.quantity_value {
            updated.quantity_value = quantity_value;
        }
        if let Some(quantity_unit) = &self.quantity_unit {
            updated.quantity_unit = quantity_unit.clone();
        }
        if let Some(note) = &self.note {
            updated.note = note.clone();
        }
        if let Some(details) = &self.technical_details {
            updated.technical_details = details.clone();
        }
        if let Some(history) = &self.history {
            updated.history = history.clone();
        }
        updated
    }
}
