use serde::{Deserialize, Serialize};

/// A ledger row as exchanged with the external store.
///
/// Field names are part of the compatibility surface and must not be renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Assigned by the store on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning management plan
    pub plan_id: i64,
    /// When the activity occurred (ISO-8601 / RFC 3339)
    pub activity_timestamp: String,
    /// One of "Plantio", "Manejo", "Colheita", "Insumo", "Outro", "CANCELADO"
    pub activity_type: String,
    #[serde(default)]
    pub product: String,
    /// Paths joined with `;`, e.g. "Plot A > Bed 1; Plot A > Bed 2"
    #[serde(default)]
    pub location_path: String,
    #[serde(default)]
    pub quantity_value: Option<f64>,
    #[serde(default)]
    pub quantity_unit: Option<String>,
    #[serde(default)]
    pub note: String,
    /// Activity-specific payload. Usually an object; legacy stores may hold JSON text.
    #[serde(default)]
    pub technical_details: serde_json::Value,
    #[serde(default)]
    pub history: Vec<HistoryRecordDto>,
}

/// One audit trail element as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecordDto {
    /// RFC 3339 wall-clock time of the change
    pub timestamp: String,
    /// "EDIT" or "CANCEL"
    pub action: String,
    pub reason: String,
    pub prior_snapshot: PriorSnapshotDto,
}

/// Externally visible fields of an entry just before a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorSnapshotDto {
    pub activity_type: String,
    pub product: String,
    #[serde(default)]
    pub quantity_value: Option<f64>,
    #[serde(default)]
    pub quantity_unit: Option<String>,
}

/// Represents a ledger entry formatted for table display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedLedgerEntry {
    pub id: String,
    pub formatted_date: String,
    pub activity_label: String,
    /// Uppercased product label
    pub product: String,
    pub locations: String,
    /// Distinct plots referenced by the location paths, in first-seen order
    pub plots: Vec<String>,
    pub formatted_quantity: String,
    pub details_summary: String,
    pub note: String,
    pub history_count: usize,
    pub is_cancelled: bool,
}

/// Totals shown beneath a ledger table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub plan_id: i64,
    pub active_entries: usize,
    pub cancelled_entries: usize,
    /// e.g. "3,2 ton + 12 caixas"
    pub production_total: String,
}
