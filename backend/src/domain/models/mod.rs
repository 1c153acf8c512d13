//! Domain models for the field activity ledger.

pub mod activity;
pub mod config;
pub mod ledger_entry;
pub mod location;
pub mod technical_details;

pub use activity::{ActivityType, ManagementSubtype};
pub use config::LedgerConfig;
pub use ledger_entry::{
    EntryId, EntryPatch, FieldChange, HistoryAction, HistoryRecord, LedgerEntry, LedgerEntryDraft,
    PlanId, PriorSnapshot,
};
pub use location::{join_locations, split_locations, LocationPath};
pub use technical_details::{
    CulturalOperationDetails, DetailMap, HarvestDetails, InputApplicationDetails,
    PlantingDetails, SanitizationDetails, TechnicalDetails, ORIGINAL_TYPE_KEY,
};

/// Parse a decimal that may use a comma separator ("2,5" or "2.5").
/// Returns `None` for anything that is not a finite number.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
