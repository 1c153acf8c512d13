//! Ledger table domain logic.
//!
//! Turns domain entries into `FormattedLedgerEntry` rows for display and
//! computes the summary line shown beneath a table. Pure formatting, no I/O.
//!
//! ## Core Components
//!
//! - **LedgerTableService**: formats rows and summaries
//! - **LedgerTableConfig**: date format preference
//!
//! Quantities go through the aggregation engine's number format so a row and
//! the total beneath it always use the same separators.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use shared::{FormattedLedgerEntry, LedgerSummary};

use crate::domain::aggregation::{AggregationEngine, QuantityKeys};
use crate::domain::models::{
    ActivityType, LedgerConfig, LedgerEntry, ManagementSubtype, PlanId,
};

/// Date formatting options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DateFormat {
    #[default]
    DayMonthYear, // "10/03/2025"
    Iso,          // "2025-03-10"
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LedgerTableConfig {
    pub date_format: DateFormat,
}

#[derive(Clone)]
pub struct LedgerTableService {
    config: LedgerTableConfig,
    aggregation: AggregationEngine,
}

impl Default for LedgerTableService {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerTableService {
    pub fn new() -> Self {
        Self {
            config: LedgerTableConfig::default(),
            aggregation: AggregationEngine::default(),
        }
    }

    pub fn with_config(config: LedgerTableConfig, ledger_config: &LedgerConfig) -> Self {
        Self {
            config,
            aggregation: AggregationEngine::from_config(ledger_config),
        }
    }

    /// Format a list of entries for table display, keeping their order
    pub fn format_entries_for_table(&self, entries: &[LedgerEntry]) -> Vec<FormattedLedgerEntry> {
        entries.iter().map(|e| self.format_single_entry(e)).collect()
    }

    pub fn format_single_entry(&self, entry: &LedgerEntry) -> FormattedLedgerEntry {
        FormattedLedgerEntry {
            id: entry.id.clone(),
            formatted_date: self.format_date(&entry.timestamp),
            activity_label: activity_label(entry),
            product: entry.product.to_uppercase(),
            locations: entry.joined_locations(),
            plots: distinct_plots(entry),
            formatted_quantity: self
                .aggregation
                .format_quantity(entry.quantity_value, entry.quantity_unit.as_deref()),
            details_summary: entry.technical_details.summary(),
            note: entry.note.clone(),
            history_count: entry.history.len(),
            is_cancelled: entry.is_cancelled(),
        }
    }

    /// Date in the entry's own offset
    pub fn format_date(&self, timestamp: &DateTime<FixedOffset>) -> String {
        match self.config.date_format {
            DateFormat::DayMonthYear => timestamp.format("%d/%m/%Y").to_string(),
            DateFormat::Iso => timestamp.format("%Y-%m-%d").to_string(),
        }
    }

    /// Counts and production total for the entries of one plan
    pub fn summarize(&self, plan_id: PlanId, entries: &[LedgerEntry]) -> LedgerSummary {
        let cancelled_entries = entries.iter().filter(|e| e.is_cancelled()).count();
        let harvests: Vec<LedgerEntry> = entries
            .iter()
            .filter(|e| e.activity_type.counts_for_production())
            .cloned()
            .collect();

        LedgerSummary {
            plan_id,
            active_entries: entries.len() - cancelled_entries,
            cancelled_entries,
            production_total: self.aggregation.summarize(&harvests, &QuantityKeys::ENTRY),
        }
    }
}

fn activity_label(entry: &LedgerEntry) -> String {
    match (entry.activity_type, entry.technical_details.subtype()) {
        (ActivityType::Management, Some(subtype)) => {
            format!("{} · {}", entry.activity_type, subtype_label(subtype))
        }
        (activity_type, _) => activity_type.to_string(),
    }
}

fn subtype_label(subtype: ManagementSubtype) -> &'static str {
    match subtype {
        ManagementSubtype::Sanitization => "Higienização",
        ManagementSubtype::InputApplication => "Aplicação de insumo",
        ManagementSubtype::CulturalOperation => "Operação cultural",
    }
}

fn distinct_plots(entry: &LedgerEntry) -> Vec<String> {
    let mut plots: Vec<String> = Vec::new();
    for path in entry.location_paths() {
        if !plots.contains(&path.plot) {
            plots.push(path.plot);
        }
    }
    plots
}
