//! # Domain Module
//!
//! Business logic of the field activity ledger, independent of any storage
//! mechanism or user interface.
//!
//! ## Module Organization
//!
//! - **detail_schema**: normalizes loosely-typed technical details into typed variants
//! - **audit_trail**: edit and cancellation rules, append-only history
//! - **aggregation**: production totals with unit promotion (kg to ton, m² to ha)
//! - **ledger_filter**: pure, conjunctive entry filtering
//! - **ledger_service**: create, edit and cancel against a `LedgerStorage`
//! - **ledger_view**: per-session entry state with stale-response protection
//! - **ledger_table**: table row and summary formatting
//! - **record_mapper**: conversion between stored records and domain entries
//!
//! ## Business Rules
//!
//! - Entries are never deleted; cancellation re-tags them as `CANCELADO`
//! - Cancelled entries cannot be edited or cancelled again
//! - Every edit and cancellation needs a justification of at least five characters
//! - History records are only ever appended
//! - Only active harvests count towards production totals

pub mod aggregation;
pub mod audit_trail;
pub mod commands;
pub mod detail_schema;
pub mod error;
pub mod ledger_filter;
pub mod ledger_service;
pub mod ledger_table;
pub mod ledger_view;
pub mod models;
pub mod record_mapper;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use aggregation::{AggregationEngine, NumberFormat, ProductionTotals, QuantityKeys};
pub use audit_trail::{AuditTrail, MIN_REASON_CHARS};
pub use commands::entries::*;
pub use error::{LedgerError, LedgerResult};
pub use ledger_filter::{filter_entries, ActivityTypeFilter, LedgerFilter};
pub use ledger_service::LedgerService;
pub use ledger_table::{DateFormat, LedgerTableConfig, LedgerTableService};
pub use ledger_view::{FetchOutcome, FetchTicket, LedgerView};
pub use record_mapper::LedgerRecordMapper;
