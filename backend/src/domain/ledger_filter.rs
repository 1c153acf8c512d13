//! Filtering of ledger entries.
//!
//! Every criterion is optional and they combine with AND. Evaluation is pure:
//! the same criteria over the same entries always give the same result.
//! Date bounds are inclusive and compare the calendar day of the entry in the
//! offset it was recorded with, so a caller in another timezone does not
//! shift entries across midnight.

use chrono::NaiveDate;

use crate::domain::models::{ActivityType, LedgerEntry};

/// Activity type criterion. `All` bypasses the check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActivityTypeFilter {
    #[default]
    All,
    Only(ActivityType),
}

impl ActivityTypeFilter {
    /// Parse a filter value such as `"Colheita"` or the sentinel `"All"` / `"Todos"`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "all" | "todos" | "todas" => Some(ActivityTypeFilter::All),
            other => ActivityType::from_wire(other).map(ActivityTypeFilter::Only),
        }
    }

    pub fn matches(&self, activity_type: ActivityType) -> bool {
        match self {
            ActivityTypeFilter::All => true,
            ActivityTypeFilter::Only(expected) => *expected == activity_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFilter {
    /// Cancelled entries are hidden unless this is set
    pub include_cancelled: bool,
    pub activity_type: ActivityTypeFilter,
    /// Case-insensitive substring of the product
    pub product: Option<String>,
    /// Case-insensitive substring of the joined location path
    pub location: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl LedgerFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn including_cancelled(mut self, include: bool) -> Self {
        self.include_cancelled = include;
        self
    }

    pub fn with_activity_type(mut self, activity_type: ActivityType) -> Self {
        self.activity_type = ActivityTypeFilter::Only(activity_type);
        self
    }

    pub fn with_product(mut self, product: &str) -> Self {
        self.product = Some(product.to_string());
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if !self.include_cancelled && entry.is_cancelled() {
            return false;
        }
        if !self.activity_type.matches(entry.activity_type) {
            return false;
        }
        if let Some(needle) = non_blank(&self.product) {
            if !contains_ignoring_case(&entry.product, needle) {
                return false;
            }
        }
        if let Some(needle) = non_blank(&self.location) {
            if !contains_ignoring_case(&entry.joined_locations(), needle) {
                return false;
            }
        }

        let day = entry.timestamp.date_naive();
        if self.date_from.is_some_and(|from| day < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| day > to) {
            return false;
        }
        true
    }

    pub fn apply(&self, entries: &[LedgerEntry]) -> Vec<LedgerEntry> {
        entries.iter().filter(|e| self.matches(e)).cloned().collect()
    }
}

/// Entries satisfying every criterion, in their original order
pub fn filter_entries(entries: &[LedgerEntry], criteria: &LedgerFilter) -> Vec<LedgerEntry> {
    criteria.apply(entries)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn contains_ignoring_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
