//! Entry builders shared by unit tests.
use chrono::DateTime;

use crate::domain::models::{ActivityType, LedgerEntry, TechnicalDetails};

pub(crate) struct EntryBuilder {
    entry: LedgerEntry,
}

pub(crate) fn entry(id: &str) -> EntryBuilder {
    EntryBuilder {
        entry: LedgerEntry {
            id: id.to_string(),
            plan_id: 1,
            timestamp: DateTime::parse_from_rfc3339("2025-03-10T08:00:00-03:00")
                .expect("valid fixture timestamp"),
            activity_type: ActivityType::Harvest,
            product: "Tomate".to_string(),
            locations: Vec::new(),
            quantity_value: None,
            quantity_unit: None,
            note: String::new(),
            technical_details: TechnicalDetails::default(),
            history: Vec::new(),
        },
    }
}

impl EntryBuilder {
    pub(crate) fn plan(mut self, plan_id: i64) -> Self {
        self.entry.plan_id = plan_id;
        self
    }

    pub(crate) fn activity(mut self, activity_type: ActivityType) -> Self {
        self.entry.activity_type = activity_type;
        self
    }

    pub(crate) fn product(mut self, product: &str) -> Self {
        self.entry.product = product.to_string();
        self
    }

    pub(crate) fn quantity(mut self, value: f64, unit: &str) -> Self {
        self.entry.quantity_value = Some(value);
        self.entry.quantity_unit = Some(unit.to_string());
        self
    }

    pub(crate) fn at(mut self, rfc3339: &str) -> Self {
        self.entry.timestamp =
            DateTime::parse_from_rfc3339(rfc3339).expect("valid fixture timestamp");
        self
    }

    pub(crate) fn locations(mut self, paths: &[&str]) -> Self {
        self.entry.locations = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub(crate) fn note(mut self, note: &str) -> Self {
        self.entry.note = note.to_string();
        self
    }

    pub(crate) fn details(mut self, details: TechnicalDetails) -> Self {
        self.entry.technical_details = details;
        self
    }

    pub(crate) fn build(self) -> LedgerEntry {
        self.entry
    }
}
