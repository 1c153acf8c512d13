//! Domain-level command types.
//! These structs are used by services inside the domain layer. Callers map
//! whatever their surface receives (forms, imported rows) into these.

pub mod entries {
    use chrono::{DateTime, FixedOffset};

    use crate::domain::models::{ActivityType, DetailMap, ManagementSubtype, PlanId};

    /// Input for recording a new field activity.
    #[derive(Debug, Clone)]
    pub struct CreateEntryCommand {
        pub plan_id: PlanId,
        /// When the activity occurred; defaults to now
        pub timestamp: Option<DateTime<FixedOffset>>,
        pub activity_type: ActivityType,
        pub subtype: Option<ManagementSubtype>,
        pub product: String,
        pub locations: Vec<String>,
        pub quantity_value: Option<f64>,
        pub quantity_unit: Option<String>,
        pub note: String,
        pub technical_details: DetailMap,
    }

    /// Fields an edit may change. `None` leaves the field untouched.
    #[derive(Debug, Clone, Default)]
    pub struct EntryChanges {
        pub timestamp: Option<DateTime<FixedOffset>>,
        /// The type is fixed at creation; anything but the current type is refused
        pub activity_type: Option<ActivityType>,
        pub subtype: Option<ManagementSubtype>,
        pub product: Option<String>,
        pub locations: Option<Vec<String>>,
        pub quantity_value: Option<Option<f64>>,
        pub quantity_unit: Option<Option<String>>,
        pub note: Option<String>,
        pub technical_details: Option<DetailMap>,
    }

    impl EntryChanges {
        pub fn is_empty(&self) -> bool {
            self.timestamp.is_none()
                && self.activity_type.is_none()
                && self.subtype.is_none()
                && self.product.is_none()
                && self.locations.is_none()
                && self.quantity_value.is_none()
                && self.quantity_unit.is_none()
                && self.note.is_none()
                && self.technical_details.is_none()
        }
    }

    /// Edit an entry, with the justification recorded in its history.
    #[derive(Debug, Clone)]
    pub struct EditEntryCommand {
        pub changes: EntryChanges,
        pub reason: String,
    }

    /// Soft-cancel an entry.
    #[derive(Debug, Clone)]
    pub struct CancelEntryCommand {
        pub reason: String,
    }
}
