//! Mapping between stored `LedgerRecord`s and domain `LedgerEntry`s.
//!
//! Reading never fails. A record that cannot be understood is still turned
//! into an entry so one bad row does not take down a whole listing:
//! - unknown activity types become `Outro`, keeping their details as-is and
//!   the stored type name under `tipo_original`, which is written back as the
//!   type so the name survives later rewrites
//! - details that are not an object (corrupt JSON text, arrays) become `Outro`
//!   with empty details
//! - unparsable timestamps fall back to the Unix epoch
//!
//! Each fallback is logged with the entry id.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::warn;
use serde_json::{Map, Value};
use shared::{HistoryRecordDto, LedgerRecord, PriorSnapshotDto};

use crate::domain::detail_schema;
use crate::domain::models::{
    join_locations, split_locations, ActivityType, HistoryAction, HistoryRecord, LedgerEntry,
    LedgerEntryDraft, PriorSnapshot, TechnicalDetails, ORIGINAL_TYPE_KEY,
};

pub struct LedgerRecordMapper;

impl LedgerRecordMapper {
    /// Convert a stored record into a domain entry
    pub fn to_domain(record: &LedgerRecord) -> LedgerEntry {
        let id = record.id.clone().unwrap_or_default();

        let history: Vec<HistoryRecord> = record
            .history
            .iter()
            .map(|dto| Self::history_to_domain(&id, dto))
            .collect();

        let parsed_type = ActivityType::from_wire(&record.activity_type);
        if parsed_type.is_none() {
            warn!(
                "Entry {} has unknown activity type '{}', reading it as {}",
                id,
                record.activity_type,
                ActivityType::Other
            );
        }

        let (activity_type, mut technical_details) =
            match detail_schema::parse_details_value(&record.technical_details) {
                Some(raw) => {
                    let activity_type = parsed_type.unwrap_or(ActivityType::Other);
                    let previous = history
                        .iter()
                        .rev()
                        .find(|h| h.action == HistoryAction::Cancel)
                        .map(|h| h.prior_snapshot.activity_type);
                    let details = detail_schema::normalize_stored(activity_type, previous, &raw);
                    if !details.is_validated() {
                        warn!(
                            "Entry {} has technical details that do not match {}, keeping them unvalidated",
                            id, activity_type
                        );
                    }
                    (activity_type, details)
                }
                None => {
                    warn!(
                        "Entry {} has unreadable technical details, reading it as {} with no details",
                        id,
                        ActivityType::Other
                    );
                    (ActivityType::Other, TechnicalDetails::Other(Map::new()))
                }
            };

        let stored_type = record.activity_type.trim();
        if parsed_type.is_none() && !stored_type.is_empty() {
            if let TechnicalDetails::Other(map) = &mut technical_details {
                map.insert(
                    ORIGINAL_TYPE_KEY.to_string(),
                    Value::String(stored_type.to_string()),
                );
            }
        }

        let timestamp = parse_timestamp(&record.activity_timestamp).unwrap_or_else(|| {
            warn!(
                "Entry {} has unparsable timestamp '{}', using the epoch",
                id, record.activity_timestamp
            );
            epoch()
        });

        LedgerEntry {
            id,
            plan_id: record.plan_id,
            timestamp,
            activity_type,
            product: record.product.clone(),
            locations: split_locations(&record.location_path),
            quantity_value: record.quantity_value.filter(|v| v.is_finite()),
            quantity_unit: record
                .quantity_unit
                .as_ref()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            note: record.note.clone(),
            technical_details,
            history,
        }
    }

    /// Convert a domain entry into its stored shape
    pub fn to_record(entry: &LedgerEntry) -> LedgerRecord {
        LedgerRecord {
            id: Some(entry.id.clone()),
            plan_id: entry.plan_id,
            activity_timestamp: entry.timestamp.to_rfc3339(),
            activity_type: stored_type_name(entry),
            product: entry.product.clone(),
            location_path: join_locations(&entry.locations),
            quantity_value: entry.quantity_value,
            quantity_unit: entry.quantity_unit.clone(),
            note: entry.note.clone(),
            technical_details: entry.technical_details.to_json(),
            history: entry.history.iter().map(Self::history_to_dto).collect(),
        }
    }

    /// Stored shape of a draft; the record carries no id yet
    pub fn draft_to_record(draft: &LedgerEntryDraft) -> LedgerRecord {
        let mut record = Self::to_record(&draft.clone().into_entry(String::new()));
        record.id = None;
        record
    }

    pub fn history_to_dto(record: &HistoryRecord) -> HistoryRecordDto {
        HistoryRecordDto {
            timestamp: record.timestamp.to_rfc3339(),
            action: record.action.as_wire().to_string(),
            reason: record.reason.clone(),
            prior_snapshot: PriorSnapshotDto {
                activity_type: record.prior_snapshot.activity_type.as_wire().to_string(),
                product: record.prior_snapshot.product.clone(),
                quantity_value: record.prior_snapshot.quantity_value,
                quantity_unit: record.prior_snapshot.quantity_unit.clone(),
            },
        }
    }

    fn history_to_domain(entry_id: &str, dto: &HistoryRecordDto) -> HistoryRecord {
        let action = HistoryAction::from_wire(&dto.action).unwrap_or_else(|| {
            warn!(
                "Entry {} has a history record with unknown action '{}', reading it as {}",
                entry_id,
                dto.action,
                HistoryAction::Edit
            );
            HistoryAction::Edit
        });
        let timestamp = parse_timestamp(&dto.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| {
                warn!(
                    "Entry {} has a history record with unparsable timestamp '{}'",
                    entry_id, dto.timestamp
                );
                DateTime::<Utc>::UNIX_EPOCH
            });

        HistoryRecord {
            timestamp,
            action,
            reason: dto.reason.clone(),
            prior_snapshot: PriorSnapshot {
                activity_type: ActivityType::from_wire(&dto.prior_snapshot.activity_type)
                    .unwrap_or(ActivityType::Other),
                product: dto.prior_snapshot.product.clone(),
                quantity_value: dto.prior_snapshot.quantity_value,
                quantity_unit: dto.prior_snapshot.quantity_unit.clone(),
            },
        }
    }
}

/// Wire name for an entry's type. An `Outro` entry read from an unrecognized
/// type name writes that name back.
fn stored_type_name(entry: &LedgerEntry) -> String {
    if let (ActivityType::Other, TechnicalDetails::Other(map)) =
        (entry.activity_type, &entry.technical_details)
    {
        if let Some(original) = map.get(ORIGINAL_TYPE_KEY).and_then(Value::as_str) {
            if ActivityType::from_wire(original).is_none() && !original.trim().is_empty() {
                return original.to_string();
            }
        }
    }
    entry.activity_type.as_wire().to_string()
}

/// Parse a stored timestamp. Accepts RFC 3339, offsets without a colon
/// (`2025-03-10T08:00:00-0300`), naive date-times (read as UTC) and plain dates
/// (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt);
    }

    let utc = FixedOffset::east_opt(0)?;
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return utc.from_local_datetime(&naive).single();
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}

fn epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(activity_type: &str, details: Value) -> LedgerRecord {
        LedgerRecord {
            id: Some("entry::42".to_string()),
            plan_id: 3,
            activity_timestamp: "2025-04-02T07:15:00-03:00".to_string(),
            activity_type: activity_type.to_string(),
            product: "Cenoura".to_string(),
            location_path: "Plot A > Bed 1;  ; Plot B".to_string(),
            quantity_value: Some(12.5),
            quantity_unit: Some(" kg ".to_string()),
            note: "Colheita parcial".to_string(),
            technical_details: details,
            history: Vec::new(),
        }
    }

    #[test]
    fn test_reads_well_formed_record() {
        let entry = LedgerRecordMapper::to_domain(&record(
            "Colheita",
            json!({ "lote": "L-7", "destino": "Feira" }),
        ));

        assert_eq!(entry.id, "entry::42");
        assert_eq!(entry.activity_type, ActivityType::Harvest);
        assert_eq!(entry.locations, vec!["Plot A > Bed 1", "Plot B"]);
        assert_eq!(entry.quantity_unit.as_deref(), Some("kg"));
        assert_eq!(entry.timestamp.offset().local_minus_utc(), -3 * 3600);
        match &entry.technical_details {
            TechnicalDetails::Harvest(d) => {
                assert_eq!(d.batch_code.as_deref(), Some("L-7"));
                assert_eq!(d.destination.as_deref(), Some("Feira"));
            }
            other => panic!("expected harvest details, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_activity_type_reads_as_other() {
        let entry = LedgerRecordMapper::to_domain(&record("Poda", json!({ "galhos": 4 })));
        assert_eq!(entry.activity_type, ActivityType::Other);
        assert_eq!(entry.technical_details.field("galhos"), Some(json!(4)));
        assert_eq!(
            entry.technical_details.field(ORIGINAL_TYPE_KEY),
            Some(json!("Poda"))
        );
    }

    #[test]
    fn test_unknown_activity_type_survives_rewrite() {
        let entry = LedgerRecordMapper::to_domain(&record("Poda", json!({ "galhos": 4 })));
        let written = LedgerRecordMapper::to_record(&entry);
        assert_eq!(written.activity_type, "Poda");

        let reread = LedgerRecordMapper::to_domain(&written);
        assert_eq!(reread.activity_type, ActivityType::Other);
        assert_eq!(reread.technical_details, entry.technical_details);

        // an entry created as Outro is still written as Outro
        let mut plain = reread.clone();
        plain.technical_details = TechnicalDetails::Other(Map::new());
        assert_eq!(LedgerRecordMapper::to_record(&plain).activity_type, "Outro");
    }

    #[test]
    fn test_corrupt_details_read_as_other_with_empty_details() {
        let entry = LedgerRecordMapper::to_domain(&record("Manejo", json!("{\"dosagem\": ")));
        assert_eq!(entry.activity_type, ActivityType::Other);
        assert_eq!(entry.technical_details, TechnicalDetails::Other(Map::new()));
        // the rest of the row survives
        assert_eq!(entry.product, "Cenoura");
    }

    #[test]
    fn test_details_stored_as_json_text() {
        let entry = LedgerRecordMapper::to_domain(&record(
            "Manejo",
            json!("{\"dosagem\": \"1,5\", \"nome_insumo\": \"Calda bordalesa\"}"),
        ));
        match entry.technical_details {
            TechnicalDetails::InputApplication(d) => {
                assert_eq!(d.dosage, Some(1.5));
                assert_eq!(d.input_name.as_deref(), Some("Calda bordalesa"));
            }
            other => panic!("expected input application, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_record_keeps_detail_shape() {
        let mut rec = record("CANCELADO", json!({ "lote": "L-1" }));
        rec.history.push(HistoryRecordDto {
            timestamp: "2025-04-03T10:00:00Z".to_string(),
            action: "CANCEL".to_string(),
            reason: "lançamento duplicado".to_string(),
            prior_snapshot: PriorSnapshotDto {
                activity_type: "Colheita".to_string(),
                product: "Cenoura".to_string(),
                quantity_value: Some(12.5),
                quantity_unit: Some("kg".to_string()),
            },
        });

        let entry = LedgerRecordMapper::to_domain(&rec);
        assert!(entry.is_cancelled());
        assert_eq!(entry.type_before_cancellation(), Some(ActivityType::Harvest));
        assert!(matches!(entry.technical_details, TechnicalDetails::Harvest(_)));
    }

    #[test]
    fn test_written_record_reads_back_the_same_entry() {
        let original = LedgerRecordMapper::to_domain(&record(
            "Manejo",
            json!({ "subtype": "sanitization", "item_cleaned": "Caixas" }),
        ));
        let stored = LedgerRecordMapper::to_record(&original);

        assert_eq!(stored.activity_type, "Manejo");
        assert_eq!(stored.location_path, "Plot A > Bed 1; Plot B");
        assert_eq!(stored.technical_details["subtype"], json!("sanitization"));
        assert_eq!(LedgerRecordMapper::to_domain(&stored), original);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2025-03-10T08:00:00-0300").is_some());
        assert_eq!(
            parse_timestamp("2025-03-10").map(|t| t.to_rfc3339()),
            Some("2025-03-10T00:00:00+00:00".to_string())
        );
        assert!(parse_timestamp("2025-03-10 14:20:00").is_some());
        assert!(parse_timestamp("ontem").is_none());

        let mut rec = record("Outro", Value::Null);
        rec.activity_timestamp = "ontem".to_string();
        assert_eq!(LedgerRecordMapper::to_domain(&rec).timestamp, epoch());
    }
}
