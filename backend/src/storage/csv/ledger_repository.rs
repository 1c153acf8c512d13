//! # CSV Ledger Repository
//!
//! File-based `LedgerStorage`, one CSV file per management plan.
//!
//! ## File Structure
//!
//! ```text
//! data/
//! ├── ledger_config.yaml
//! └── plans/
//!     └── {plan_id}/
//!         └── ledger.csv    ← This module manages these files
//! ```
//!
//! ## CSV Format
//!
//! ```csv
//! id,plan_id,activity_timestamp,activity_type,product,location_path,quantity_value,quantity_unit,note,technical_details,history
//! entry::5f1c…,3,2025-03-10T08:00:00-03:00,Colheita,Tomate,Plot A > Bed 1,500,kg,,"{""lote"":""L-1""}",[]
//! ```
//!
//! `technical_details` and `history` hold JSON. Columns are matched by header
//! name, so files with reordered or missing trailing columns still load.
//!
//! Rows that cannot be read (bad `plan_id`, history that is not valid JSON,
//! text that is not UTF-8) are listed as `Outro` entries so the plan stays
//! viewable, and refused for updates. Their field bytes are written back
//! unchanged on every rewrite, moved into the canonical column order.
//!
//! Every write rewrites the file through a temp file and a rename.

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder, StringRecord, WriterBuilder};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{HistoryRecordDto, LedgerRecord};
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::connection::{CsvConnection, LEDGER_HEADER};
use crate::domain::ledger_filter::LedgerFilter;
use crate::domain::models::{
    parse_decimal, ActivityType, EntryPatch, LedgerEntry, LedgerEntryDraft, PlanId,
};
use crate::domain::record_mapper::LedgerRecordMapper;
use crate::storage::traits::{apply_patch, LedgerStorage, StoreRejection};

/// CSV record structure for ledger entries
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerCsvRow {
    id: String,
    plan_id: PlanId,
    #[serde(default)]
    activity_timestamp: String,
    #[serde(default)]
    activity_type: String,
    #[serde(default)]
    product: String,
    #[serde(default)]
    location_path: String,
    #[serde(default)]
    quantity_value: String,
    #[serde(default)]
    quantity_unit: String,
    #[serde(default)]
    note: String,
    #[serde(default)]
    technical_details: String,
    #[serde(default)]
    history: String,
}

impl LedgerCsvRow {
    fn from_record(record: &LedgerRecord) -> Result<Self> {
        Ok(Self {
            id: record.id.clone().unwrap_or_default(),
            plan_id: record.plan_id,
            activity_timestamp: record.activity_timestamp.clone(),
            activity_type: record.activity_type.clone(),
            product: record.product.clone(),
            location_path: record.location_path.clone(),
            quantity_value: record
                .quantity_value
                .map(|v| v.to_string())
                .unwrap_or_default(),
            quantity_unit: record.quantity_unit.clone().unwrap_or_default(),
            note: record.note.clone(),
            technical_details: serde_json::to_string(&record.technical_details)?,
            history: serde_json::to_string(&record.history)?,
        })
    }

    fn to_record(&self) -> Result<LedgerRecord> {
        let history: Vec<HistoryRecordDto> = if self.history.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&self.history)
                .with_context(|| format!("history of entry {} is not valid JSON", self.id))?
        };

        let quantity_value = if self.quantity_value.trim().is_empty() {
            None
        } else {
            let parsed = parse_decimal(&self.quantity_value);
            if parsed.is_none() {
                warn!(
                    "Entry {} has non-numeric quantity '{}', reading it as empty",
                    self.id, self.quantity_value
                );
            }
            parsed
        };

        Ok(LedgerRecord {
            id: Some(self.id.clone()),
            plan_id: self.plan_id,
            activity_timestamp: self.activity_timestamp.clone(),
            activity_type: self.activity_type.clone(),
            product: self.product.clone(),
            location_path: self.location_path.clone(),
            quantity_value,
            quantity_unit: Some(self.quantity_unit.clone()).filter(|u| !u.trim().is_empty()),
            note: self.note.clone(),
            // the mapper reads JSON text and treats blank text as no details
            technical_details: Value::String(self.technical_details.clone()),
            history,
        })
    }
}

/// One line of a ledger file as read from disk
#[derive(Debug, Clone)]
enum StoredRow {
    Readable {
        row: LedgerCsvRow,
        entry: LedgerEntry,
    },
    Unreadable {
        id: String,
        /// Field bytes in `LEDGER_HEADER` order
        fields: ByteRecord,
        entry: LedgerEntry,
    },
}

impl StoredRow {
    fn id(&self) -> &str {
        match self {
            StoredRow::Readable { row, .. } => &row.id,
            StoredRow::Unreadable { id, .. } => id,
        }
    }

    fn entry(&self) -> &LedgerEntry {
        match self {
            StoredRow::Readable { entry, .. } | StoredRow::Unreadable { entry, .. } => entry,
        }
    }
}

/// CSV-based ledger repository
#[derive(Clone)]
pub struct LedgerRepository {
    connection: CsvConnection,
    write_lock: Arc<Mutex<()>>,
}

impl LedgerRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            connection,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read every row of a plan's ledger file
    fn read_rows(&self, plan_id: PlanId) -> Result<Vec<StoredRow>> {
        self.connection.ensure_ledger_file_exists(plan_id)?;
        let file_path = self.connection.ledger_file_path(plan_id);

        let mut csv_reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(&file_path)?;
        let headers = StringRecord::from_byte_record_lossy(csv_reader.byte_headers()?.clone());

        let mut rows = Vec::new();
        for (line, result) in csv_reader.byte_records().enumerate() {
            let bytes = result?;
            let (raw, parsed) = match StringRecord::from_byte_record(bytes.clone()) {
                Ok(raw) => {
                    let parsed = raw
                        .deserialize::<LedgerCsvRow>(Some(&headers))
                        .map_err(anyhow::Error::from)
                        .and_then(|row| row.to_record().map(|record| (row, record)));
                    (raw, parsed)
                }
                Err(e) => {
                    let reason = anyhow::anyhow!("text is not UTF-8 ({})", e.utf8_error());
                    (StringRecord::from_byte_record_lossy(bytes.clone()), Err(reason))
                }
            };

            match parsed {
                Ok((row, record)) => {
                    let entry = LedgerRecordMapper::to_domain(&record);
                    rows.push(StoredRow::Readable { row, entry });
                }
                Err(e) => {
                    let id = column(&headers, &raw, "id")
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("row::{}::{}", plan_id, line + 1));
                    warn!(
                        "Could not read entry {} in {:?}: {:#}. Listing it as {}",
                        id,
                        file_path,
                        e,
                        ActivityType::Other
                    );
                    let entry = degraded_entry(plan_id, &id, &headers, &raw);
                    let fields = canonical_fields(&headers, &bytes);
                    rows.push(StoredRow::Unreadable { id, fields, entry });
                }
            }
        }

        debug!("Read {} ledger rows for plan {}", rows.len(), plan_id);
        Ok(rows)
    }

    /// Rewrite a plan's ledger file atomically
    fn write_rows(&self, plan_id: PlanId, rows: &[StoredRow]) -> Result<()> {
        self.connection.ensure_ledger_file_exists(plan_id)?;
        let file_path = self.connection.ledger_file_path(plan_id);
        let temp_path = file_path.with_extension("csv.tmp");

        {
            let mut csv_writer = WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&temp_path)?;
            csv_writer.write_record(LEDGER_HEADER)?;
            for stored in rows {
                match stored {
                    StoredRow::Readable { row, .. } => csv_writer.serialize(row)?,
                    StoredRow::Unreadable { fields, .. } => csv_writer.write_byte_record(fields)?,
                }
            }
            csv_writer.flush()?;
        }

        fs::rename(&temp_path, &file_path)?;
        debug!("Wrote {} ledger rows to {:?}", rows.len(), file_path);
        Ok(())
    }

    fn readable(entry: LedgerEntry) -> Result<StoredRow> {
        let row = LedgerCsvRow::from_record(&LedgerRecordMapper::to_record(&entry))?;
        Ok(StoredRow::Readable { row, entry })
    }

    /// Entries of every plan; used to locate an entry by id
    fn find_plan_of(&self, id: &str) -> Result<Option<(PlanId, Vec<StoredRow>)>> {
        for plan_id in self.connection.list_plan_ids()? {
            let rows = self.read_rows(plan_id)?;
            if rows.iter().any(|r| r.id() == id) {
                return Ok(Some((plan_id, rows)));
            }
        }
        Ok(None)
    }
}

impl LedgerStorage for LedgerRepository {
    fn list_entries(&self, plan_id: PlanId, filter: Option<&LedgerFilter>) -> Result<Vec<LedgerEntry>> {
        if !self.connection.ledger_file_path(plan_id).exists() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<LedgerEntry> = self
            .read_rows(plan_id)?
            .into_iter()
            .map(|stored| stored.entry().clone())
            .filter(|e| filter.map_or(true, |f| f.matches(e)))
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    fn create_entry(&self, draft: &LedgerEntryDraft) -> Result<LedgerEntry> {
        let _guard = self.lock();
        let mut rows = self.read_rows(draft.plan_id)?;

        let entry = draft.clone().into_entry(format!("entry::{}", Uuid::new_v4()));
        rows.push(Self::readable(entry.clone())?);
        self.write_rows(draft.plan_id, &rows)?;

        info!("Stored entry {} for plan {}", entry.id, entry.plan_id);
        Ok(entry)
    }

    fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<LedgerEntry> {
        let _guard = self.lock();
        let (plan_id, mut rows) = self
            .find_plan_of(id)?
            .ok_or_else(|| StoreRejection::NotFound(id.to_string()))?;

        let position = rows
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| StoreRejection::NotFound(id.to_string()))?;

        let updated = match &rows[position] {
            StoredRow::Unreadable { .. } => {
                return Err(StoreRejection::Unreadable(id.to_string()).into());
            }
            StoredRow::Readable { entry, .. } => apply_patch(entry, patch)?,
        };

        rows[position] = Self::readable(updated.clone())?;
        self.write_rows(plan_id, &rows)?;

        info!("Updated entry {} in plan {}", id, plan_id);
        Ok(updated)
    }
}

/// Fields of a row rearranged into `LEDGER_HEADER` order, looked up by header
/// name. Columns the canonical header does not know are dropped.
fn canonical_fields(headers: &StringRecord, raw: &ByteRecord) -> ByteRecord {
    LEDGER_HEADER
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h.trim() == *name)
                .and_then(|i| raw.get(i))
                .unwrap_or_default()
        })
        .collect()
}

fn column<'a>(headers: &StringRecord, raw: &'a StringRecord, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .and_then(|i| raw.get(i))
}

/// Best-effort entry for a row that could not be read
fn degraded_entry(plan_id: PlanId, id: &str, headers: &StringRecord, raw: &StringRecord) -> LedgerEntry {
    let text = |name: &str| column(headers, raw, name).unwrap_or("").to_string();
    let record = LedgerRecord {
        id: Some(id.to_string()),
        plan_id,
        activity_timestamp: text("activity_timestamp"),
        activity_type: ActivityType::Other.as_wire().to_string(),
        product: text("product"),
        location_path: text("location_path"),
        quantity_value: None,
        quantity_unit: None,
        note: text("note"),
        technical_details: Value::Null,
        history: Vec::new(),
    };
    LedgerRecordMapper::to_domain(&record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{HistoryAction, HistoryRecord, PriorSnapshot, TechnicalDetails};
    use crate::storage::csv::test_utils::TestEnvironment;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn draft(product: &str, value: f64, unit: &str, at: &str) -> LedgerEntryDraft {
        LedgerEntryDraft {
            plan_id: 3,
            timestamp: DateTime::parse_from_rfc3339(at).unwrap(),
            activity_type: ActivityType::Harvest,
            product: product.to_string(),
            locations: vec!["Plot A > Bed 1".to_string(), "Plot A > Bed 2".to_string()],
            quantity_value: Some(value),
            quantity_unit: Some(unit.to_string()),
            note: "linha 1\nlinha 2, com vírgula".to_string(),
            technical_details: crate::domain::detail_schema::normalize(
                ActivityType::Harvest,
                None,
                json!({ "lote": "L-9", "destino": "Feira" }).as_object().unwrap(),
            ),
        }
    }

    #[test]
    fn test_create_and_list_entries() {
        let env = TestEnvironment::new().unwrap();
        let repo = LedgerRepository::new(env.connection.clone());

        let first = repo
            .create_entry(&draft("Tomate", 500.0, "kg", "2025-03-10T08:00:00-03:00"))
            .unwrap();
        let second = repo
            .create_entry(&draft("Alface", 2.5, "caixas", "2025-03-12T08:00:00-03:00"))
            .unwrap();

        let entries = repo.list_entries(3, None).unwrap();
        assert_eq!(entries, vec![second, first]);
        assert_eq!(entries[1].note, "linha 1\nlinha 2, com vírgula");
        assert!(matches!(entries[1].technical_details, TechnicalDetails::Harvest(_)));

        assert!(repo.list_entries(99, None).unwrap().is_empty());
    }

    #[test]
    fn test_entries_persist_across_instances() {
        let env = TestEnvironment::new().unwrap();
        let created = LedgerRepository::new(env.connection.clone())
            .create_entry(&draft("Tomate", 500.0, "kg", "2025-03-10T08:00:00-03:00"))
            .unwrap();

        let reopened = LedgerRepository::new(env.reopen().unwrap());
        assert_eq!(reopened.list_entries(3, None).unwrap(), vec![created]);
    }

    #[test]
    fn test_update_entry_writes_history() {
        let env = TestEnvironment::new().unwrap();
        let repo = LedgerRepository::new(env.connection.clone());
        let entry = repo
            .create_entry(&draft("Tomate", 500.0, "kg", "2025-03-10T08:00:00-03:00"))
            .unwrap();

        let patch = EntryPatch {
            quantity_value: Some(Some(520.0)),
            history: Some(vec![HistoryRecord {
                timestamp: Utc::now(),
                action: HistoryAction::Edit,
                reason: "pesagem refeita".to_string(),
                prior_snapshot: PriorSnapshot::of(&entry),
            }]),
            ..Default::default()
        };
        let updated = repo.update_entry(&entry.id, &patch).unwrap();
        assert_eq!(updated.quantity_value, Some(520.0));

        let listed = repo.list_entries(3, None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].history.len(), 1);
        assert_eq!(listed[0].history[0].reason, "pesagem refeita");
        assert_eq!(listed[0].history[0].prior_snapshot.quantity_value, Some(500.0));
    }

    #[test]
    fn test_update_unknown_entry() {
        let env = TestEnvironment::new().unwrap();
        let repo = LedgerRepository::new(env.connection.clone());
        let err = repo.update_entry("entry::missing", &EntryPatch::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreRejection>(),
            Some(&StoreRejection::NotFound("entry::missing".to_string()))
        );
    }

    #[test]
    fn test_history_length_check() {
        let env = TestEnvironment::new().unwrap();
        let repo = LedgerRepository::new(env.connection.clone());
        let entry = repo
            .create_entry(&draft("Tomate", 500.0, "kg", "2025-03-10T08:00:00-03:00"))
            .unwrap();

        let stale = EntryPatch {
            note: Some("outra nota".to_string()),
            expected_history_len: Some(1),
            ..Default::default()
        };
        let err = repo.update_entry(&entry.id, &stale).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreRejection>(),
            Some(StoreRejection::HistoryConflict { expected: 1, found: 0, .. })
        ));
        assert_eq!(repo.list_entries(3, None).unwrap()[0].note, entry.note);
    }

    #[test]
    fn test_unreadable_rows_are_listed_and_preserved() {
        let env = TestEnvironment::new().unwrap();
        let repo = LedgerRepository::new(env.connection.clone());
        let good = repo
            .create_entry(&draft("Tomate", 500.0, "kg", "2025-03-10T08:00:00-03:00"))
            .unwrap();

        let broken_line =
            "entry::broken,3,2025-03-01T10:00:00-03:00,Colheita,Batata,Plot C,10,kg,nota,{},[{not json";
        env.append_ledger_line(3, broken_line).unwrap();

        let entries = repo.list_entries(3, None).unwrap();
        assert_eq!(entries.len(), 2);
        let broken = entries.iter().find(|e| e.id == "entry::broken").unwrap();
        assert_eq!(broken.activity_type, ActivityType::Other);
        assert_eq!(broken.product, "Batata");

        let err = repo.update_entry("entry::broken", &EntryPatch::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreRejection>(),
            Some(StoreRejection::Unreadable(_))
        ));

        // rewriting the file for another entry keeps the broken line untouched
        repo.update_entry(
            &good.id,
            &EntryPatch {
                note: Some("revisada".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(env.read_ledger(3).unwrap().contains(broken_line));
    }

    #[test]
    fn test_legacy_columns_and_comma_decimals() {
        let env = TestEnvironment::new().unwrap();
        env.write_ledger(
            5,
            "id,plan_id,activity_timestamp,activity_type,product,quantity_value,quantity_unit\n\
             legacy-1,5,2024-11-02,colheita,Abóbora,\"12,5\",kg\n",
        )
        .unwrap();

        let repo = LedgerRepository::new(env.connection.clone());
        let entries = repo.list_entries(5, None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].activity_type, ActivityType::Harvest);
        assert_eq!(entries[0].quantity_value, Some(12.5));
        assert!(entries[0].locations.is_empty());
        assert!(entries[0].history.is_empty());
    }

    #[test]
    fn test_reordered_legacy_file_with_broken_row_stays_writable() {
        let env = TestEnvironment::new().unwrap();
        env.write_ledger(
            4,
            "plan_id,id,activity_type,product,activity_timestamp,history\n\
             4,good-1,Colheita,Abóbora,2024-11-02T07:00:00-03:00,[]\n\
             4,broken-1,Colheita,Milho,2024-11-03T07:00:00-03:00,[{broken\n",
        )
        .unwrap();

        let repo = LedgerRepository::new(env.connection.clone());
        let updated = repo
            .update_entry(
                "good-1",
                &EntryPatch {
                    note: Some("conferido".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.note, "conferido");

        let content = env.read_ledger(4).unwrap();
        assert!(content.starts_with(&LEDGER_HEADER.join(",")));
        // the broken row now sits under the canonical header, fields by name
        assert!(content.contains(
            "broken-1,4,2024-11-03T07:00:00-03:00,Colheita,Milho,,,,,,[{broken"
        ));

        // later writes keep working
        repo.create_entry(&LedgerEntryDraft {
            plan_id: 4,
            ..draft("Feijão", 8.0, "kg", "2024-11-04T07:00:00-03:00")
        })
        .unwrap();
        let entries = repo.list_entries(4, None).unwrap();
        assert_eq!(entries.len(), 3);
        let broken = entries.iter().find(|e| e.id == "broken-1").unwrap();
        assert_eq!(broken.activity_type, ActivityType::Other);
        assert_eq!(broken.product, "Milho");
        let good = entries.iter().find(|e| e.id == "good-1").unwrap();
        assert_eq!(good.activity_type, ActivityType::Harvest);
        assert_eq!(good.note, "conferido");
    }

    #[test]
    fn test_non_utf8_row_does_not_abort_listing() {
        let env = TestEnvironment::new().unwrap();
        let repo = LedgerRepository::new(env.connection.clone());
        let first = repo
            .create_entry(&draft("Tomate", 500.0, "kg", "2025-03-10T08:00:00-03:00"))
            .unwrap();
        repo.create_entry(&draft("Alface", 20.0, "kg", "2025-03-11T08:00:00-03:00"))
            .unwrap();

        let mut content = env.read_ledger(3).unwrap().into_bytes();
        content.extend_from_slice(
            b"legacy-1,3,2024-11-02T07:00:00-03:00,Colheita,Ab\xf3bora,,12,kg,,{},[]\n",
        );
        env.write_ledger_bytes(3, &content).unwrap();

        let entries = repo.list_entries(3, None).unwrap();
        assert_eq!(entries.len(), 3);
        let legacy = entries.iter().find(|e| e.id == "legacy-1").unwrap();
        assert_eq!(legacy.activity_type, ActivityType::Other);
        assert!(legacy.product.starts_with("Ab"));

        // a rewrite keeps the original bytes of the row
        repo.update_entry(
            &first.id,
            &EntryPatch {
                note: Some("revisada".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        let written = fs::read(env.connection.ledger_file_path(3)).unwrap();
        assert!(written.windows(7).any(|w| w == b"Ab\xf3bora"));
    }

    #[test]
    fn test_stale_patch_cannot_revive_cancelled_entry() {
        let env = TestEnvironment::new().unwrap();
        let repo = LedgerRepository::new(env.connection.clone());
        let entry = repo
            .create_entry(&draft("Tomate", 500.0, "kg", "2025-03-10T08:00:00-03:00"))
            .unwrap();

        let cancel = EntryPatch {
            activity_type: Some(ActivityType::Cancelled),
            history: Some(vec![HistoryRecord {
                timestamp: Utc::now(),
                action: HistoryAction::Cancel,
                reason: "lançamento duplicado".to_string(),
                prior_snapshot: PriorSnapshot::of(&entry),
            }]),
            ..Default::default()
        };
        repo.update_entry(&entry.id, &cancel).unwrap();

        // built from the copy read before the cancellation
        let stale_edit = EntryPatch {
            quantity_value: Some(Some(520.0)),
            history: Some(vec![HistoryRecord {
                timestamp: Utc::now(),
                action: HistoryAction::Edit,
                reason: "pesagem refeita".to_string(),
                prior_snapshot: PriorSnapshot::of(&entry),
            }]),
            ..Default::default()
        };
        let err = repo.update_entry(&entry.id, &stale_edit).unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreRejection>(),
            Some(&StoreRejection::Cancelled(entry.id.clone()))
        );

        let stored = &repo.list_entries(3, None).unwrap()[0];
        assert_eq!(stored.activity_type, ActivityType::Cancelled);
        assert_eq!(stored.history.len(), 1);
        assert_eq!(stored.history[0].action, HistoryAction::Cancel);
    }
}
