//! Detail schema validation.
//!
//! Turns a loosely-typed technical details payload into the variant that
//! matches the entry's activity type. Normalization never fails: a payload
//! that does not fit its variant comes back as `TechnicalDetails::Unvalidated`
//! holding the raw object, so display code keeps working on malformed rows.
//! Logging is left to the caller.
//!
//! ## Subtype resolution for management entries
//!
//! 1. the subtype passed by the caller
//! 2. the explicit tag inside the payload (`subtype`, `tipo_manejo`, `subtipo`)
//! 3. inference, in this order: a cleaned item means sanitization, an input
//!    name or dosage means input application, anything else is a cultural
//!    operation

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::domain::models::{ActivityType, DetailMap, ManagementSubtype, TechnicalDetails};

/// Keys that may carry an explicit management subtype
pub const SUBTYPE_KEYS: &[&str] = &["subtype", "tipo_manejo", "subtipo"];

const SANITIZED_ITEM_KEYS: &[&str] = &["item_cleaned", "item_higienizado", "item_sanitizado"];

const INPUT_APPLICATION_KEYS: &[&str] = &["input_name", "nome_insumo", "insumo", "dosage", "dosagem"];

/// Normalize `raw` for an entry of `activity_type`.
pub fn normalize(
    activity_type: ActivityType,
    subtype_hint: Option<ManagementSubtype>,
    raw: &DetailMap,
) -> TechnicalDetails {
    match activity_type {
        ActivityType::Planting => validate(raw, TechnicalDetails::Planting),
        ActivityType::Harvest => validate(raw, TechnicalDetails::Harvest),
        ActivityType::Input => validate(raw, TechnicalDetails::InputApplication),
        ActivityType::Management => {
            let subtype = subtype_hint
                .or_else(|| explicit_subtype(raw))
                .unwrap_or_else(|| infer_subtype(raw));
            match subtype {
                ManagementSubtype::Sanitization => validate(raw, TechnicalDetails::Sanitization),
                ManagementSubtype::InputApplication => {
                    validate(raw, TechnicalDetails::InputApplication)
                }
                ManagementSubtype::CulturalOperation => {
                    validate(raw, TechnicalDetails::CulturalOperation)
                }
            }
        }
        ActivityType::Other | ActivityType::Cancelled => TechnicalDetails::Other(raw.clone()),
    }
}

/// Normalize details of a stored entry. Cancelled entries are read with the
/// type they had before cancellation so their payload keeps its shape.
pub fn normalize_stored(
    activity_type: ActivityType,
    type_before_cancellation: Option<ActivityType>,
    raw: &DetailMap,
) -> TechnicalDetails {
    match (activity_type, type_before_cancellation) {
        (ActivityType::Cancelled, Some(previous)) if !previous.is_cancelled() => {
            normalize(previous, None, raw)
        }
        _ => normalize(activity_type, None, raw),
    }
}

/// Subtype named by an explicit tag in the payload, if any recognizable one is present
pub fn explicit_subtype(raw: &DetailMap) -> Option<ManagementSubtype> {
    SUBTYPE_KEYS
        .iter()
        .filter_map(|key| raw.get(*key))
        .filter_map(Value::as_str)
        .find_map(ManagementSubtype::from_tag)
}

/// Fallback subtype when no explicit tag is present. The order is fixed:
/// a cleaned item wins over input fields, which win over cultural operation.
pub fn infer_subtype(raw: &DetailMap) -> ManagementSubtype {
    if has_any(raw, SANITIZED_ITEM_KEYS) {
        ManagementSubtype::Sanitization
    } else if has_any(raw, INPUT_APPLICATION_KEYS) {
        ManagementSubtype::InputApplication
    } else {
        ManagementSubtype::CulturalOperation
    }
}

/// Parse a stored details value: an object, JSON text holding an object, or null.
/// Returns `None` when the value cannot be read as an object at all.
pub fn parse_details_value(value: &Value) -> Option<DetailMap> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::Null => Some(Map::new()),
        Value::String(text) if text.trim().is_empty() => Some(Map::new()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            Ok(Value::Null) => Some(Map::new()),
            _ => None,
        },
        _ => None,
    }
}

fn has_any(raw: &DetailMap, keys: &[&str]) -> bool {
    keys.iter().any(|key| match raw.get(*key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    })
}

fn validate<T, F>(raw: &DetailMap, wrap: F) -> TechnicalDetails
where
    T: DeserializeOwned,
    F: FnOnce(T) -> TechnicalDetails,
{
    let mut payload = raw.clone();
    for key in SUBTYPE_KEYS {
        payload.remove(*key);
    }

    match serde_json::from_value::<T>(Value::Object(payload)) {
        Ok(details) => wrap(details),
        Err(_) => TechnicalDetails::Unvalidated(raw.clone()),
    }
}
