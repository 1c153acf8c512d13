//! Activity-specific technical details.
//!
//! Each variant is a closed record validated on its own. Legacy Portuguese key
//! names are accepted as aliases, numeric fields accept comma decimals, and
//! keys no variant knows about are kept in `extra` so they survive a rewrite.
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::activity::ManagementSubtype;
use super::parse_decimal;

/// Loosely-typed payload as it arrives from the store
pub type DetailMap = Map<String, Value>;

/// Key carrying the explicit management subtype in normalized payloads
pub const SUBTYPE_KEY: &str = "subtype";

/// Key keeping an unrecognized stored activity type on entries read as `Outro`
pub const ORIGINAL_TYPE_KEY: &str = "tipo_original";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlantingDetails {
    #[serde(default, alias = "metodo_propagacao", skip_serializing_if = "Option::is_none")]
    pub propagation_method: Option<String>,
    #[serde(
        default,
        alias = "quantidade_utilizada",
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity_used: Option<f64>,
    #[serde(default, alias = "unidade", skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(flatten)]
    pub extra: DetailMap,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SanitizationDetails {
    #[serde(
        default,
        alias = "item_higienizado",
        alias = "item_sanitizado",
        skip_serializing_if = "Option::is_none"
    )]
    pub item_cleaned: Option<String>,
    #[serde(default, alias = "produto_utilizado", skip_serializing_if = "Option::is_none")]
    pub product_used: Option<String>,
    #[serde(flatten)]
    pub extra: DetailMap,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputApplicationDetails {
    #[serde(
        default,
        alias = "nome_insumo",
        alias = "insumo",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_name: Option<String>,
    #[serde(
        default,
        alias = "dosagem",
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub dosage: Option<f64>,
    #[serde(default, alias = "unidade_dosagem", skip_serializing_if = "Option::is_none")]
    pub dosage_unit: Option<String>,
    #[serde(default, alias = "equipamento", skip_serializing_if = "Option::is_none")]
    pub equipment: Option<String>,
    #[serde(flatten)]
    pub extra: DetailMap,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CulturalOperationDetails {
    #[serde(
        default,
        alias = "atividade",
        alias = "descricao_atividade",
        skip_serializing_if = "Option::is_none"
    )]
    pub activity: Option<String>,
    #[serde(
        default,
        alias = "qtd_trabalhadores",
        alias = "numero_trabalhadores",
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub worker_count: Option<u32>,
    #[serde(flatten)]
    pub extra: DetailMap,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HarvestDetails {
    #[serde(
        default,
        alias = "lote",
        alias = "codigo_lote",
        skip_serializing_if = "Option::is_none"
    )]
    pub batch_code: Option<String>,
    #[serde(default, alias = "destino", skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, alias = "classificacao", skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(
        default,
        alias = "quantidade",
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<f64>,
    #[serde(default, alias = "unidade", skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(flatten)]
    pub extra: DetailMap,
}

/// Technical details keyed by activity type and, for management, subtype.
#[derive(Debug, Clone, PartialEq)]
pub enum TechnicalDetails {
    Planting(PlantingDetails),
    Sanitization(SanitizationDetails),
    InputApplication(InputApplicationDetails),
    CulturalOperation(CulturalOperationDetails),
    Harvest(HarvestDetails),
    /// Opaque bag for `Other` and cancelled entries without a known origin
    Other(DetailMap),
    /// Payload that did not validate against its variant, kept verbatim
    Unvalidated(DetailMap),
}

impl Default for TechnicalDetails {
    fn default() -> Self {
        TechnicalDetails::Other(Map::new())
    }
}

impl TechnicalDetails {
    pub fn subtype(&self) -> Option<ManagementSubtype> {
        match self {
            TechnicalDetails::Sanitization(_) => Some(ManagementSubtype::Sanitization),
            TechnicalDetails::InputApplication(_) => Some(ManagementSubtype::InputApplication),
            TechnicalDetails::CulturalOperation(_) => Some(ManagementSubtype::CulturalOperation),
            TechnicalDetails::Planting(_)
            | TechnicalDetails::Harvest(_)
            | TechnicalDetails::Other(_)
            | TechnicalDetails::Unvalidated(_) => None,
        }
    }

    pub fn is_validated(&self) -> bool {
        !matches!(self, TechnicalDetails::Unvalidated(_))
    }

    /// Canonical JSON object for storage. Management variants carry their subtype tag.
    pub fn to_map(&self) -> DetailMap {
        let mut map = match self {
            TechnicalDetails::Planting(d) => object_of(d),
            TechnicalDetails::Sanitization(d) => object_of(d),
            TechnicalDetails::InputApplication(d) => object_of(d),
            TechnicalDetails::CulturalOperation(d) => object_of(d),
            TechnicalDetails::Harvest(d) => object_of(d),
            TechnicalDetails::Other(raw) | TechnicalDetails::Unvalidated(raw) => raw.clone(),
        };
        if let Some(subtype) = self.subtype() {
            map.insert(SUBTYPE_KEY.to_string(), Value::String(subtype.as_tag().to_string()));
        }
        map
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// Look up a single canonical field, e.g. `"quantity"` on a harvest
    pub fn field(&self, key: &str) -> Option<Value> {
        self.to_map().remove(key).filter(|v| !v.is_null())
    }

    /// One-line human readable description
    pub fn summary(&self) -> String {
        let parts: Vec<String> = match self {
            TechnicalDetails::Planting(d) => vec![
                labelled("Método", d.propagation_method.clone()),
                labelled("Qtd", quantity_text(d.quantity_used, d.unit.as_deref())),
            ],
            TechnicalDetails::Sanitization(d) => vec![
                labelled("Item", d.item_cleaned.clone()),
                labelled("Produto", d.product_used.clone()),
            ],
            TechnicalDetails::InputApplication(d) => vec![
                labelled("Insumo", d.input_name.clone()),
                labelled("Dose", quantity_text(d.dosage, d.dosage_unit.as_deref())),
                labelled("Equipamento", d.equipment.clone()),
            ],
            TechnicalDetails::CulturalOperation(d) => vec![
                labelled("Atividade", d.activity.clone()),
                labelled("Trabalhadores", d.worker_count.map(|n| n.to_string())),
            ],
            TechnicalDetails::Harvest(d) => vec![
                labelled("Lote", d.batch_code.clone()),
                labelled("Destino", d.destination.clone()),
                labelled("Classificação", d.grade.clone()),
                labelled("Qtd", quantity_text(d.quantity, d.unit.as_deref())),
            ],
            TechnicalDetails::Other(raw) | TechnicalDetails::Unvalidated(raw) => raw
                .iter()
                .filter(|(k, _)| k.as_str() != SUBTYPE_KEY)
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{}: {}", k, s),
                    other => format!("{}: {}", k, other),
                })
                .collect(),
        };

        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" · ")
    }
}

fn object_of<T: Serialize>(details: &T) -> DetailMap {
    match serde_json::to_value(details) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn labelled(label: &str, value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => format!("{}: {}", label, v.trim()),
        _ => String::new(),
    }
}

fn quantity_text(value: Option<f64>, unit: Option<&str>) -> Option<String> {
    value.map(|v| match unit {
        Some(u) if !u.trim().is_empty() => format!("{} {}", v, u.trim()),
        _ => v.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Accepts numbers, numeric strings (comma or dot decimals), blank strings and null
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            parse_decimal(text)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("not a number: {}", text)))
        }
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = lenient_f64(deserializer)? else {
        return Ok(None);
    };
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(D::Error::custom(format!("not a whole count: {}", value)));
    }
    Ok(Some(value as u32))
}
