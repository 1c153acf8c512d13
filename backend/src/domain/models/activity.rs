//! Activity types recorded in the ledger and the management subtypes.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of field activity a ledger entry records.
///
/// `Cancelled` is the terminal soft-delete state; it replaces the original
/// type in place rather than living in a separate flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    Planting,
    Management,
    Harvest,
    Input,
    Other,
    Cancelled,
}

impl ActivityType {
    pub const ALL: [ActivityType; 6] = [
        ActivityType::Planting,
        ActivityType::Management,
        ActivityType::Harvest,
        ActivityType::Input,
        ActivityType::Other,
        ActivityType::Cancelled,
    ];

    /// Name used in stored records
    pub fn as_wire(&self) -> &'static str {
        match self {
            ActivityType::Planting => "Plantio",
            ActivityType::Management => "Manejo",
            ActivityType::Harvest => "Colheita",
            ActivityType::Input => "Insumo",
            ActivityType::Other => "Outro",
            ActivityType::Cancelled => "CANCELADO",
        }
    }

    /// Parse a stored activity type.
    ///
    /// Accepts the stored names and the English variant names, ignoring case
    /// and surrounding whitespace.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "plantio" | "planting" => Some(ActivityType::Planting),
            "manejo" | "management" => Some(ActivityType::Management),
            "colheita" | "harvest" => Some(ActivityType::Harvest),
            "insumo" | "input" => Some(ActivityType::Input),
            "outro" | "other" => Some(ActivityType::Other),
            "cancelado" | "cancelled" | "canceled" => Some(ActivityType::Cancelled),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ActivityType::Cancelled)
    }

    /// Whether entries of this type contribute to production totals
    pub fn counts_for_production(&self) -> bool {
        matches!(self, ActivityType::Harvest)
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Secondary classification of a `Management` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagementSubtype {
    Sanitization,
    InputApplication,
    CulturalOperation,
}

impl ManagementSubtype {
    /// Tag written into normalized technical details
    pub fn as_tag(&self) -> &'static str {
        match self {
            ManagementSubtype::Sanitization => "sanitization",
            ManagementSubtype::InputApplication => "input_application",
            ManagementSubtype::CulturalOperation => "cultural_operation",
        }
    }

    /// Parse an explicit subtype tag, including the legacy Portuguese labels.
    pub fn from_tag(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                'ç' => 'c',
                'ã' | 'á' | 'â' => 'a',
                'é' | 'ê' => 'e',
                'í' => 'i',
                'ó' | 'õ' | 'ô' => 'o',
                other => other,
            })
            .collect();

        match key.as_str() {
            "sanitization" | "sanitizacao" | "higienizacao" | "limpeza" => {
                Some(ManagementSubtype::Sanitization)
            }
            "input_application" | "aplicacao_insumo" | "aplicacao_de_insumo" | "insumo" => {
                Some(ManagementSubtype::InputApplication)
            }
            "cultural_operation" | "operacao_cultural" | "trato_cultural" => {
                Some(ManagementSubtype::CulturalOperation)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ManagementSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}
