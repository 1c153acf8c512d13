//! Production totals over heterogeneous quantity/unit pairs.
//!
//! Quantities are sorted into three buckets:
//!
//! - **weight**, accumulated in kg (`kg`, `kilograma(s)`; `t`, `ton`,
//!   `tonelada(s)` and `mg` count 1000 kg each)
//! - **area**, accumulated in m² (`m²`, `m2`; `ha`, `hectare(s)` count 10000 m²)
//! - **discrete**, one running total per distinct unit, keyed ignoring case
//!   and labelled with the first spelling seen
//!
//! The rendered summary lists weight, then area, then discrete units in the
//! order they were first met, joined by `" + "`. Weight switches to tons at
//! 1000 kg and area to hectares at 10000 m².

use serde_json::Value;

use crate::domain::models::{parse_decimal, LedgerConfig, LedgerEntry};

pub const KG_PER_TON: f64 = 1000.0;
pub const M2_PER_HECTARE: f64 = 10000.0;

/// Names of the value and unit fields to read from each entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityKeys<'a> {
    pub value_key: &'a str,
    pub unit_key: &'a str,
}

impl QuantityKeys<'static> {
    /// The entry's own quantity columns
    pub const ENTRY: QuantityKeys<'static> = QuantityKeys {
        value_key: "quantity_value",
        unit_key: "quantity_unit",
    };

    /// Quantity recorded in harvest technical details
    pub const HARVEST_DETAILS: QuantityKeys<'static> = QuantityKeys {
        value_key: "quantity",
        unit_key: "unit",
    };

    /// Quantity of material used at planting
    pub const PLANTING_DETAILS: QuantityKeys<'static> = QuantityKeys {
        value_key: "quantity_used",
        unit_key: "unit",
    };
}

/// Bucket a unit string falls into, with its factor to the bucket's base unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitCategory {
    Weight { kg_factor: f64 },
    Area { m2_factor: f64 },
    Discrete,
}

pub fn classify_unit(unit: &str) -> UnitCategory {
    match unit.trim().to_lowercase().as_str() {
        "kg" | "kilograma" | "kilogramas" => UnitCategory::Weight { kg_factor: 1.0 },
        "ton" | "t" | "tonelada" | "toneladas" | "mg" => UnitCategory::Weight {
            kg_factor: KG_PER_TON,
        },
        "m²" | "m2" => UnitCategory::Area { m2_factor: 1.0 },
        "ha" | "hectare" | "hectares" => UnitCategory::Area {
            m2_factor: M2_PER_HECTARE,
        },
        _ => UnitCategory::Discrete,
    }
}

/// Read a quantity. Non-numeric, non-finite and zero values yield `None`.
pub fn parse_quantity(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    };
    parsed.filter(|v| v.is_finite() && *v != 0.0)
}

/// How numbers are written in summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_separator: ',',
            thousands_separator: Some('.'),
        }
    }
}

impl NumberFormat {
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            decimal_separator: config.decimal_separator,
            thousands_separator: config.thousands_separator,
        }
    }

    /// Round to at most `max_decimals` places and drop trailing zeros
    pub fn format(&self, value: f64, max_decimals: usize) -> String {
        let mut rounded = round_to(value, max_decimals);
        if rounded == 0.0 {
            rounded = 0.0; // no "-0"
        }

        let fixed = format!("{:.*}", max_decimals, rounded.abs());
        let (int_part, frac_part) = match fixed.split_once('.') {
            Some((i, f)) => (i, f.trim_end_matches('0')),
            None => (fixed.as_str(), ""),
        };

        let mut out = String::new();
        if rounded < 0.0 {
            out.push('-');
        }
        out.push_str(&self.group_digits(int_part));
        if !frac_part.is_empty() {
            out.push(self.decimal_separator);
            out.push_str(frac_part);
        }
        out
    }

    fn group_digits(&self, digits: &str) -> String {
        let Some(separator) = self.thousands_separator else {
            return digits.to_string();
        };
        let len = digits.len();
        let mut grouped = String::with_capacity(len + len / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (len - i) % 3 == 0 {
                grouped.push(separator);
            }
            grouped.push(c);
        }
        grouped
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteTotal {
    /// Unit as first seen
    pub unit: String,
    pub total: f64,
}

/// Running totals, ready to be rendered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionTotals {
    pub weight_kg: Option<f64>,
    pub area_m2: Option<f64>,
    pub discrete: Vec<DiscreteTotal>,
}

impl ProductionTotals {
    pub fn add(&mut self, value: f64, unit: &str) {
        match classify_unit(unit) {
            UnitCategory::Weight { kg_factor } => {
                *self.weight_kg.get_or_insert(0.0) += value * kg_factor;
            }
            UnitCategory::Area { m2_factor } => {
                *self.area_m2.get_or_insert(0.0) += value * m2_factor;
            }
            UnitCategory::Discrete => {
                let label = unit.trim();
                let key = label.to_lowercase();
                match self.discrete.iter_mut().find(|d| d.unit.to_lowercase() == key) {
                    Some(existing) => existing.total += value,
                    None => self.discrete.push(DiscreteTotal {
                        unit: label.to_string(),
                        total: value,
                    }),
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.weight_kg.is_none() && self.area_m2.is_none() && self.discrete.is_empty()
    }

    /// Display segments in their fixed order: weight, area, discrete units.
    ///
    /// The unit is picked from the value as it will be displayed, so a total
    /// that rounds up to 1000 kg reads as "1 ton".
    pub fn segments(&self, format: &NumberFormat) -> Vec<String> {
        let mut segments = Vec::new();

        if let Some(kg) = self.weight_kg {
            let kg = round_to(kg, 3);
            if kg >= KG_PER_TON {
                segments.push(format!("{} ton", format.format(kg / KG_PER_TON, 3)));
            } else {
                segments.push(format!("{} kg", format.format(kg, 3)));
            }
        }

        if let Some(m2) = self.area_m2 {
            let m2 = round_to(m2, 2);
            if m2 >= M2_PER_HECTARE {
                segments.push(format!("{} ha", format.format(m2 / M2_PER_HECTARE, 2)));
            } else {
                segments.push(format!("{} m²", format.format(m2, 2)));
            }
        }

        for discrete in &self.discrete {
            let amount = format.format(discrete.total, 2);
            if discrete.unit.is_empty() {
                segments.push(amount);
            } else {
                segments.push(format!("{} {}", amount, discrete.unit));
            }
        }

        segments
    }

    pub fn render(&self, format: &NumberFormat, placeholder: &str) -> String {
        if self.is_empty() {
            return placeholder.to_string();
        }
        self.segments(format).join(" + ")
    }
}

fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Reduces entries to a production summary string
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    format: NumberFormat,
    placeholder: String,
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self {
            format: NumberFormat::default(),
            placeholder: "-".to_string(),
        }
    }
}

impl AggregationEngine {
    pub fn new(format: NumberFormat, placeholder: &str) -> Self {
        Self {
            format,
            placeholder: placeholder.to_string(),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            NumberFormat::from_config(config),
            &config.empty_summary_placeholder,
        )
    }

    pub fn number_format(&self) -> &NumberFormat {
        &self.format
    }

    /// Accumulate every usable quantity. Cancelled entries never count.
    pub fn totals(&self, entries: &[LedgerEntry], keys: &QuantityKeys<'_>) -> ProductionTotals {
        let mut totals = ProductionTotals::default();
        for entry in entries.iter().filter(|e| !e.is_cancelled()) {
            let Some(value) = entry.field_value(keys.value_key).as_ref().and_then(parse_quantity)
            else {
                continue;
            };
            let unit = match entry.field_value(keys.unit_key) {
                Some(Value::String(unit)) => unit,
                Some(other) if !other.is_null() => other.to_string(),
                _ => String::new(),
            };
            totals.add(value, &unit);
        }
        totals
    }

    pub fn summarize(&self, entries: &[LedgerEntry], keys: &QuantityKeys<'_>) -> String {
        self.totals(entries, keys)
            .render(&self.format, &self.placeholder)
    }

    /// Format a single quantity the way summaries do, without promotion
    pub fn format_quantity(&self, value: Option<f64>, unit: Option<&str>) -> String {
        match (value, unit.map(str::trim).filter(|u| !u.is_empty())) {
            (Some(v), Some(u)) => format!("{} {}", self.format.format(v, 3), u),
            (Some(v), None) => self.format.format(v, 3),
            (None, _) => self.placeholder.clone(),
        }
    }
}
