//! Record types shared across the archive pipeline
//!
//! A primary resource travels through three shapes:
//!
//! - [`RawResource`]: the JSON object exactly as the API returned it
//! - [`ResolvedRecord`]: every reference field replaced by readable text
//! - [`PersonRow`]: the normalized row handed to the sink

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, SwapiError};

/// JSON object returned for one primary identifier
pub type RawResource = serde_json::Map<String, Value>;

/// Sentinel the API uses for values it does not know
pub const UNKNOWN_SENTINEL: &str = "unknown";

/// Separator placed between values joined from a list of references
pub const LIST_SEPARATOR: &str = ", ";

/// Keys that only describe the transport and never reach a resolved record
pub const METADATA_FIELDS: [&str; 3] = ["created", "edited", "url"];

/// Plain scalar keys copied from the raw resource
pub const SCALAR_FIELDS: [&str; 8] = [
    "name",
    "height",
    "mass",
    "hair_color",
    "skin_color",
    "eye_color",
    "birth_year",
    "gender",
];

/// Fields whose raw value links to other resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceField {
    Homeworld,
    Species,
    Vehicles,
    Starships,
    Films,
}

impl ReferenceField {
    pub const ALL: [ReferenceField; 5] = [
        ReferenceField::Homeworld,
        ReferenceField::Species,
        ReferenceField::Vehicles,
        ReferenceField::Starships,
        ReferenceField::Films,
    ];

    /// Key of this field in the raw resource
    pub fn key(self) -> &'static str {
        match self {
            ReferenceField::Homeworld => "homeworld",
            ReferenceField::Species => "species",
            ReferenceField::Vehicles => "vehicles",
            ReferenceField::Starships => "starships",
            ReferenceField::Films => "films",
        }
    }

    /// Attribute extracted from each linked resource
    pub fn attribute(self) -> &'static str {
        match self {
            ReferenceField::Films => "title",
            _ => "name",
        }
    }

    /// Whether the raw value is a list of links rather than a single link
    pub fn is_list(self) -> bool {
        !matches!(self, ReferenceField::Homeworld)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

impl std::fmt::Display for ReferenceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// How a raw key is treated when mapping a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Reference(ReferenceField),
    Metadata,
    Unknown,
}

impl FieldKind {
    pub fn classify(key: &str) -> Self {
        if SCALAR_FIELDS.contains(&key) {
            FieldKind::Scalar
        } else if let Some(field) = ReferenceField::from_key(key) {
            FieldKind::Reference(field)
        } else if METADATA_FIELDS.contains(&key) {
            FieldKind::Metadata
        } else {
            FieldKind::Unknown
        }
    }
}

/// A primary resource with every reference resolved to text
///
/// Scalars are kept exactly as the API sent them. Normalization happens
/// later, in [`PersonRow::from_resolved`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    /// Canonical identifier, taken from the request rather than the body
    pub id: u32,
    pub name: String,
    pub height: Option<String>,
    pub mass: Option<String>,
    pub hair_color: Option<String>,
    pub skin_color: Option<String>,
    pub eye_color: Option<String>,
    pub birth_year: Option<String>,
    pub gender: Option<String>,
    pub homeworld: Option<String>,
    pub species: String,
    pub vehicles: String,
    pub starships: String,
    pub films: String,
}

impl ResolvedRecord {
    /// Build a record from the scalar keys of a raw resource.
    ///
    /// Reference fields start empty and are filled by the caller once
    /// resolved.
    pub fn from_scalars(id: u32, raw: &RawResource) -> Result<Self> {
        let name = scalar_text(raw, "name")
            .ok_or_else(|| SwapiError::malformed(id, "missing 'name'"))?;

        Ok(Self {
            id,
            name,
            height: scalar_text(raw, "height"),
            mass: scalar_text(raw, "mass"),
            hair_color: scalar_text(raw, "hair_color"),
            skin_color: scalar_text(raw, "skin_color"),
            eye_color: scalar_text(raw, "eye_color"),
            birth_year: scalar_text(raw, "birth_year"),
            gender: scalar_text(raw, "gender"),
            homeworld: None,
            species: String::new(),
            vehicles: String::new(),
            starships: String::new(),
            films: String::new(),
        })
    }

    /// Store the resolved text of one reference field
    pub fn set_reference(&mut self, field: ReferenceField, value: Option<String>) {
        match field {
            ReferenceField::Homeworld => self.homeworld = value,
            ReferenceField::Species => self.species = value.unwrap_or_default(),
            ReferenceField::Vehicles => self.vehicles = value.unwrap_or_default(),
            ReferenceField::Starships => self.starships = value.unwrap_or_default(),
            ReferenceField::Films => self.films = value.unwrap_or_default(),
        }
    }
}

/// Text of a scalar key; non-string JSON values are kept as their JSON text
fn scalar_text(raw: &RawResource, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A normalized row as written to the `persons` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRow {
    pub id: i64,
    pub name: String,
    pub gender: Option<String>,
    pub homeworld: Option<String>,
    pub birth_year: Option<String>,
    pub height: Option<f64>,
    pub mass: Option<f64>,
    pub hair_color: Option<String>,
    pub skin_color: Option<String>,
    pub eye_color: Option<String>,
    pub species: Option<String>,
    pub vehicles: Option<String>,
    pub starships: Option<String>,
    pub films: Option<String>,
}

impl PersonRow {
    /// Apply the persistence normalization rule to a resolved record.
    ///
    /// - `"unknown"` and `""` become NULL
    /// - `height` and `mass` parse with `,` as the decimal separator
    /// - `birth_year` stays text
    ///
    /// Fails when the required `name` normalizes to NULL.
    pub fn from_resolved(record: &ResolvedRecord) -> Result<Self> {
        let name = normalize_text(Some(&record.name))
            .ok_or_else(|| SwapiError::malformed(record.id, "name normalizes to NULL"))?;

        Ok(Self {
            id: i64::from(record.id),
            name,
            gender: normalize_text(record.gender.as_deref()),
            homeworld: normalize_text(record.homeworld.as_deref()),
            birth_year: normalize_text(record.birth_year.as_deref()),
            height: normalize_decimal(record.id, "height", record.height.as_deref()),
            mass: normalize_decimal(record.id, "mass", record.mass.as_deref()),
            hair_color: normalize_text(record.hair_color.as_deref()),
            skin_color: normalize_text(record.skin_color.as_deref()),
            eye_color: normalize_text(record.eye_color.as_deref()),
            species: normalize_text(Some(&record.species)),
            vehicles: normalize_text(Some(&record.vehicles)),
            starships: normalize_text(Some(&record.starships)),
            films: normalize_text(Some(&record.films)),
        })
    }
}

/// `"unknown"` and `""` become `None`; anything else is kept verbatim
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    match value {
        None | Some("") | Some(UNKNOWN_SENTINEL) => None,
        Some(s) => Some(s.to_string()),
    }
}

/// Parse a decimal written with `,` as separator (`"1,77"` -> `1.77`)
pub fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse::<f64>().ok()
}

fn normalize_decimal(id: u32, field: &str, value: Option<&str>) -> Option<f64> {
    let text = normalize_text(value)?;
    let parsed = parse_decimal(&text);
    if parsed.is_none() {
        warn!(id, field, value = %text, "Non-numeric value stored as NULL");
    }
    parsed
}
