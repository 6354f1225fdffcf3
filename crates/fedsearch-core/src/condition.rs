//! Declarative filter conditions.
//!
//! The JSON vocabulary is a `type` tag plus operator-specific fields:
//!
//! ```json
//! [
//!   {"type": "equal", "field": "status", "value": "published"},
//!   {"type": "or", "conditions": [
//!     {"type": "gt", "field": "price", "value": 10},
//!     {"type": "in", "field": "brand", "values": ["acme", "globex"]}
//!   ]}
//! ]
//! ```
//!
//! Unknown tags are rejected while parsing, so a [`Condition`] tree is always
//! made of known operators.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub const DEFAULT_GEO_FIELD: &str = "_geo";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Search {
        query: String,
    },
    Identifier {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
    },
    Equal {
        field: String,
        value: Value,
    },
    NotEqual {
        field: String,
        value: Value,
    },
    #[serde(rename = "gt")]
    GreaterThan { field: String, value: Value },
    #[serde(rename = "gte")]
    GreaterThanEqual { field: String, value: Value },
    #[serde(rename = "lt")]
    LessThan { field: String, value: Value },
    #[serde(rename = "lte")]
    LessThanEqual { field: String, value: Value },
    In {
        field: String,
        #[serde(deserialize_with = "one_or_many")]
        values: Vec<Value>,
    },
    NotIn {
        field: String,
        #[serde(deserialize_with = "one_or_many")]
        values: Vec<Value>,
    },
    GeoDistance {
        #[serde(default = "default_geo_field")]
        field: String,
        lat: f64,
        lng: f64,
        /// Radius in meters.
        distance: f64,
    },
    GeoBoundingBox {
        #[serde(default = "default_geo_field")]
        field: String,
        north: f64,
        east: f64,
        south: f64,
        west: f64,
    },
    And {
        #[serde(default)]
        conditions: Vec<Condition>,
    },
    Or {
        #[serde(default)]
        conditions: Vec<Condition>,
    },
}

impl Condition {
    /// Parse a list of filter entries. `null` is an empty list; anything that
    /// is not a list of known entries is an [`Error::InvalidFilter`].
    pub fn parse_list(value: &Value) -> Result<Vec<Condition>> {
        if value.is_null() {
            return Ok(Vec::new());
        }
        Vec::<Condition>::deserialize(value).map_err(Error::InvalidFilter)
    }

    pub fn search(query: impl Into<String>) -> Self {
        Condition::Search { query: query.into() }
    }

    pub fn identifier(id: impl Into<String>) -> Self {
        Condition::Identifier { id: id.into() }
    }

    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Equal { field: field.into(), value: value.into() }
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And { conditions }
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Or { conditions }
    }

    /// The document field this condition reads, for leaf conditions that have one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Condition::Equal { field, .. }
            | Condition::NotEqual { field, .. }
            | Condition::GreaterThan { field, .. }
            | Condition::GreaterThanEqual { field, .. }
            | Condition::LessThan { field, .. }
            | Condition::LessThanEqual { field, .. }
            | Condition::In { field, .. }
            | Condition::NotIn { field, .. }
            | Condition::GeoDistance { field, .. }
            | Condition::GeoBoundingBox { field, .. } => Some(field),
            Condition::Search { .. }
            | Condition::Identifier { .. }
            | Condition::And { .. }
            | Condition::Or { .. } => None,
        }
    }

    /// Fields read anywhere in this subtree, depth first.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Condition::And { conditions } | Condition::Or { conditions } => {
                conditions.iter().flat_map(Condition::fields).collect()
            }
            leaf => leaf.field().into_iter().collect(),
        }
    }
}

fn default_geo_field() -> String {
    DEFAULT_GEO_FIELD.to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

/// A scalar in a list position is a one-element list.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values,
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    })
}
