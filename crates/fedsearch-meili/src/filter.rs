//! Meilisearch filter-expression predicates.

use serde_json::Value;

use fedsearch_core::compiler::{literal, quote, BoundingBox, Comparison, PredicateBuilder};
use fedsearch_core::{Error, Result};

use crate::BACKEND;

/// A compiled condition: either query text or a filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeiliPredicate {
    Query(String),
    Filter(String),
}

pub struct MeiliFilterBuilder {
    identifier: String,
}

impl MeiliFilterBuilder {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self { identifier: identifier.into() }
    }

    fn group(&self, children: Vec<MeiliPredicate>, joiner: &str) -> Result<MeiliPredicate> {
        if children.is_empty() {
            return Err(unsupported(format!("empty {} group", joiner.to_lowercase())));
        }
        let parts = children
            .into_iter()
            .map(|child| match child {
                MeiliPredicate::Filter(expr) => Ok(expr),
                MeiliPredicate::Query(_) => Err(unsupported("search inside a filter group".to_string())),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(MeiliPredicate::Filter(format!("({})", parts.join(&format!(" {joiner} ")))))
    }
}

impl PredicateBuilder for MeiliFilterBuilder {
    type Predicate = MeiliPredicate;

    fn search(&self, query: &str) -> Result<MeiliPredicate> {
        Ok(MeiliPredicate::Query(query.to_string()))
    }

    fn identifier(&self, id: &str) -> Result<MeiliPredicate> {
        Ok(MeiliPredicate::Filter(format!("{} = {}", self.identifier, quote(id))))
    }

    fn compare(&self, field: &str, op: Comparison, value: &Value) -> Result<MeiliPredicate> {
        Ok(MeiliPredicate::Filter(format!("{} {} {}", field, op.symbol(), literal(value))))
    }

    fn membership(&self, field: &str, values: &[Value], negated: bool) -> Result<MeiliPredicate> {
        let list = values.iter().map(literal).collect::<Vec<_>>().join(", ");
        let op = if negated { "NOT IN" } else { "IN" };
        Ok(MeiliPredicate::Filter(format!("{field} {op} [{list}]")))
    }

    // Meilisearch geo filters always read `_geo`.
    fn geo_distance(&self, _field: &str, lat: f64, lng: f64, distance: f64) -> Result<MeiliPredicate> {
        Ok(MeiliPredicate::Filter(format!("_geoRadius({lat}, {lng}, {distance})")))
    }

    fn geo_bounding_box(&self, _field: &str, bbox: BoundingBox) -> Result<MeiliPredicate> {
        Ok(MeiliPredicate::Filter(format!(
            "_geoBoundingBox([{}, {}], [{}, {}])",
            bbox.north, bbox.east, bbox.south, bbox.west
        )))
    }

    fn and(&self, children: Vec<MeiliPredicate>) -> Result<MeiliPredicate> {
        self.group(children, "AND")
    }

    fn or(&self, children: Vec<MeiliPredicate>) -> Result<MeiliPredicate> {
        self.group(children, "OR")
    }
}

fn unsupported(reason: String) -> Error {
    Error::UnsupportedCondition { backend: BACKEND, reason }
}
