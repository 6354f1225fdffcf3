//! Algolia `filters` grammar and geo search parameters.
//!
//! The grammar is a conjunction of atoms and parenthesized disjunctions. A
//! disjunction holds atoms of one kind only (all facet or all numeric), and an
//! `AND` can never sit inside an `OR`. Predicates carry their shape so groups
//! that break those rules fail at compile time instead of at the engine.

use serde_json::{json, Value};

use fedsearch_core::compiler::{literal, quote, BoundingBox, Comparison, PredicateBuilder};
use fedsearch_core::{Error, Result};

use crate::BACKEND;

pub const IDENTIFIER_FIELD: &str = "objectID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Facet,
    Numeric,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlgoliaPredicate {
    Query(String),
    /// One facet or numeric filter.
    Atom { kind: FilterKind, expr: String },
    /// Same-kind atoms joined by `OR`.
    AnyOf { kind: FilterKind, terms: Vec<String> },
    /// Atoms and disjunctions joined by `AND`.
    AllOf(Vec<String>),
    /// Search parameters such as `aroundLatLng`; only valid at the top level.
    Geo(Vec<(&'static str, Value)>),
}

impl AlgoliaPredicate {
    /// The `filters` text, or `None` for query text and geo parameters.
    pub fn filter_expr(&self) -> Option<String> {
        match self {
            AlgoliaPredicate::Atom { expr, .. } => Some(expr.clone()),
            AlgoliaPredicate::AnyOf { terms, .. } => Some(format!("({})", terms.join(" OR "))),
            AlgoliaPredicate::AllOf(parts) => Some(parts.join(" AND ")),
            AlgoliaPredicate::Query(_) | AlgoliaPredicate::Geo(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct AlgoliaFilterBuilder;

/// `brand:"acme"`, `in_stock:true`, `price = 3`.
fn facet(field: &str, value: &Value) -> (FilterKind, String) {
    match value {
        Value::Number(n) => (FilterKind::Numeric, format!("{field} = {n}")),
        Value::Bool(b) => (FilterKind::Facet, format!("{field}:{b}")),
        Value::String(s) => (FilterKind::Facet, format!("{field}:{}", quote(s))),
        other => (FilterKind::Facet, format!("{field}:{}", quote(&other.to_string()))),
    }
}

/// `NOT brand:"acme"`, or `price != 3` for numbers.
fn negated_facet(field: &str, value: &Value) -> (FilterKind, String) {
    match facet(field, value) {
        (FilterKind::Numeric, _) => (FilterKind::Numeric, format!("{field} != {}", literal(value))),
        (FilterKind::Facet, expr) => (FilterKind::Facet, format!("NOT {expr}")),
    }
}

/// Numeric comparisons take numbers or numeric strings only.
fn numeric(field: &str, op: Comparison, value: &Value) -> Result<String> {
    let number = match value {
        Value::Number(_) => literal(value),
        Value::String(s) if s.trim().parse::<f64>().is_ok() => s.trim().to_string(),
        other => return Err(unsupported(format!("non-numeric comparison on {field}: {other}"))),
    };
    Ok(format!("{} {} {}", field, op.symbol(), number))
}

/// Fold one atom into a disjunction, keeping every term the same kind.
fn push_term(kind: &mut Option<FilterKind>, terms: &mut Vec<String>, term_kind: FilterKind, term: String) -> Result<()> {
    match kind {
        Some(k) if *k != term_kind => Err(unsupported("OR across facet and numeric filters".into())),
        _ => {
            *kind = Some(term_kind);
            terms.push(term);
            Ok(())
        }
    }
}

fn group_child_error(child: &AlgoliaPredicate) -> Error {
    match child {
        AlgoliaPredicate::Query(_) => unsupported("search inside a filter group".into()),
        AlgoliaPredicate::Geo(_) => unsupported("geo condition inside a filter group".into()),
        _ => unsupported("AND inside an OR group".into()),
    }
}

impl PredicateBuilder for AlgoliaFilterBuilder {
    type Predicate = AlgoliaPredicate;

    fn search(&self, query: &str) -> Result<AlgoliaPredicate> {
        Ok(AlgoliaPredicate::Query(query.to_string()))
    }

    fn identifier(&self, id: &str) -> Result<AlgoliaPredicate> {
        Ok(AlgoliaPredicate::Atom { kind: FilterKind::Facet, expr: format!("{IDENTIFIER_FIELD}:{}", quote(id)) })
    }

    fn compare(&self, field: &str, op: Comparison, value: &Value) -> Result<AlgoliaPredicate> {
        let (kind, expr) = match (op, value) {
            (Comparison::Equal, _) => facet(field, value),
            (Comparison::NotEqual, _) => negated_facet(field, value),
            _ => (FilterKind::Numeric, numeric(field, op, value)?),
        };
        Ok(AlgoliaPredicate::Atom { kind, expr })
    }

    fn membership(&self, field: &str, values: &[Value], negated: bool) -> Result<AlgoliaPredicate> {
        if values.is_empty() {
            return Err(unsupported(format!("empty value list for {field}")));
        }
        if negated {
            let mut parts: Vec<(FilterKind, String)> = values.iter().map(|v| negated_facet(field, v)).collect();
            if parts.len() == 1 {
                let (kind, expr) = parts.remove(0);
                return Ok(AlgoliaPredicate::Atom { kind, expr });
            }
            return Ok(AlgoliaPredicate::AllOf(parts.into_iter().map(|(_, expr)| expr).collect()));
        }

        let mut kind = None;
        let mut terms = Vec::with_capacity(values.len());
        for value in values {
            let (term_kind, term) = facet(field, value);
            push_term(&mut kind, &mut terms, term_kind, term)?;
        }
        Ok(AlgoliaPredicate::AnyOf { kind: kind.unwrap_or(FilterKind::Facet), terms })
    }

    fn geo_distance(&self, _field: &str, lat: f64, lng: f64, distance: f64) -> Result<AlgoliaPredicate> {
        // aroundRadius is an integer number of meters.
        Ok(AlgoliaPredicate::Geo(vec![
            ("aroundLatLng", json!(format!("{lat}, {lng}"))),
            ("aroundRadius", json!(distance.round().max(1.0) as u64)),
        ]))
    }

    fn geo_bounding_box(&self, _field: &str, bbox: BoundingBox) -> Result<AlgoliaPredicate> {
        Ok(AlgoliaPredicate::Geo(vec![(
            "insideBoundingBox",
            json!([[bbox.north, bbox.east, bbox.south, bbox.west]]),
        )]))
    }

    fn and(&self, children: Vec<AlgoliaPredicate>) -> Result<AlgoliaPredicate> {
        if children.is_empty() {
            return Err(unsupported("empty and group".into()));
        }
        let mut parts = Vec::with_capacity(children.len());
        for child in children {
            match child {
                AlgoliaPredicate::AllOf(inner) => parts.extend(inner),
                other @ (AlgoliaPredicate::Query(_) | AlgoliaPredicate::Geo(_)) => {
                    return Err(group_child_error(&other))
                }
                other => parts.extend(other.filter_expr()),
            }
        }
        Ok(AlgoliaPredicate::AllOf(parts))
    }

    fn or(&self, children: Vec<AlgoliaPredicate>) -> Result<AlgoliaPredicate> {
        if children.is_empty() {
            return Err(unsupported("empty or group".into()));
        }
        let mut kind = None;
        let mut terms = Vec::with_capacity(children.len());
        for child in children {
            match child {
                AlgoliaPredicate::Atom { kind: term_kind, expr } => push_term(&mut kind, &mut terms, term_kind, expr)?,
                AlgoliaPredicate::AnyOf { kind: term_kind, terms: inner } => {
                    for term in inner {
                        push_term(&mut kind, &mut terms, term_kind, term)?;
                    }
                }
                other => return Err(group_child_error(&other)),
            }
        }
        Ok(AlgoliaPredicate::AnyOf { kind: kind.unwrap_or(FilterKind::Facet), terms })
    }
}

fn unsupported(reason: String) -> Error {
    Error::UnsupportedCondition { backend: BACKEND, reason }
}
