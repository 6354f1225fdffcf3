//! Declarative JSON payloads accepted by `search_from_json` and
//! `multi_search_from_json`.

use serde_json::Value;
use tracing::debug;

use crate::condition::Condition;
use crate::error::{Error, Result};
use crate::normalizer::{
    resolve_index_name, resolve_query_text, resolve_show_ranking_score, strip_aliases, INDEX_KEYS,
    QUERY_KEYS, RANKING_SCORE_KEYS,
};
use crate::types::{FacetKind, FacetRequest, FederationSpec, Fields, Highlight, SortDirection};

pub const DEFAULT_FEDERATION_LIMIT: usize = 100;

/// Keys consumed by the declarative model. Everything else lands in
/// [`SearchPayload::extra`] untouched.
const DECLARATIVE_KEYS: [&str; 9] =
    ["filters", "sort", "limit", "offset", "highlight", "distinct", "facets", "filter", "vector"];

/// One single-index declarative request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPayload {
    pub index: String,
    pub query: String,
    pub filters: Vec<Condition>,
    pub sort: Vec<(String, SortDirection)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub highlight: Option<Highlight>,
    pub distinct: Option<String>,
    pub facets: Vec<FacetRequest>,
    /// Query embedding for engines with vector search.
    pub vector: Option<Vec<f64>>,
    pub show_ranking_score: bool,
    /// Escape-hatch and passthrough keys, including raw string `filter`/`filters`.
    pub extra: Fields,
}

impl SearchPayload {
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::Operation("search payload must be a JSON object".to_string()))?;

        let mut extra = map.clone();
        strip_aliases(&mut extra, &INDEX_KEYS);
        strip_aliases(&mut extra, &QUERY_KEYS);
        strip_aliases(&mut extra, &RANKING_SCORE_KEYS);
        strip_aliases(&mut extra, &DECLARATIVE_KEYS);

        // A string `filter`/`filters` is a raw backend filter; a list is declarative.
        let mut filters = Vec::new();
        for key in ["filters", "filter"] {
            match map.get(key) {
                Some(list @ Value::Array(_)) => {
                    if filters.is_empty() {
                        filters = Condition::parse_list(list)?;
                    } else {
                        debug!(key, "ignoring second declarative filter list");
                    }
                }
                Some(raw @ Value::String(_)) => {
                    extra.insert(key.to_string(), raw.clone());
                }
                Some(Value::Null) | None => {}
                Some(other) => {
                    return Err(Error::InvalidFilter(serde::de::Error::custom(format!(
                        "`{key}` must be a list of conditions or a filter string, got {other}"
                    ))));
                }
            }
        }

        Ok(Self {
            index: resolve_index_name(map),
            query: resolve_query_text(map),
            filters,
            sort: parse_sort(map.get("sort")),
            limit: map.get("limit").and_then(as_usize),
            offset: map.get("offset").and_then(as_usize),
            highlight: map
                .get("highlight")
                .and_then(|h| serde_json::from_value::<Highlight>(h.clone()).ok())
                .filter(|h| !h.fields.is_empty()),
            distinct: map
                .get("distinct")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            facets: parse_facets(map.get("facets")),
            vector: parse_vector(map.get("vector")),
            show_ranking_score: resolve_show_ranking_score(map),
            extra,
        })
    }

    /// True when any of `keys` was supplied as an escape hatch.
    pub fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.extra.get(*k).is_some_and(|v| !v.is_null()))
    }
}

/// A multi-index declarative request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FederatedPayload {
    /// Shared query text for entries without their own.
    pub query: String,
    pub queries: Vec<Fields>,
    pub federation: FederationSpec,
}

impl FederatedPayload {
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::Operation("federated payload must be a JSON object".to_string()))?;
        let queries = map
            .get("queries")
            .and_then(Value::as_array)
            .map(|qs| qs.iter().filter_map(Value::as_object).cloned().collect())
            .unwrap_or_default();
        let federation = match map.get("federation") {
            Some(f @ Value::Object(_)) => serde_json::from_value(f.clone())?,
            _ => FederationSpec::default(),
        };
        Ok(Self { query: resolve_query_text(map), queries, federation })
    }

    pub fn limit(&self) -> usize {
        self.federation.page_size(DEFAULT_FEDERATION_LIMIT)
    }

    /// Expand entry `i` into a single-index payload resolved against the shared
    /// query and the federation limit. `None` when the entry names no index.
    pub fn entry(&self, i: usize) -> Option<(String, Value)> {
        let q = self.queries.get(i)?;
        let index = resolve_index_name(q);
        if index.is_empty() {
            return None;
        }

        let mut single = q.clone();
        let own_query = resolve_query_text(q);
        strip_aliases(&mut single, &INDEX_KEYS);
        strip_aliases(&mut single, &QUERY_KEYS);

        let limit = q
            .get("limit")
            .and_then(as_usize)
            .or_else(|| q.get("hitsPerPage").and_then(as_usize))
            .unwrap_or_else(|| self.limit());

        single.insert("index".to_string(), Value::String(index.clone()));
        single.insert(
            "q".to_string(),
            Value::String(if own_query.is_empty() { self.query.clone() } else { own_query }),
        );
        single.insert("limit".to_string(), Value::from(limit));
        Some((index, Value::Object(single)))
    }
}

fn as_usize(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `{"price": "asc"}` in key order, or `["price:asc", "title"]`.
fn parse_sort(value: Option<&Value>) -> Vec<(String, SortDirection)> {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(field, dir)| (field.clone(), SortDirection::parse(dir.as_str().unwrap_or_default())))
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|item| match item.rsplit_once(':') {
                Some((field, dir)) => (field.to_string(), SortDirection::parse(dir)),
                None => (item.to_string(), SortDirection::Asc),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_vector(value: Option<&Value>) -> Option<Vec<f64>> {
    let value = value.filter(|v| !v.is_null())?;
    match serde_json::from_value::<Vec<f64>>(value.clone()) {
        Ok(vector) => Some(vector),
        Err(e) => {
            debug!(error = %e, "ignoring malformed vector");
            None
        }
    }
}

fn parse_facets(value: Option<&Value>) -> Vec<FacetRequest> {
    let Some(Value::Array(items)) = value else { return Vec::new() };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<FacetRequest>(item.clone()) {
            Ok(facet) => Some(facet),
            Err(e) => {
                debug!(error = %e, "ignoring facet request");
                None
            }
        })
        .collect()
}

impl FacetRequest {
    pub fn count(field: impl Into<String>) -> Self {
        Self { kind: FacetKind::Count, field: field.into(), options: Fields::new() }
    }
}
