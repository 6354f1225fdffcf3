//! Domain types shared by every backend adapter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Ordered field map. Insertion order is preserved (`serde_json/preserve_order`).
pub type Fields = Map<String, Value>;

pub const SCORE_FIELD: &str = "_score";

/// One search result.
///
/// - `fields`: the document as returned by the backend, in backend order
/// - `score`: blended federation score, present once the hit went through the blender
/// - `ranking_score`: canonical relevance score extracted from the backend-native
///   ranking payload (`_rankingScore` on Meilisearch, `_rankingInfo.neuralScore`
///   on Algolia). The native payload itself stays in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Hit {
    #[serde(flatten)]
    pub fields: Fields,
    #[serde(rename = "_score", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip)]
    pub ranking_score: Option<f64>,
}

impl Hit {
    pub fn new(fields: Fields) -> Self {
        Self { fields, score: None, ranking_score: None }
    }

    /// Wrap a backend hit. Non-object values are not documents and yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(fields)),
            _ => None,
        }
    }

    pub fn with_ranking_score(mut self, score: Option<f64>) -> Self {
        self.ranking_score = score;
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set the blended score, dropping any backend `_score` field so the
    /// serialized hit carries a single value.
    pub fn set_score(&mut self, score: f64) {
        self.fields.remove(SCORE_FIELD);
        self.score = Some(score);
    }
}

/// Pull the `hits` array out of a backend response body.
pub fn hits_from(body: &Value, ranking: impl Fn(&Fields) -> Option<f64>) -> Vec<Hit> {
    body.get("hits")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .cloned()
                .filter_map(Hit::from_value)
                .map(|hit| {
                    let score = ranking(&hit.fields);
                    hit.with_ranking_score(score)
                })
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Anything other than `asc` sorts descending.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("asc") { SortDirection::Asc } else { SortDirection::Desc }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

pub const DEFAULT_PRE_TAG: &str = "<mark>";
pub const DEFAULT_POST_TAG: &str = "</mark>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub fields: Vec<String>,
    #[serde(default = "default_pre_tag")]
    pub pre_tag: String,
    #[serde(default = "default_post_tag")]
    pub post_tag: String,
}

fn default_pre_tag() -> String {
    DEFAULT_PRE_TAG.to_string()
}

fn default_post_tag() -> String {
    DEFAULT_POST_TAG.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetKind {
    Count,
    MinMax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetRequest {
    #[serde(rename = "type")]
    pub kind: FacetKind,
    pub field: String,
    #[serde(default)]
    pub options: Fields,
}

/// Federation options for multi-index requests.
///
/// `extra` collects every other key; adapters apply those as shared defaults
/// to the per-index queries that don't set them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub weights: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets_by_index: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_facets: Option<Value>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl FederationSpec {
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    pub fn weight(&self, index: &str) -> f64 {
        self.weights.get(index).copied().unwrap_or(Self::DEFAULT_WEIGHT)
    }

    /// True when any key the engine-side federation understands is set.
    pub fn is_native(&self) -> bool {
        self.limit.is_some()
            || self.offset.is_some()
            || self.facets_by_index.is_some()
            || self.merge_facets.is_some()
    }

    pub fn page_size(&self, fallback: usize) -> usize {
        self.limit.unwrap_or(fallback)
    }

    /// Copy the shared `extra` keys into `entry` where it doesn't set them.
    pub fn apply_defaults(&self, entry: &mut Fields) {
        for (key, value) in &self.extra {
            if !entry.contains_key(key) {
                entry.insert(key.clone(), value.clone());
            }
        }
    }
}
