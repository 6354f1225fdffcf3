use tracing::debug;

use crate::condition::Condition;
use crate::payload::SearchPayload;
use crate::schema::IndexDescriptor;
use crate::types::{FacetRequest, Highlight, SortDirection};

/// A fully assembled single-index request. Built by [`SearchBuilder`] and
/// consumed once by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    pub filters: Vec<Condition>,
    pub sort: Vec<(String, SortDirection)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub highlight: Option<Highlight>,
    pub distinct: Option<String>,
    pub facets: Vec<FacetRequest>,
    pub vector: Option<Vec<f64>>,
    pub show_ranking_score: bool,
}

impl SearchRequest {
    /// Text of every top-level `Search` condition, space-joined.
    pub fn query_text(&self) -> String {
        self.filters
            .iter()
            .filter_map(|c| match c {
                Condition::Search { query } if !query.is_empty() => Some(query.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Filter conditions without the top-level `Search` entries.
    pub fn predicates(&self) -> impl Iterator<Item = &Condition> {
        self.filters.iter().filter(|c| !matches!(c, Condition::Search { .. }))
    }
}

pub struct SearchBuilder<'a> {
    descriptor: &'a IndexDescriptor,
    request: SearchRequest,
}

impl<'a> SearchBuilder<'a> {
    pub fn new(descriptor: &'a IndexDescriptor) -> Self {
        Self {
            descriptor,
            request: SearchRequest {
                index: descriptor.name.clone(),
                filters: Vec::new(),
                sort: Vec::new(),
                limit: None,
                offset: None,
                highlight: None,
                distinct: None,
                facets: Vec::new(),
                vector: None,
                show_ranking_score: false,
            },
        }
    }

    /// Apply a declarative payload in the fixed order: query, filters, sort,
    /// limit/offset, highlight, distinct, facets, vector.
    pub fn from_payload(descriptor: &'a IndexDescriptor, payload: &SearchPayload) -> Self {
        let mut builder = Self::new(descriptor);
        if !payload.query.is_empty() {
            builder = builder.add_filter(Condition::search(payload.query.clone()));
        }
        for condition in &payload.filters {
            builder = builder.add_filter(condition.clone());
        }
        for (field, direction) in &payload.sort {
            builder = builder.add_sort_by(field, *direction);
        }
        if let Some(limit) = payload.limit {
            builder = builder.limit(limit);
        }
        if let Some(offset) = payload.offset {
            builder = builder.offset(offset);
        }
        if let Some(highlight) = &payload.highlight {
            builder = builder.highlight(highlight.clone());
        }
        if let Some(distinct) = &payload.distinct {
            builder = builder.distinct(distinct);
        }
        for facet in &payload.facets {
            builder = builder.add_facet(facet.clone());
        }
        if let Some(vector) = &payload.vector {
            builder = builder.vector(vector.clone());
        }
        builder.show_ranking_score(payload.show_ranking_score)
    }

    pub fn add_filter(mut self, condition: Condition) -> Self {
        for field in condition.fields() {
            if self.descriptor.field(field).is_some() && !self.descriptor.is_filterable(field) {
                debug!(index = %self.descriptor.name, field, "filtering on a non-filterable field");
            }
        }
        self.request.filters.push(condition);
        self
    }

    pub fn add_sort_by(mut self, field: &str, direction: SortDirection) -> Self {
        if self.descriptor.field(field).is_some() && !self.descriptor.is_sortable(field) {
            debug!(index = %self.descriptor.name, field, "sorting on a non-sortable field");
        }
        self.request.sort.push((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.request.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.request.offset = Some(offset);
        self
    }

    pub fn highlight(mut self, highlight: Highlight) -> Self {
        self.request.highlight = Some(highlight);
        self
    }

    pub fn distinct(mut self, field: &str) -> Self {
        self.request.distinct = Some(field.to_string());
        self
    }

    pub fn add_facet(mut self, facet: FacetRequest) -> Self {
        self.request.facets.push(facet);
        self
    }

    pub fn vector(mut self, vector: Vec<f64>) -> Self {
        self.request.vector = Some(vector);
        self
    }

    pub fn show_ranking_score(mut self, show: bool) -> Self {
        self.request.show_ranking_score = show;
        self
    }

    pub fn build(self) -> SearchRequest {
        self.request
    }
}
