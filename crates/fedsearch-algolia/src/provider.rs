use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use fedsearch_core::compiler::compile;
use fedsearch_core::http::{HttpTransport, JsonTransport};
use fedsearch_core::normalizer::{
    resolve_index_name, resolve_query_text, resolve_show_ranking_score, strip_aliases, INDEX_KEYS,
    QUERY_KEYS,
};
use fedsearch_core::payload::SearchPayload;
use fedsearch_core::schema::{BackendFamily, IndexDescriptor};
use fedsearch_core::schema_loader::SchemaCache;
use fedsearch_core::traits::degrade;
use fedsearch_core::types::hits_from;
use fedsearch_core::{
    Config, FederationSpec, Fields, Hit, RelevanceFilter, Result, SearchBuilder, SearchProvider, SearchRequest,
};
use fedsearch_federation::{blend, federate, post_process, RankedPool, RankingFloor, TermOverlapFilter};

use crate::client::AlgoliaClient;
use crate::filter::{AlgoliaFilterBuilder, AlgoliaPredicate};
use crate::BACKEND;

/// Payload keys that route `search_from_json` around the condition compiler.
pub const ESCAPE_HATCHES: [&str; 6] =
    ["filter", "filters", "facetFilters", "numericFilters", "aroundLatLng", "insideBoundingBox"];

pub const DEFAULT_HITS_PER_PAGE: usize = 20;

/// Algolia's canonical relevance signal lives under `_rankingInfo`.
fn ranking_score(fields: &Fields) -> Option<f64> {
    fields.get("_rankingInfo").and_then(|info| info.get("neuralScore")).and_then(Value::as_f64)
}

/// Sorting goes through replicas named `<index>__<field>_<direction>`.
pub fn replica_name(index: &str, field: &str, direction: &str) -> String {
    format!("{index}__{field}_{direction}")
}

pub struct Algolia<T = HttpTransport> {
    client: AlgoliaClient<T>,
    config: Config,
    schema: SchemaCache,
    relevance: Arc<dyn RelevanceFilter>,
}

impl Algolia<HttpTransport> {
    pub fn from_config(config: Config) -> Result<Self> {
        Ok(Self::new(AlgoliaClient::from_config(&config)?, config))
    }
}

impl<T: JsonTransport> Algolia<T> {
    pub fn new(client: AlgoliaClient<T>, config: Config) -> Self {
        let schema = SchemaCache::new(BackendFamily::Algolia, config.schema_settings_dir());
        Self { client, config, schema, relevance: Arc::new(TermOverlapFilter) }
    }

    pub fn with_schema(mut self, schema: SchemaCache) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_relevance(mut self, relevance: Arc<dyn RelevanceFilter>) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    async fn run_single(&self, request: Fields, query: &str, show: bool) -> Result<Vec<Hit>> {
        let response = self.client.search(vec![Value::Object(request)]).await?;
        let hits = response
            .get("results")
            .and_then(|r| r.get(0))
            .map(|first| hits_from(first, ranking_score))
            .unwrap_or_default();
        Ok(post_process(&self.config, self.relevance.as_ref(), query, hits, show))
    }

    async fn try_search(&self, index: &str, query: &str, params: &Fields, limit: usize) -> Result<Vec<Hit>> {
        let query = if query.is_empty() { resolve_query_text(params) } else { query.to_string() };
        let mut request = Map::new();
        request.insert("indexName".into(), json!(index));
        request.insert("query".into(), json!(query));
        request.insert("hitsPerPage".into(), json!(limit));
        let mut overrides = params.clone();
        strip_aliases(&mut overrides, &INDEX_KEYS);
        strip_aliases(&mut overrides, &QUERY_KEYS);
        request.extend(overrides);

        self.run_single(request, &query, resolve_show_ranking_score(params)).await
    }

    async fn try_multi_search(
        &self,
        queries: &[Fields],
        query: &str,
        federation: &FederationSpec,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        let hits_per_page = federation.page_size(limit);
        let mut entries: Vec<(String, bool)> = Vec::with_capacity(queries.len());
        let mut requests = Vec::with_capacity(queries.len());

        for (i, q) in queries.iter().enumerate() {
            let index = resolve_index_name(q);
            if index.is_empty() {
                warn!(backend = BACKEND, position = i, "multi_search: skipping query without an index");
                continue;
            }
            let own_query = resolve_query_text(q);
            let mut request = q.clone();
            strip_aliases(&mut request, &INDEX_KEYS);
            strip_aliases(&mut request, &QUERY_KEYS);
            request.insert("indexName".into(), json!(index));
            request.insert("query".into(), json!(if own_query.is_empty() { query } else { own_query.as_str() }));
            if let Some(own_limit) = request.remove("limit") {
                request.entry("hitsPerPage").or_insert(own_limit);
            }
            federation.apply_defaults(&mut request);
            request.entry("hitsPerPage").or_insert_with(|| json!(hits_per_page));

            entries.push((index, resolve_show_ranking_score(&request)));
            requests.push(Value::Object(request));
        }

        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.client.search(requests).await?;
        let results = response.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
        let floor = RankingFloor::from_config(&self.config);
        let pools = entries
            .into_iter()
            .zip(results.iter())
            .map(|((index, show), result)| RankedPool::new(index, floor.apply(hits_from(result, ranking_score), show)))
            .collect();

        // Scores were floored per entry above.
        let hits = blend(pools, federation, limit);
        Ok(post_process(&self.config, self.relevance.as_ref(), query, hits, false))
    }

    async fn try_search_from_json(&self, payload: &Value) -> Result<Vec<Hit>> {
        let parsed = SearchPayload::from_value(payload)?;
        let Some(schema) = self.schema.get() else {
            warn!(backend = BACKEND, "search_from_json: no schema settings configured");
            return Ok(Vec::new());
        };
        if parsed.index.is_empty() {
            warn!(backend = BACKEND, "search_from_json: missing index");
            return Ok(Vec::new());
        }

        if parsed.has_any(&ESCAPE_HATCHES) {
            if parsed.vector.is_some() {
                debug!(backend = BACKEND, "vector search is not supported; ignoring vector");
            }
            let mut request = Map::new();
            request.insert("indexName".into(), json!(parsed.index));
            request.insert("query".into(), json!(parsed.query));
            apply_paging(&mut request, parsed.limit, parsed.offset);
            if parsed.show_ranking_score {
                request.insert("getRankingInfo".into(), Value::Bool(true));
            }
            for (key, value) in &parsed.extra {
                // `filter` is accepted as an alias for Algolia's `filters`.
                let key = if key == "filter" { "filters" } else { key.as_str() };
                request.entry(key).or_insert_with(|| value.clone());
            }
            return self.run_single(request, &parsed.query, parsed.show_ranking_score).await;
        }

        let Some(descriptor) = schema.index(&parsed.index) else {
            warn!(backend = BACKEND, index = %parsed.index, "search_from_json: index not in schema");
            return Ok(Vec::new());
        };

        let request = SearchBuilder::from_payload(descriptor, &parsed).build();
        let mut body = request_body(&request, descriptor)?;
        for (key, value) in &parsed.extra {
            body.entry(key.clone()).or_insert_with(|| value.clone());
        }
        let query = body.get("query").and_then(Value::as_str).unwrap_or_default().to_string();
        self.run_single(body, &query, request.show_ranking_score).await
    }
}

/// `offset` pages by position and needs `length`; otherwise `hitsPerPage`.
fn apply_paging(request: &mut Fields, limit: Option<usize>, offset: Option<usize>) {
    match (offset, limit) {
        (Some(offset), limit) => {
            request.insert("offset".into(), json!(offset));
            request.insert("length".into(), json!(limit.unwrap_or(DEFAULT_HITS_PER_PAGE)));
        }
        (None, Some(limit)) => {
            request.insert("hitsPerPage".into(), json!(limit));
        }
        (None, None) => {}
    }
}

/// Compile a built request into one entry of a multi-query `requests` list.
pub fn request_body(request: &SearchRequest, descriptor: &IndexDescriptor) -> Result<Fields> {
    let mut terms: Vec<String> = Vec::new();
    let mut filters: Vec<String> = Vec::new();
    let mut geo: Vec<(&'static str, Value)> = Vec::new();
    for predicate in compile(&request.filters, &AlgoliaFilterBuilder)? {
        match predicate {
            AlgoliaPredicate::Query(text) if !text.is_empty() => terms.push(text),
            AlgoliaPredicate::Query(_) => {}
            AlgoliaPredicate::Geo(params) => geo.extend(params),
            filter => filters.extend(filter.filter_expr()),
        }
    }

    let index_name = match request.sort.split_first() {
        Some(((field, direction), rest)) => {
            if !rest.is_empty() {
                debug!(backend = BACKEND, index = %request.index, "only the first sort key selects a replica");
            }
            replica_name(&request.index, field, direction.as_str())
        }
        None => request.index.clone(),
    };

    let mut body = Map::new();
    body.insert("indexName".into(), json!(index_name));
    body.insert("query".into(), json!(terms.join(" ")));
    if !filters.is_empty() {
        body.insert("filters".into(), json!(filters.join(" AND ")));
    }
    for (key, value) in geo {
        body.insert(key.into(), value);
    }
    apply_paging(&mut body, request.limit, request.offset);
    if let Some(highlight) = &request.highlight {
        body.insert("attributesToHighlight".into(), json!(highlight.fields));
        body.insert("highlightPreTag".into(), json!(highlight.pre_tag));
        body.insert("highlightPostTag".into(), json!(highlight.post_tag));
    }
    if let Some(distinct) = &request.distinct {
        if descriptor.distinct_field() != Some(distinct.as_str()) {
            debug!(backend = BACKEND, field = %distinct, "distinct field differs from attributeForDistinct");
        }
        body.insert("distinct".into(), Value::Bool(true));
    }
    if !request.facets.is_empty() {
        let mut fields: Vec<&str> = Vec::new();
        for facet in &request.facets {
            if !fields.contains(&facet.field.as_str()) {
                fields.push(&facet.field);
            }
        }
        body.insert("facets".into(), json!(fields));
    }
    if request.vector.is_some() {
        debug!(backend = BACKEND, "vector search is not supported; ignoring vector");
    }
    if request.show_ranking_score {
        body.insert("getRankingInfo".into(), Value::Bool(true));
    }
    Ok(body)
}

#[async_trait]
impl<T: JsonTransport> SearchProvider for Algolia<T> {
    type Client = AlgoliaClient<T>;

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn client(&self) -> &AlgoliaClient<T> {
        &self.client
    }

    async fn search(&self, index: &str, query: &str, params: &Fields, limit: usize) -> Result<Vec<Hit>> {
        degrade(self.try_search(index, query, params, limit).await, BACKEND, "search")
    }

    async fn multi_search(
        &self,
        queries: &[Fields],
        query: &str,
        federation: &FederationSpec,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        degrade(self.try_multi_search(queries, query, federation, limit).await, BACKEND, "multi_search")
    }

    async fn search_from_json(&self, payload: &Value) -> Result<Vec<Hit>> {
        degrade(self.try_search_from_json(payload).await, BACKEND, "search_from_json")
    }

    async fn multi_search_from_json(&self, payload: &Value) -> Result<Vec<Hit>> {
        let floor = RankingFloor::from_config(&self.config);
        degrade(
            federate(self, payload, self.config.request_timeout_ms(), floor).await,
            BACKEND,
            "multi_search_from_json",
        )
    }
}
