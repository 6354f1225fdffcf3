use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::warn;

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

use crate::client::MeilisearchClient;
use crate::filter::{MeiliFilterBuilder, MeiliPredicate};
use crate::BACKEND;

/// Per-query parameters forwarded to `/multi-search` and to the native
/// escape-hatch search.
pub const FORWARDED_PARAMS: [&str; 16] = [
    "filter",
    "limit",
    "offset",
    "hitsPerPage",
    "page",
    "attributesToRetrieve",
    "attributesToHighlight",
    "facets",
    "sort",
    "matchingStrategy",
    "showRankingScore",
    "showMatchesPosition",
    "highlightPreTag",
    "highlightPostTag",
    "retrieveVectors",
    "vector",
];

/// Payload keys that route `search_from_json` around the condition compiler.
/// A query `vector` does too.
pub const ESCAPE_HATCHES: [&str; 2] = ["retrieveVectors", "filter"];

const RANKING_SCORE_FIELD: &str = "_rankingScore";

fn ranking_score(fields: &Fields) -> Option<f64> {
    fields.get(RANKING_SCORE_FIELD).and_then(Value::as_f64)
}

pub struct Meilisearch<T = HttpTransport> {
    client: MeilisearchClient<T>,
    config: Config,
    schema: SchemaCache,
    relevance: Arc<dyn RelevanceFilter>,
}

impl Meilisearch<HttpTransport> {
    pub fn from_config(config: Config) -> Result<Self> {
        Ok(Self::new(MeilisearchClient::from_config(&config)?, config))
    }
}

impl<T: JsonTransport> Meilisearch<T> {
    pub fn new(client: MeilisearchClient<T>, config: Config) -> Self {
        let schema = SchemaCache::new(BackendFamily::Meilisearch, config.schema_settings_dir());
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

    async fn run_search(&self, index: &str, body: &Value, query: &str, show: bool) -> Result<Vec<Hit>> {
        let response = self.client.search(index, body).await?;
        let hits = hits_from(&response, ranking_score);
        Ok(post_process(&self.config, self.relevance.as_ref(), query, hits, show))
    }

    async fn try_search(&self, index: &str, query: &str, params: &Fields, limit: usize) -> Result<Vec<Hit>> {
        let mut body = params.clone();
        let query = if query.is_empty() { resolve_query_text(params) } else { query.to_string() };
        strip_aliases(&mut body, &INDEX_KEYS);
        strip_aliases(&mut body, &QUERY_KEYS);
        body.insert("q".into(), Value::String(query.clone()));
        body.entry("limit").or_insert_with(|| json!(limit));

        let show = resolve_show_ranking_score(params);
        self.run_search(index, &Value::Object(body), &query, show).await
    }

    async fn try_multi_search(
        &self,
        queries: &[Fields],
        query: &str,
        federation: &FederationSpec,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        let native = federation.is_native();
        let mut entries = Vec::with_capacity(queries.len());
        let mut shows = Vec::with_capacity(queries.len());

        for (i, q) in queries.iter().enumerate() {
            let index = resolve_index_name(q);
            if index.is_empty() {
                warn!(backend = BACKEND, position = i, "multi_search: skipping query without an index");
                continue;
            }
            let mut merged = q.clone();
            federation.apply_defaults(&mut merged);
            shows.push(resolve_show_ranking_score(&merged));

            let own_query = resolve_query_text(q);
            let mut entry = Map::new();
            entry.insert("indexUid".into(), Value::String(index.clone()));
            entry.insert("q".into(), Value::String(if own_query.is_empty() { query.to_string() } else { own_query }));
            for key in FORWARDED_PARAMS {
                if let Some(value) = merged.get(key).filter(|v| !v.is_null()) {
                    entry.insert(key.into(), value.clone());
                }
            }
            if native {
                entry.insert("federationOptions".into(), json!({ "weight": federation.weight(&index) }));
            }
            entries.push(Value::Object(entry));
        }

        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = Map::new();
        body.insert("queries".into(), Value::Array(entries));
        if native {
            body.insert("federation".into(), native_federation(federation));
        }
        let response = self.client.multi_search(&Value::Object(body)).await?;

        let floor = RankingFloor::from_config(&self.config);
        let hits = if native {
            // Engine-blended hits name their source query in `_federation.queriesPosition`.
            let mut hits = hits_from(&response, ranking_score);
            hits.retain(|hit| {
                let show = hit
                    .get("_federation")
                    .and_then(|f| f.get("queriesPosition"))
                    .and_then(Value::as_u64)
                    .and_then(|i| shows.get(i as usize).copied())
                    .unwrap_or(false);
                floor.admits(hit, show)
            });
            hits
        } else {
            let pools = response
                .get("results")
                .and_then(Value::as_array)
                .map(|results| {
                    results
                        .iter()
                        .zip(&shows)
                        .map(|(r, show)| {
                            let index = r.get("indexUid").and_then(Value::as_str).unwrap_or_default();
                            RankedPool::new(index, floor.apply(hits_from(r, ranking_score), *show))
                        })
                        .collect()
                })
                .unwrap_or_default();
            blend(pools, federation, limit)
        };
        // Scores were floored per entry above.
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

        if parsed.vector.is_some() || parsed.has_any(&ESCAPE_HATCHES) {
            let mut body = Map::new();
            body.insert("q".into(), Value::String(parsed.query.clone()));
            if let Some(source) = payload.as_object() {
                for key in FORWARDED_PARAMS {
                    if let Some(value) = source.get(key).filter(|v| !v.is_null()) {
                        body.insert(key.into(), value.clone());
                    }
                }
            }
            return self
                .run_search(&parsed.index, &Value::Object(body), &parsed.query, parsed.show_ranking_score)
                .await;
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
        let query = body.get("q").and_then(Value::as_str).unwrap_or_default().to_string();
        self.run_search(&parsed.index, &Value::Object(body), &query, request.show_ranking_score).await
    }
}

/// Compile a built request into a `/search` body.
pub fn request_body(request: &SearchRequest, descriptor: &IndexDescriptor) -> Result<Fields> {
    let builder = MeiliFilterBuilder::new(descriptor.identifier.clone());
    let mut terms: Vec<String> = Vec::new();
    let mut filters = Vec::new();
    for predicate in compile(&request.filters, &builder)? {
        match predicate {
            MeiliPredicate::Query(text) if !text.is_empty() => terms.push(text),
            MeiliPredicate::Query(_) => {}
            MeiliPredicate::Filter(expr) => filters.push(Value::String(expr)),
        }
    }

    let mut body = Map::new();
    body.insert("q".into(), Value::String(terms.join(" ")));
    if !filters.is_empty() {
        body.insert("filter".into(), Value::Array(filters));
    }
    if !request.sort.is_empty() {
        let sort = request.sort.iter().map(|(field, dir)| json!(format!("{}:{}", field, dir.as_str()))).collect();
        body.insert("sort".into(), Value::Array(sort));
    }
    if let Some(limit) = request.limit {
        body.insert("limit".into(), json!(limit));
    }
    if let Some(offset) = request.offset {
        body.insert("offset".into(), json!(offset));
    }
    if let Some(highlight) = &request.highlight {
        body.insert("attributesToHighlight".into(), json!(highlight.fields));
        body.insert("highlightPreTag".into(), json!(highlight.pre_tag));
        body.insert("highlightPostTag".into(), json!(highlight.post_tag));
    }
    if let Some(distinct) = &request.distinct {
        body.insert("distinct".into(), json!(distinct));
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
    if request.show_ranking_score {
        body.insert("showRankingScore".into(), Value::Bool(true));
    }
    Ok(body)
}

fn native_federation(federation: &FederationSpec) -> Value {
    let mut fed = Map::new();
    if let Some(limit) = federation.limit {
        fed.insert("limit".into(), json!(limit));
    }
    if let Some(offset) = federation.offset {
        fed.insert("offset".into(), json!(offset));
    }
    if let Some(facets) = &federation.facets_by_index {
        fed.insert("facetsByIndex".into(), facets.clone());
    }
    if let Some(merge) = &federation.merge_facets {
        fed.insert("mergeFacets".into(), merge.clone());
    }
    Value::Object(fed)
}

#[async_trait]
impl<T: JsonTransport> SearchProvider for Meilisearch<T> {
    type Client = MeilisearchClient<T>;

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn client(&self) -> &MeilisearchClient<T> {
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
