use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use fedsearch_algolia::{Algolia, AlgoliaClient};
use fedsearch_core::http::JsonTransport;
use fedsearch_core::schema::BackendFamily;
use fedsearch_core::schema_loader::SchemaCache;
use fedsearch_core::{Config, Error, FederationSpec, Fields, Hit, RelevanceFilter, Result, SearchProvider};

/// Answers multi-query calls with canned hits per `indexName` and records
/// every `requests` list it receives.
#[derive(Default)]
struct FakeAlgolia {
    hits: HashMap<String, Value>,
    fail: bool,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FakeAlgolia {
    fn index(mut self, name: &str, hits: Value) -> Self {
        self.hits.insert(name.to_string(), hits);
        self
    }
}

#[async_trait]
impl JsonTransport for FakeAlgolia {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let requests = body["requests"].as_array().cloned().unwrap_or_default();
        self.calls.lock().unwrap().push((path.to_string(), requests.clone()));
        if self.fail {
            return Err(Error::Backend { status: 503, message: "unreachable".into() });
        }
        let results: Vec<Value> = requests
            .iter()
            .map(|r| {
                let index = r["indexName"].as_str().unwrap_or_default();
                json!({ "index": index, "hits": self.hits.get(index).cloned().unwrap_or(json!([])) })
            })
            .collect();
        Ok(json!({ "results": results }))
    }
}

fn provider(transport: FakeAlgolia, config: Config) -> Algolia<FakeAlgolia> {
    Algolia::new(AlgoliaClient::with_transport(transport), config)
}

fn calls(p: &Algolia<FakeAlgolia>) -> Vec<(String, Vec<Value>)> {
    p.client().transport().calls.lock().unwrap().clone()
}

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn ids(hits: &[Hit]) -> Vec<&str> {
    hits.iter().filter_map(|h| h.get("objectID").and_then(Value::as_str)).collect()
}

fn docs(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| json!({ "objectID": id })).collect())
}

fn settings_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("articles.settings.json"),
        r#"{
            "searchableAttributes": ["title,subtitle", "unordered(body)"],
            "attributesForFaceting": ["searchable(author)", "filterOnly(year)"],
            "attributeForDistinct": "slug"
        }"#,
    )
    .unwrap();
    tmp
}

fn with_schema(transport: FakeAlgolia, dir: &TempDir) -> Algolia<FakeAlgolia> {
    provider(transport, Config::default())
        .with_schema(SchemaCache::new(BackendFamily::Algolia, Some(dir.path().to_path_buf())))
}

#[tokio::test]
async fn search_sends_one_request_with_params_merged() {
    let p = provider(FakeAlgolia::default().index("articles", docs(&["1", "2"])), Config::default());

    let hits = p.search("articles", "rust", &fields(json!({"hitsPerPage": 5, "filters": "year > 2000"})), 50).await.unwrap();

    assert_eq!(ids(&hits), vec!["1", "2"]);
    let (path, requests) = &calls(&p)[0];
    assert_eq!(path, "/1/indexes/*/queries");
    assert_eq!(
        requests,
        &vec![json!({"indexName": "articles", "query": "rust", "hitsPerPage": 5, "filters": "year > 2000"})]
    );
}

#[tokio::test]
async fn network_failure_yields_empty_list() {
    let p = provider(FakeAlgolia { fail: true, ..Default::default() }, Config::default());
    assert!(p.search("articles", "rust", &Fields::new(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_applies_neural_score_floor() {
    let transport = FakeAlgolia::default().index(
        "articles",
        json!([
            {"objectID": "a", "_rankingInfo": {"neuralScore": 0.9}},
            {"objectID": "b", "_rankingInfo": {"neuralScore": 0.4}},
            {"objectID": "c", "_rankingInfo": {"neuralScore": 0.7}},
            {"objectID": "d"}
        ]),
    );
    let p = provider(transport, Config::from_toml_str("minimum_ranking_score = 0.5").unwrap());

    let hits = p.search("articles", "", &fields(json!({"getRankingInfo": true})), 10).await.unwrap();

    assert_eq!(ids(&hits), vec!["a", "c"]);
}

#[tokio::test]
async fn multi_search_applies_shared_defaults_and_blends() {
    let transport = FakeAlgolia::default()
        .index("products", docs(&["A", "B"]))
        .index("articles", docs(&["X", "Y"]));
    let p = provider(transport, Config::default());
    let federation: FederationSpec = serde_json::from_value(json!({
        "limit": 3,
        "weights": {"products": 2.0},
        "attributesToRetrieve": ["title"]
    }))
    .unwrap();
    let queries = vec![
        fields(json!({"indexUid": "products", "term": "boots"})),
        fields(json!({"q": "no index"})),
        fields(json!({"index": "articles", "hitsPerPage": 1, "attributesToRetrieve": ["body"]})),
    ];

    let hits = p.multi_search(&queries, "shared", &federation, 10).await.unwrap();

    assert_eq!(ids(&hits), vec!["A", "B", "X"]);
    let (_, requests) = &calls(&p)[0];
    assert_eq!(
        requests,
        &vec![
            json!({"indexName": "products", "query": "boots", "attributesToRetrieve": ["title"], "hitsPerPage": 3}),
            json!({"indexName": "articles", "query": "shared", "hitsPerPage": 1, "attributesToRetrieve": ["body"]}),
        ]
    );
}

#[tokio::test]
async fn multi_search_without_indexes_makes_no_call() {
    let p = provider(FakeAlgolia::default(), Config::default());
    let hits = p.multi_search(&[fields(json!({"query": "x"}))], "", &FederationSpec::default(), 10).await.unwrap();
    assert!(hits.is_empty());
    assert!(calls(&p).is_empty());
}

#[tokio::test]
async fn declarative_search_builds_algolia_request() {
    let dir = settings_dir();
    let p = with_schema(FakeAlgolia::default(), &dir);

    p.search_from_json(&json!({
        "indexName": "articles",
        "query": "rust",
        "filters": [
            {"type": "gt", "field": "year", "value": 2000},
            {"type": "or", "conditions": [
                {"type": "equal", "field": "author", "value": "ada"},
                {"type": "identifier", "id": "7"}
            ]},
            {"type": "geo_distance", "lat": 1, "lng": 2, "distance": 300}
        ],
        "sort": {"year": "desc"},
        "limit": 5,
        "highlight": {"fields": ["title"], "preTag": "<em>", "postTag": "</em>"},
        "distinct": "slug",
        "facets": [{"type": "count", "field": "author"}],
        "showRankingScore": true
    }))
    .await
    .unwrap();

    let (_, requests) = &calls(&p)[0];
    assert_eq!(
        requests[0],
        json!({
            "indexName": "articles__year_desc",
            "query": "rust",
            "filters": "year > 2000 AND (author:\"ada\" OR objectID:\"7\")",
            "aroundLatLng": "1, 2",
            "aroundRadius": 300,
            "hitsPerPage": 5,
            "attributesToHighlight": ["title"],
            "highlightPreTag": "<em>",
            "highlightPostTag": "</em>",
            "distinct": true,
            "facets": ["author"],
            "getRankingInfo": true
        })
    );
}

#[tokio::test]
async fn geo_inside_group_fails_the_request() {
    let dir = settings_dir();
    let p = with_schema(FakeAlgolia::default(), &dir);
    let err = p
        .search_from_json(&json!({
            "index": "articles",
            "filters": [{"type": "or", "conditions": [
                {"type": "geo_bounding_box", "north": 1, "east": 2, "south": 3, "west": 4}
            ]}]
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedCondition { backend: "algolia", .. }));
    assert!(calls(&p).is_empty());
}

#[tokio::test]
async fn raw_filter_string_bypasses_compiler() {
    let dir = settings_dir();
    let p = with_schema(FakeAlgolia::default(), &dir);

    p.search_from_json(&json!({
        "index": "articles",
        "q": "rust",
        "filter": "year > 2000",
        "numericFilters": ["likes > 3"],
        "offset": 20,
        "limit": 10
    }))
    .await
    .unwrap();

    let (_, requests) = &calls(&p)[0];
    assert_eq!(
        requests[0],
        json!({
            "indexName": "articles",
            "query": "rust",
            "offset": 20,
            "length": 10,
            "filters": "year > 2000",
            "numericFilters": ["likes > 3"]
        })
    );
}

#[tokio::test]
async fn multi_search_from_json_blends_declarative_entries() {
    let dir = settings_dir();
    let transport = FakeAlgolia::default().index("articles", docs(&["X", "Y", "Z"]));
    let p = with_schema(transport, &dir);

    let hits = p
        .multi_search_from_json(&json!({
            "query": "rust",
            "queries": [{"indexName": "articles", "limit": 2}, {"q": "lost"}],
            "federation": {"limit": 2}
        }))
        .await
        .unwrap();

    assert_eq!(ids(&hits), vec!["X", "Y"]);
    let sent = calls(&p);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1[0]["hitsPerPage"], json!(2));
    assert_eq!(sent[0].1[0]["query"], json!("rust"));
}

#[tokio::test]
async fn missing_schema_short_circuits_escape_hatch() {
    let p = provider(FakeAlgolia::default(), Config::default());
    let hits = p.search_from_json(&json!({"index": "articles", "filters": "year > 2000"})).await.unwrap();
    assert!(hits.is_empty());
    assert!(calls(&p).is_empty());
}

#[tokio::test]
async fn vector_is_dropped_from_algolia_requests() {
    let dir = settings_dir();
    let p = with_schema(FakeAlgolia::default(), &dir);

    p.search_from_json(&json!({"index": "articles", "q": "x", "vector": [0.1, 0.2]})).await.unwrap();

    let (_, requests) = &calls(&p)[0];
    assert_eq!(requests[0], json!({"indexName": "articles", "query": "x"}));
}

#[tokio::test]
async fn multi_search_floors_only_entries_asking_for_scores() {
    let transport = FakeAlgolia::default()
        .index(
            "products",
            json!([
                {"objectID": "A", "_rankingInfo": {"neuralScore": 0.9}},
                {"objectID": "B", "_rankingInfo": {"neuralScore": 0.2}}
            ]),
        )
        .index("articles", json!([{"objectID": "X"}, {"objectID": "Y"}]));
    let p = provider(transport, Config::from_toml_str("minimum_ranking_score = 0.5").unwrap());
    let queries = vec![
        fields(json!({"index": "products", "getRankingInfo": true})),
        fields(json!({"index": "articles"})),
    ];

    let hits = p.multi_search(&queries, "", &FederationSpec::default(), 10).await.unwrap();

    assert_eq!(ids(&hits), vec!["A", "X", "Y"]);
}

/// Keeps only hits whose `objectID` starts with the query.
struct PrefixOnly;

impl RelevanceFilter for PrefixOnly {
    fn filter(&self, query: &str, hits: Vec<Hit>) -> Vec<Hit> {
        hits.into_iter()
            .filter(|h| h.get("objectID").and_then(Value::as_str).is_some_and(|id| id.starts_with(query)))
            .collect()
    }
}

#[tokio::test]
async fn custom_relevance_filter_post_processes_blended_hits() {
    let transport = FakeAlgolia::default()
        .index("products", docs(&["ab", "cd"]))
        .index("articles", docs(&["ax", "zz"]));
    let config = Config::from_toml_str("enable_advanced_search = true").unwrap();
    let p = provider(transport, config).with_relevance(Arc::new(PrefixOnly));
    let queries = vec![fields(json!({"index": "products"})), fields(json!({"index": "articles"}))];

    let hits = p.multi_search(&queries, "a", &FederationSpec::default(), 10).await.unwrap();

    assert_eq!(ids(&hits), vec!["ab", "ax"]);
}
