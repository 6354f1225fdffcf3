use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use fedsearch_core::normalizer::resolve_index_name;
use fedsearch_core::{Error, FederationSpec, Fields, Hit, Result, SearchProvider};
use fedsearch_federation::{federate, RankingFloor};

/// Serves canned hits per index and records every declarative payload it sees.
#[derive(Default)]
struct CannedProvider {
    hits: HashMap<String, Vec<Hit>>,
    fatal: Option<String>,
    slow: Option<String>,
    seen: Mutex<Vec<Value>>,
}

impl CannedProvider {
    fn with(mut self, index: &str, ids: &[&str]) -> Self {
        let hits = ids.iter().map(|id| Hit::from_value(json!({ "id": id })).unwrap()).collect();
        self.hits.insert(index.to_string(), hits);
        self
    }

    fn scored(mut self, index: &str, scores: &[(&str, f64)]) -> Self {
        let hits = scores
            .iter()
            .map(|(id, s)| Hit::from_value(json!({ "id": id })).unwrap().with_ranking_score(Some(*s)))
            .collect();
        self.hits.insert(index.to_string(), hits);
        self
    }
}

#[async_trait]
impl SearchProvider for CannedProvider {
    type Client = ();

    fn name(&self) -> &'static str {
        "canned"
    }

    fn client(&self) -> &() {
        &()
    }

    async fn search(&self, _index: &str, _query: &str, _params: &Fields, _limit: usize) -> Result<Vec<Hit>> {
        Ok(Vec::new())
    }

    async fn multi_search(&self, _: &[Fields], _: &str, _: &FederationSpec, _: usize) -> Result<Vec<Hit>> {
        Ok(Vec::new())
    }

    async fn search_from_json(&self, payload: &Value) -> Result<Vec<Hit>> {
        self.seen.lock().unwrap().push(payload.clone());
        let index = payload.as_object().map(resolve_index_name).unwrap_or_default();
        if self.fatal.as_deref() == Some(index.as_str()) {
            return Err(Error::UnsupportedCondition { backend: "canned", reason: "nope".into() });
        }
        if self.slow.as_deref() == Some(index.as_str()) {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Ok(self.hits.get(&index).cloned().unwrap_or_default())
    }

    async fn multi_search_from_json(&self, payload: &Value) -> Result<Vec<Hit>> {
        federate(self, payload, 1_000, RankingFloor::default()).await
    }
}

fn ids(hits: &[Hit]) -> Vec<&str> {
    hits.iter().filter_map(|h| h.get("id").and_then(Value::as_str)).collect()
}

#[tokio::test]
async fn products_and_articles_blend_by_weight() {
    let provider = CannedProvider::default().with("products", &["A", "B"]).with("articles", &["X", "Y"]);
    let payload = json!({
        "query": "boots",
        "queries": [{"indexUid": "products"}, {"indexName": "articles"}],
        "federation": {"limit": 3, "weights": {"products": 2.0}}
    });

    let hits = provider.multi_search_from_json(&payload).await.unwrap();

    assert_eq!(ids(&hits), vec!["A", "B", "X"]);
    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|p| p["q"] == json!("boots") && p["limit"] == json!(3)));
}

#[tokio::test]
async fn entries_without_index_are_skipped() {
    let provider = CannedProvider::default().with("products", &["A"]);
    let payload = json!({"queries": [{"q": "lost"}, {"index": "products"}]});

    let hits = provider.multi_search_from_json(&payload).await.unwrap();

    assert_eq!(ids(&hits), vec!["A"]);
    assert_eq!(provider.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_batch_makes_no_calls() {
    let provider = CannedProvider::default();
    let hits = provider.multi_search_from_json(&json!({"queries": [{"q": "x"}]})).await.unwrap();
    assert!(hits.is_empty());
    assert!(provider.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fatal_entry_fails_the_request() {
    let provider = CannedProvider { fatal: Some("articles".into()), ..Default::default() }.with("products", &["A"]);
    let payload = json!({"queries": [{"index": "products"}, {"index": "articles"}]});
    let err = provider.multi_search_from_json(&payload).await.unwrap_err();
    assert!(err.is_request_fatal());
}

#[tokio::test]
async fn slow_entry_times_out_without_cancelling_siblings() {
    let provider = CannedProvider { slow: Some("articles".into()), ..Default::default() }
        .with("products", &["A", "B"])
        .with("articles", &["X"]);
    let payload = json!({"queries": [{"index": "products"}, {"index": "articles"}]});

    let hits = federate(&provider, &payload, 50, RankingFloor::default()).await.unwrap();

    assert_eq!(ids(&hits), vec!["A", "B"]);
}

#[tokio::test]
async fn floor_applies_only_to_entries_requesting_scores() {
    let provider = CannedProvider::default()
        .scored("products", &[("A", 0.9), ("B", 0.4), ("C", 0.7)])
        .scored("articles", &[("X", 0.1), ("Y", 0.2)]);
    let payload = json!({
        "queries": [{"index": "products", "showRankingScore": true}, {"index": "articles"}]
    });

    let hits = federate(&provider, &payload, 1_000, RankingFloor::new(0.5)).await.unwrap();

    assert_eq!(ids(&hits), vec!["A", "X", "C", "Y"]);
}

#[tokio::test]
async fn federation_level_score_flag_floors_every_entry() {
    let provider = CannedProvider::default()
        .scored("products", &[("A", 0.9), ("B", 0.4)])
        .scored("articles", &[("X", 0.1), ("Y", 0.6)]);
    let payload = json!({
        "queries": [{"index": "products"}, {"index": "articles"}],
        "federation": {"showRankingScore": true}
    });

    let hits = federate(&provider, &payload, 1_000, RankingFloor::new(0.5)).await.unwrap();

    assert_eq!(ids(&hits), vec!["A", "Y"]);
}

#[tokio::test]
async fn federation_level_score_flag_is_forwarded_to_entries() {
    let provider = CannedProvider::default().with("products", &["A"]);
    let payload = json!({
        "queries": [{"index": "products"}],
        "federation": {"getRankingInfo": true}
    });

    federate(&provider, &payload, 1_000, RankingFloor::default()).await.unwrap();

    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen[0]["showRankingScore"], json!(true));
}
