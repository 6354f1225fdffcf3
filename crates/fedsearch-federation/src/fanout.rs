//! Concurrent fan-out for declarative multi-index requests.

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use fedsearch_core::http::with_deadline;
use fedsearch_core::normalizer::{resolve_show_ranking_score, RANKING_SCORE_KEYS};
use fedsearch_core::payload::FederatedPayload;
use fedsearch_core::{Hit, Result, SearchProvider};

use crate::blend::{blend, RankedPool};
use crate::relevance::RankingFloor;

/// Run every entry of a federated payload through `provider.search_from_json`
/// concurrently and blend the per-index results.
///
/// Entries without an index are skipped with a warning. Each call runs under
/// its own `timeout_ms` deadline; a failed or expired call contributes an
/// empty pool. A request-fatal error from any entry fails the whole request
/// once every call has finished.
///
/// The ranking floor applies per entry, to entries that asked for scores
/// themselves or through the federation object.
pub async fn federate<P>(provider: &P, payload: &Value, timeout_ms: u64, floor: RankingFloor) -> Result<Vec<Hit>>
where
    P: SearchProvider + ?Sized,
{
    let federated = FederatedPayload::from_value(payload)?;
    let federation_scores = resolve_show_ranking_score(&federated.federation.extra);

    let mut entries: Vec<(String, Value, bool)> = Vec::with_capacity(federated.queries.len());
    for i in 0..federated.queries.len() {
        match federated.entry(i) {
            Some((index, mut single)) => {
                if federation_scores {
                    request_ranking_score(&mut single);
                }
                let show = single.as_object().is_some_and(resolve_show_ranking_score);
                entries.push((index, single, show));
            }
            None => warn!(backend = provider.name(), position = i, "skipping federated query without an index"),
        }
    }
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let calls = entries
        .iter()
        .map(|(_, single, _)| with_deadline(timeout_ms, provider.search_from_json(single)));
    let results = join_all(calls).await;

    let mut pools = Vec::with_capacity(entries.len());
    for ((index, _, show), result) in entries.into_iter().zip(results) {
        let hits = match result {
            Ok(hits) => floor.apply(hits, show),
            Err(e) if e.is_request_fatal() => return Err(e),
            Err(e) => {
                debug!(backend = provider.name(), index = %index, error = %e, "federated query failed");
                Vec::new()
            }
        };
        pools.push(RankedPool::new(index, hits));
    }

    Ok(blend(pools, &federated.federation, federated.limit()))
}

fn request_ranking_score(single: &mut Value) {
    if let Value::Object(map) = single {
        if RANKING_SCORE_KEYS.iter().all(|k| !map.contains_key(*k)) {
            map.insert(RANKING_SCORE_KEYS[0].to_string(), Value::Bool(true));
        }
    }
}
