//! Weighted reciprocal-rank blending of per-index hit lists.

use std::cmp::Ordering;

use fedsearch_core::{FederationSpec, Hit};

/// One index's hits in backend rank order (position 0 is best).
#[derive(Debug, Clone, Default)]
pub struct RankedPool {
    pub index: String,
    pub hits: Vec<Hit>,
}

impl RankedPool {
    pub fn new(index: impl Into<String>, hits: Vec<Hit>) -> Self {
        Self { index: index.into(), hits }
    }
}

pub fn reciprocal_rank_score(weight: f64, rank: usize) -> f64 {
    weight / (rank as f64 + 1.0)
}

/// Score every hit by `weight / (rank + 1)`, merge the pools in iteration
/// order and return one page sorted by descending score.
///
/// The sort is stable, so equal scores keep pool order and then rank order.
/// Page size is the federation limit, else `fallback_limit`.
pub fn blend(pools: Vec<RankedPool>, federation: &FederationSpec, fallback_limit: usize) -> Vec<Hit> {
    let mut merged: Vec<Hit> = Vec::with_capacity(pools.iter().map(|p| p.hits.len()).sum());
    for pool in pools {
        let weight = federation.weight(&pool.index);
        for (rank, mut hit) in pool.hits.into_iter().enumerate() {
            hit.set_score(reciprocal_rank_score(weight, rank));
            merged.push(hit);
        }
    }

    merged.sort_by(|a, b| {
        let (a, b) = (a.score.unwrap_or_default(), b.score.unwrap_or_default());
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    });

    merged
        .into_iter()
        .skip(federation.offset.unwrap_or(0))
        .take(federation.page_size(fallback_limit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str) -> Hit {
        Hit::from_value(json!({ "id": id })).unwrap()
    }

    fn ids(hits: &[Hit]) -> Vec<&str> {
        hits.iter().filter_map(|h| h.get("id").and_then(|v| v.as_str())).collect()
    }

    #[test]
    fn score_is_weight_over_rank() {
        assert_eq!(reciprocal_rank_score(1.0, 0), 1.0);
        assert_eq!(reciprocal_rank_score(2.0, 1), 1.0);
        assert_eq!(reciprocal_rank_score(1.0, 3), 0.25);
    }

    #[test]
    fn weighted_pools_interleave_with_stable_ties() {
        let mut federation = FederationSpec { limit: Some(3), ..Default::default() };
        federation.weights.insert("products".into(), 2.0);
        let pools = vec![
            RankedPool::new("products", vec![hit("A"), hit("B")]),
            RankedPool::new("articles", vec![hit("X"), hit("Y")]),
        ];

        let out = blend(pools, &federation, 10);

        assert_eq!(ids(&out), vec!["A", "B", "X"]);
        let scores: Vec<f64> = out.iter().filter_map(|h| h.score).collect();
        assert_eq!(scores, vec![2.0, 1.0, 1.0]);
    }

    #[test]
    fn caller_limit_applies_without_federation_limit() {
        let pools = vec![
            RankedPool::new("a", vec![hit("1"), hit("2"), hit("3")]),
            RankedPool::new("b", vec![hit("4")]),
        ];
        let out = blend(pools, &FederationSpec::default(), 2);
        assert_eq!(ids(&out), vec!["1", "4"]);
    }

    #[test]
    fn offset_skips_into_the_blended_list() {
        let federation = FederationSpec { offset: Some(1), limit: Some(2), ..Default::default() };
        let pools = vec![RankedPool::new("a", vec![hit("1"), hit("2"), hit("3")])];
        assert_eq!(ids(&blend(pools, &federation, 10)), vec!["2", "3"]);
    }

    #[test]
    fn scores_never_increase() {
        let pools = vec![
            RankedPool::new("a", (0..5).map(|i| hit(&format!("a{i}"))).collect()),
            RankedPool::new("b", (0..7).map(|i| hit(&format!("b{i}"))).collect()),
            RankedPool::new("c", Vec::new()),
        ];
        let out = blend(pools, &FederationSpec::default(), 100);
        assert_eq!(out.len(), 12);
        assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
