//! Caller vocabulary normalization.
//!
//! Different engines name the same concept differently (`indexUid` on
//! Meilisearch, `indexName` on Algolia). Every lookup of those aliases goes
//! through this module; an empty string means "missing" and the caller decides
//! what to do about it.

use serde_json::Value;

use crate::types::Fields;

pub const INDEX_KEYS: [&str; 3] = ["index", "indexName", "indexUid"];
pub const QUERY_KEYS: [&str; 3] = ["term", "query", "q"];
pub const RANKING_SCORE_KEYS: [&str; 2] = ["showRankingScore", "getRankingInfo"];

/// First present of `index`, `indexName`, `indexUid`.
pub fn resolve_index_name(params: &Fields) -> String {
    first_present(params, &INDEX_KEYS)
}

/// First present of `term`, `query`, `q`.
pub fn resolve_query_text(params: &Fields) -> String {
    first_present(params, &QUERY_KEYS)
}

/// Whether the caller asked for ranking scores (`showRankingScore` or `getRankingInfo`).
pub fn resolve_show_ranking_score(params: &Fields) -> bool {
    RANKING_SCORE_KEYS
        .iter()
        .find_map(|key| params.get(*key).filter(|v| !v.is_null()))
        .is_some_and(truthy)
}

/// Drop every alias in `keys` from `params`.
pub fn strip_aliases(params: &mut Fields, keys: &[&str]) {
    for key in keys {
        params.remove(*key);
    }
}

fn first_present(params: &Fields, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match params.get(*key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[test]
    fn each_index_alias_resolves_alone() {
        for key in INDEX_KEYS {
            let p = params(json!({ key: "products" }));
            assert_eq!(resolve_index_name(&p), "products", "alias {key}");
        }
    }

    #[test]
    fn index_alias_precedence() {
        let p = params(json!({"indexUid": "c", "indexName": "b", "index": "a"}));
        assert_eq!(resolve_index_name(&p), "a");
        let p = params(json!({"indexUid": "c", "indexName": "b"}));
        assert_eq!(resolve_index_name(&p), "b");
    }

    #[test]
    fn missing_values_resolve_to_empty() {
        let p = params(json!({"limit": 5, "index": null}));
        assert_eq!(resolve_index_name(&p), "");
        assert_eq!(resolve_query_text(&p), "");
    }

    #[test]
    fn query_alias_precedence() {
        let p = params(json!({"q": "third", "query": "second", "term": "first"}));
        assert_eq!(resolve_query_text(&p), "first");
        let p = params(json!({"q": "third"}));
        assert_eq!(resolve_query_text(&p), "third");
    }

    #[test]
    fn ranking_score_flag_accepts_both_vocabularies() {
        assert!(resolve_show_ranking_score(&params(json!({"showRankingScore": true}))));
        assert!(resolve_show_ranking_score(&params(json!({"getRankingInfo": 1}))));
        assert!(!resolve_show_ranking_score(&params(json!({"getRankingInfo": false}))));
        assert!(!resolve_show_ranking_score(&Fields::new()));
    }
}
