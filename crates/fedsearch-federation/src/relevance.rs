use serde_json::Value;

use fedsearch_core::{Config, Hit, RelevanceFilter};

/// Drops hits whose canonical ranking score falls below a configured minimum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RankingFloor {
    pub minimum: f64,
}

impl RankingFloor {
    pub fn new(minimum: f64) -> Self {
        Self { minimum }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.minimum_ranking_score())
    }

    /// Active only when scores were requested and the minimum is positive.
    /// A hit without a ranking score counts as zero.
    pub fn apply(&self, mut hits: Vec<Hit>, show_ranking_score: bool) -> Vec<Hit> {
        hits.retain(|hit| self.admits(hit, show_ranking_score));
        hits
    }

    pub fn admits(&self, hit: &Hit, show_ranking_score: bool) -> bool {
        !show_ranking_score || self.minimum <= 0.0 || hit.ranking_score.unwrap_or(0.0) >= self.minimum
    }
}

/// Keeps hits whose string fields share at least one term with the query,
/// re-ranked by the number of matching terms. Ties keep backend order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapFilter;

impl TermOverlapFilter {
    fn overlap(terms: &[String], hit: &Hit) -> usize {
        let mut text = String::new();
        for value in hit.fields.values() {
            collect_text(value, &mut text);
        }
        let text = text.to_lowercase();
        terms.iter().filter(|t| text.contains(t.as_str())).count()
    }
}

impl RelevanceFilter for TermOverlapFilter {
    fn filter(&self, query: &str, hits: Vec<Hit>) -> Vec<Hit> {
        let query_lower = query.to_lowercase();
        let terms: Vec<String> = query_lower.split_whitespace().map(str::to_string).collect();
        if terms.is_empty() {
            return hits;
        }

        let mut scored: Vec<(usize, Hit)> = hits
            .into_iter()
            .map(|hit| (Self::overlap(&terms, &hit), hit))
            .filter(|(overlap, _)| *overlap > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, hit)| hit).collect()
    }
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}

/// Shared post-processing for adapter results: ranking floor, then the
/// relevance filter when advanced search is enabled and there is query text.
pub fn post_process(
    config: &Config,
    relevance: &dyn RelevanceFilter,
    query: &str,
    hits: Vec<Hit>,
    show_ranking_score: bool,
) -> Vec<Hit> {
    let hits = RankingFloor::from_config(config).apply(hits, show_ranking_score);
    if config.advanced_search_enabled() && !query.trim().is_empty() {
        relevance.filter(query, hits)
    } else {
        hits
    }
}
