//! Result federation: blending per-index hit lists into one ranked page,
//! the ranking-score floor, and the relevance post-filter.

pub mod blend;
pub mod fanout;
pub mod relevance;

pub use blend::{blend, reciprocal_rank_score, RankedPool};
pub use fanout::federate;
pub use relevance::{post_process, RankingFloor, TermOverlapFilter};
