// src/models/stats_models.rs
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BlockingStats {
    pub records_indexed: usize,
    pub records_queried: usize,
    pub records_excluded: usize,
    pub block_keys: usize,
    pub candidate_pairs: usize,
}

/// Summary of one matching run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchRunStats {
    pub domain_records: usize,
    pub records_excluded: usize,
    pub records_with_candidates: usize,
    pub records_linked: usize,
    pub candidates_scored: usize,
    pub avg_top_score: f64,
}

impl MatchRunStats {
    pub fn link_rate(&self) -> f64 {
        if self.domain_records == 0 {
            0.0
        } else {
            self.records_linked as f64 / self.domain_records as f64
        }
    }
}
