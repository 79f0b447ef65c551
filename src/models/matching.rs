// src/models/matching.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::core::RecordId;

/// A (domain, range) pair that survived blocking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidatePair {
    pub domain_id: RecordId,
    pub range_id: RecordId,
}

impl CandidatePair {
    pub fn new(domain_id: impl Into<String>, range_id: impl Into<String>) -> Self {
        Self {
            domain_id: domain_id.into(),
            range_id: range_id.into(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.domain_id, self.range_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Match,
    Distinct,
}

impl Label {
    pub fn is_match(self) -> bool {
        self == Label::Match
    }

    pub fn as_target(self) -> f64 {
        match self {
            Label::Match => 1.0,
            Label::Distinct => 0.0,
        }
    }
}

/// One line of the training corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPair {
    pub pair: CandidatePair,
    pub label: Label,
    /// Feature vector at label time, valid for `config_fingerprint` only.
    pub features: Vec<f64>,
    pub config_fingerprint: String,
    pub session_id: Uuid,
    pub labeled_at: DateTime<Utc>,
}

impl LabeledPair {
    pub fn new(
        pair: CandidatePair,
        label: Label,
        features: Vec<f64>,
        config_fingerprint: &str,
        session_id: Uuid,
    ) -> Self {
        Self {
            pair,
            label,
            features,
            config_fingerprint: config_fingerprint.to_string(),
            session_id,
            labeled_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub domain_id: RecordId,
    pub range_id: RecordId,
    pub score: f64,
}

/// All surviving matches of one domain record, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainMatches {
    pub domain_id: RecordId,
    pub matches: Vec<(RecordId, f64)>,
}

impl DomainMatches {
    pub fn into_results(self) -> Vec<MatchResult> {
        let domain_id = self.domain_id;
        self.matches
            .into_iter()
            .map(|(range_id, score)| MatchResult {
                domain_id: domain_id.clone(),
                range_id,
                score,
            })
            .collect()
    }

    pub fn best_score(&self) -> Option<f64> {
        self.matches.first().map(|(_, s)| *s)
    }
}
