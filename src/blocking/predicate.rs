// src/blocking/predicate.rs
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

use crate::comparators::FieldSpec;
use crate::models::Record;
use crate::utils::constants::{PREFIX_LENGTHS, TOKEN_NGRAM_SIZES};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateKind {
    /// The whole value as one key.
    WholeField,
    /// One key per whitespace token.
    Token,
    /// The first `k` characters. Shorter values yield themselves.
    FirstChars { k: usize },
    /// Windows of `n` over the sorted distinct tokens.
    SortedTokenNgram { n: usize },
}

/// A deterministic rule turning one field value into block keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    #[serde(flatten)]
    pub kind: PredicateKind,
}

impl Predicate {
    pub fn new(field: &str, kind: PredicateKind) -> Self {
        Self {
            field: field.to_string(),
            kind,
        }
    }

    pub fn apply(&self, value: &str) -> BTreeSet<String> {
        let value = value.trim();
        let mut keys = BTreeSet::new();
        if value.is_empty() {
            return keys;
        }
        match self.kind {
            PredicateKind::WholeField => {
                keys.insert(value.to_string());
            }
            PredicateKind::Token => {
                keys.extend(value.split_whitespace().map(str::to_string));
            }
            PredicateKind::FirstChars { k } => {
                keys.insert(value.chars().take(k).collect());
            }
            PredicateKind::SortedTokenNgram { n } => {
                let tokens: Vec<&str> = value
                    .split_whitespace()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                if n == 0 || tokens.len() < n {
                    keys.insert(tokens.join(" "));
                } else {
                    keys.extend(tokens.windows(n).map(|w| w.join(" ")));
                }
            }
        }
        keys
    }

    /// Keys for a record. A missing value produces no keys.
    pub fn keys_for(&self, record: &Record) -> BTreeSet<String> {
        record
            .value(&self.field)
            .map(|v| self.apply(v))
            .unwrap_or_default()
    }

    /// True when the two records share at least one key under this predicate.
    pub fn covers(&self, a: &Record, b: &Record) -> bool {
        let keys_a = self.keys_for(a);
        !keys_a.is_empty() && !keys_a.is_disjoint(&self.keys_for(b))
    }

    /// Set used before any predicates have been learned: one token predicate per field.
    pub fn default_set(fields: &[FieldSpec]) -> Vec<Predicate> {
        distinct_fields(fields)
            .into_iter()
            .map(|f| Predicate::new(f, PredicateKind::Token))
            .collect()
    }

    /// Every predicate the learner may choose from, in a fixed order.
    pub fn candidate_pool(fields: &[FieldSpec]) -> Vec<Predicate> {
        let mut pool = Vec::new();
        for field in distinct_fields(fields) {
            pool.push(Predicate::new(field, PredicateKind::WholeField));
            pool.push(Predicate::new(field, PredicateKind::Token));
            for k in PREFIX_LENGTHS {
                pool.push(Predicate::new(field, PredicateKind::FirstChars { k }));
            }
            for n in TOKEN_NGRAM_SIZES {
                pool.push(Predicate::new(field, PredicateKind::SortedTokenNgram { n }));
            }
        }
        pool
    }

    /// SHA-256 over an ordered predicate set.
    pub fn fingerprint(predicates: &[Predicate]) -> String {
        let mut hasher = Sha256::new();
        for p in predicates {
            hasher.update(p.to_string().as_bytes());
            hasher.update([0x1e]);
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PredicateKind::WholeField => write!(f, "whole_field({})", self.field),
            PredicateKind::Token => write!(f, "token({})", self.field),
            PredicateKind::FirstChars { k } => write!(f, "first_{}_chars({})", k, self.field),
            PredicateKind::SortedTokenNgram { n } => {
                write!(f, "sorted_token_{}gram({})", n, self.field)
            }
        }
    }
}

fn distinct_fields(fields: &[FieldSpec]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    fields
        .iter()
        .map(|f| f.field.as_str())
        .filter(|f| seen.insert(*f))
        .collect()
}
