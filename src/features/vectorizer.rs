// src/features/vectorizer.rs
use log::debug;
use rayon::prelude::*;
use sha2::{Digest, Sha256};

use crate::comparators::FieldSpec;
use crate::error::{LinkageError, Result};
use crate::features::feature_cache::SharedFeatureCache;
use crate::models::{CandidatePair, Dataset, Record};

/// Applies every field comparator to a record pair and concatenates the
/// results in field order.
#[derive(Debug, Clone)]
pub struct FeatureVectorizer {
    fields: Vec<FieldSpec>,
    fingerprint: String,
}

impl FeatureVectorizer {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        if fields.is_empty() {
            return Err(LinkageError::Configuration(
                "at least one field must be compared".to_string(),
            ));
        }
        let mut hasher = Sha256::new();
        for field in &fields {
            field.hash_into(&mut hasher);
        }
        let fingerprint = hex::encode(hasher.finalize());
        Ok(Self {
            fields,
            fingerprint,
        })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn dimension(&self) -> usize {
        self.fields.iter().map(FieldSpec::dimension).sum()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.fields.iter().flat_map(FieldSpec::feature_names).collect()
    }

    /// Identifies the field configuration. A model is only valid for the
    /// fingerprint it was trained under.
    pub fn config_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn vectorize(&self, a: &Record, b: &Record) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.dimension());
        for field in &self.fields {
            field.compare_into(a.value(&field.field), b.value(&field.field), &mut out);
        }
        out
    }

    /// Mean of the per-field similarity components, ignoring missing indicators.
    pub fn mean_similarity(&self, features: &[f64]) -> f64 {
        let mut offset = 0;
        let mut total = 0.0;
        for field in &self.fields {
            total += features.get(offset).copied().unwrap_or(0.0);
            offset += field.dimension();
        }
        total / self.fields.len() as f64
    }

    /// Fails with `MissingField` when either record violates the missing-field policy.
    pub fn admits(&self, a: &Record, b: &Record) -> Result<()> {
        for field in &self.fields {
            field.check_record(a)?;
            field.check_record(b)?;
        }
        Ok(())
    }

    /// Vectorizes an admitted pair, serving it from `cache` when the pair was
    /// vectorized before. Pairs violating the missing-field policy fail before
    /// the cache is consulted.
    ///
    /// Entries are keyed by record ids, so a cache must only ever serve one
    /// domain/range dataset combination.
    pub fn vectorize_cached(
        &self,
        pair: &CandidatePair,
        a: &Record,
        b: &Record,
        cache: &SharedFeatureCache,
    ) -> Result<Vec<f64>> {
        self.admits(a, b)?;
        let cached = cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(pair);
        if let Some(features) = cached {
            return Ok(features);
        }
        let features = self.vectorize(a, b);
        cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .put(pair, features.clone());
        Ok(features)
    }

    /// Vectorizes pairs in parallel, keeping input order. Pairs whose records
    /// are unknown or violate the missing-field policy are dropped; the second
    /// value is how many were.
    pub fn vectorize_pairs(
        &self,
        pairs: &[CandidatePair],
        domain: &Dataset,
        range: &Dataset,
        cache: &SharedFeatureCache,
    ) -> (Vec<(CandidatePair, Vec<f64>)>, usize) {
        let results: Vec<Option<(CandidatePair, Vec<f64>)>> = pairs
            .par_iter()
            .map(|pair| {
                let a = domain.get(&pair.domain_id)?;
                let b = range.get(&pair.range_id)?;
                match self.vectorize_cached(pair, a, b, cache) {
                    Ok(features) => Some((pair.clone(), features)),
                    Err(e) => {
                        debug!("Dropping pair {}: {}", pair.key(), e);
                        None
                    }
                }
            })
            .collect();
        let excluded = results.iter().filter(|r| r.is_none()).count();
        (results.into_iter().flatten().collect(), excluded)
    }
}
