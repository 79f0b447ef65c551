// src/blocking/blocker.rs
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::blocking::predicate::Predicate;
use crate::comparators::FieldSpec;
use crate::error::{LinkageError, Result};
use crate::models::{BlockingStats, CandidatePair, Dataset, Record, RecordId};
use crate::utils::progress_bars::logging::{PhaseLogger, Stage};
use crate::utils::progress_bars::progress_callback::ProgressCallback;
use crate::{update_detailed_progress, update_progress};

/// Block key -> sorted record ids, one map per predicate position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    postings: Vec<BTreeMap<String, Vec<RecordId>>>,
    records_indexed: usize,
    records_excluded: usize,
}

impl InvertedIndex {
    pub fn predicate_count(&self) -> usize {
        self.postings.len()
    }

    pub fn records_indexed(&self) -> usize {
        self.records_indexed
    }

    pub fn records_excluded(&self) -> usize {
        self.records_excluded
    }

    pub fn block_key_count(&self) -> usize {
        self.postings.iter().map(BTreeMap::len).sum()
    }

    pub fn lookup(&self, predicate_idx: usize, key: &str) -> &[RecordId] {
        self.postings
            .get(predicate_idx)
            .and_then(|m| m.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Applies an ordered predicate set for candidate generation. Records lacking
/// a field that does not allow missing values are never indexed or queried.
#[derive(Debug, Clone)]
pub struct Blocker {
    predicates: Vec<Predicate>,
    required_fields: Vec<String>,
}

impl Blocker {
    pub fn new(predicates: Vec<Predicate>, fields: &[FieldSpec]) -> Self {
        let required_fields = fields
            .iter()
            .filter(|f| !f.has_missing)
            .map(|f| f.field.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            predicates,
            required_fields,
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Fails with `MissingField` when the record may not take part in blocking.
    pub fn admits(&self, record: &Record) -> Result<()> {
        for field in &self.required_fields {
            if record.value(field).is_none() {
                return Err(LinkageError::MissingField {
                    record_id: record.id.clone(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn index(&self, dataset: &Dataset) -> InvertedIndex {
        let mut postings: Vec<BTreeMap<String, Vec<RecordId>>> =
            vec![BTreeMap::new(); self.predicates.len()];
        let mut records_indexed = 0;
        let mut records_excluded = 0;

        // Dataset iterates in id order, so every posting list comes out sorted.
        for record in dataset.records() {
            if let Err(e) = self.admits(record) {
                debug!("Not indexing record: {}", e);
                records_excluded += 1;
                continue;
            }
            records_indexed += 1;
            for (idx, predicate) in self.predicates.iter().enumerate() {
                for key in predicate.keys_for(record) {
                    postings[idx].entry(key).or_default().push(record.id.clone());
                }
            }
        }

        InvertedIndex {
            postings,
            records_indexed,
            records_excluded,
        }
    }

    /// Ids in `index` sharing at least one block key with `record`.
    pub fn candidates_for(&self, index: &InvertedIndex, record: &Record) -> BTreeSet<RecordId> {
        let mut candidates = BTreeSet::new();
        for (idx, predicate) in self.predicates.iter().enumerate() {
            for key in predicate.keys_for(record) {
                candidates.extend(index.lookup(idx, &key).iter().cloned());
            }
        }
        candidates
    }

    /// Every (domain, range) pair sharing a block key, exactly once, sorted.
    pub fn candidate_pairs(
        &self,
        domain: &Dataset,
        range: &Dataset,
        progress_callback: Option<ProgressCallback>,
    ) -> (Vec<CandidatePair>, BlockingStats) {
        let logger = PhaseLogger::new(Stage::Blocking);
        logger.log_start(&format!(
            "{} predicates, {} domain x {} range records",
            self.predicates.len(),
            domain.len(),
            range.len()
        ));

        update_progress!(progress_callback, "Indexing range records");
        let index = self.index(range);
        logger.log_excluded(index.records_excluded(), range.len());

        let queries: Vec<&Record> = domain.records().collect();
        let total = queries.len();
        update_progress!(progress_callback, "Generating pairs", "querying block keys");

        let per_record: Vec<Option<Vec<CandidatePair>>> = queries
            .par_iter()
            .map(|record| {
                if self.admits(record).is_err() {
                    return None;
                }
                Some(
                    self.candidates_for(&index, record)
                        .into_iter()
                        .map(|range_id| CandidatePair::new(record.id.clone(), range_id))
                        .collect(),
                )
            })
            .collect();

        let domain_excluded = per_record.iter().filter(|r| r.is_none()).count();
        logger.log_excluded(domain_excluded, domain.len());

        let pairs: Vec<CandidatePair> = per_record.into_iter().flatten().flatten().collect();
        update_detailed_progress!(
            progress_callback,
            "Generating pairs",
            total,
            total,
            format!("{} candidate pairs", pairs.len())
        );

        let stats = BlockingStats {
            records_indexed: index.records_indexed(),
            records_queried: total - domain_excluded,
            records_excluded: index.records_excluded() + domain_excluded,
            block_keys: index.block_key_count(),
            candidate_pairs: pairs.len(),
        };
        logger.log_pair_generation(stats.candidate_pairs, stats.records_queried);
        logger.log_completion(&format!(
            "{} pairs from {} block keys",
            stats.candidate_pairs, stats.block_keys
        ));
        (pairs, stats)
    }
}
