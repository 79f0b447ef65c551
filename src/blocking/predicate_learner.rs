// src/blocking/predicate_learner.rs
use rayon::prelude::*;
use std::collections::BTreeSet;

use crate::blocking::blocker::Blocker;
use crate::blocking::predicate::Predicate;
use crate::comparators::FieldSpec;
use crate::models::{Dataset, Record};
use crate::utils::config::LearnerConfig;
use crate::utils::progress_bars::logging::{PhaseLogger, Stage};

/// How one pool predicate behaves on the labeled matches and the calibration sample.
#[derive(Debug, Clone)]
pub struct PredicateScore {
    pub predicate: Predicate,
    /// Indices into the labeled matches this predicate puts in a shared block.
    pub matches_covered: BTreeSet<usize>,
    /// Distinct sample pairs the predicate's blocks would generate.
    pub distinct_pairs: usize,
    /// `distinct_pairs` as a share of the sample cross product.
    pub coverage: f64,
}

/// Chooses the active predicate set from labeled matches.
#[derive(Debug, Clone)]
pub struct PredicateLearner {
    pool: Vec<Predicate>,
    max_predicates: usize,
    max_block_coverage: f64,
}

impl PredicateLearner {
    pub fn new(fields: &[FieldSpec], config: &LearnerConfig) -> Self {
        Self {
            pool: Predicate::candidate_pool(fields),
            max_predicates: config.max_predicates.max(1),
            max_block_coverage: config.max_block_coverage,
        }
    }

    pub fn pool(&self) -> &[Predicate] {
        &self.pool
    }

    pub fn score_pool(
        &self,
        matches: &[(&Record, &Record)],
        domain_sample: &Dataset,
        range_sample: &Dataset,
        fields: &[FieldSpec],
    ) -> Vec<PredicateScore> {
        let cross_product = (domain_sample.len() * range_sample.len()) as f64;
        self.pool
            .par_iter()
            .map(|predicate| {
                let matches_covered = matches
                    .iter()
                    .enumerate()
                    .filter(|(_, (d, r))| predicate.covers(d, r))
                    .map(|(i, _)| i)
                    .collect();

                let blocker = Blocker::new(vec![predicate.clone()], fields);
                let index = blocker.index(range_sample);
                let distinct_pairs: usize = domain_sample
                    .records()
                    .filter(|r| blocker.admits(r).is_ok())
                    .map(|r| blocker.candidates_for(&index, r).len())
                    .sum();
                let coverage = if cross_product > 0.0 {
                    distinct_pairs as f64 / cross_product
                } else {
                    0.0
                };

                PredicateScore {
                    predicate: predicate.clone(),
                    matches_covered,
                    distinct_pairs,
                    coverage,
                }
            })
            .collect()
    }

    /// Returns the new predicate set, or `None` when there is nothing to learn
    /// from and the current set should stay.
    pub fn learn(
        &self,
        matches: &[(&Record, &Record)],
        domain_sample: &Dataset,
        range_sample: &Dataset,
        fields: &[FieldSpec],
    ) -> Option<Vec<Predicate>> {
        let logger = PhaseLogger::new(Stage::Training);
        if matches.is_empty() {
            logger.log_debug("No labeled matches yet, keeping current predicates");
            return None;
        }

        let scores = self.score_pool(matches, domain_sample, range_sample, fields);
        let survivors: Vec<&PredicateScore> = scores
            .iter()
            .filter(|s| {
                let keep =
                    !s.matches_covered.is_empty() && s.coverage <= self.max_block_coverage;
                if !keep {
                    logger.log_debug(&format!(
                        "Demoted {} (matches={}, coverage={:.3})",
                        s.predicate,
                        s.matches_covered.len(),
                        s.coverage
                    ));
                }
                keep
            })
            .collect();

        let mut uncovered: BTreeSet<usize> = (0..matches.len()).collect();
        let mut chosen: Vec<Predicate> = Vec::new();
        let mut remaining = survivors;

        while !uncovered.is_empty() && chosen.len() < self.max_predicates {
            let mut best: Option<(usize, f64)> = None;
            for (i, s) in remaining.iter().enumerate() {
                let new = s.matches_covered.intersection(&uncovered).count();
                if new == 0 {
                    continue;
                }
                let ratio = new as f64 / (1 + s.distinct_pairs) as f64;
                let better = match best {
                    None => true,
                    Some((j, best_ratio)) => {
                        ratio > best_ratio
                            || (ratio == best_ratio
                                && s.distinct_pairs < remaining[j].distinct_pairs)
                    }
                };
                if better {
                    best = Some((i, ratio));
                }
            }
            let Some((idx, _)) = best else {
                break;
            };
            let picked = remaining.remove(idx);
            for i in &picked.matches_covered {
                uncovered.remove(i);
            }
            chosen.push(picked.predicate.clone());
        }

        if chosen.is_empty() {
            logger.log_warning("No predicate survived demotion, keeping current predicates");
            return None;
        }
        if !uncovered.is_empty() {
            logger.log_warning(&format!(
                "{} of {} labeled matches share no block key under the learned predicates",
                uncovered.len(),
                matches.len()
            ));
        }
        logger.log_phase(
            "Predicates learned",
            Some(
                &chosen
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        );
        Some(chosen)
    }
}
