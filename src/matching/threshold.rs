// src/matching/threshold.rs
use rayon::prelude::*;

use crate::error::{LinkageError, Result};
use crate::matching::matcher::Matcher;
use crate::models::Dataset;
use crate::utils::progress_bars::logging::{PhaseLogger, Stage};

/// The chosen cutoff and what it achieves on the calibration set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdChoice {
    pub threshold: f64,
    pub f_score: f64,
    pub precision: f64,
    pub recall: f64,
}

fn f_beta(precision: f64, recall: f64, beta: f64) -> f64 {
    let b2 = beta * beta;
    let denom = b2 * precision + recall;
    if denom == 0.0 {
        0.0
    } else {
        (1.0 + b2) * precision * recall / denom
    }
}

/// Sweeps cutoffs over `(score, weight)` points, where weight is the
/// probability that the point is a true match. Ties in F keep the higher cutoff.
/// Candidate scores across `domain_sample`, plus the number of records left
/// out for violating the missing-field policy.
fn score_sample(matcher: &Matcher, domain_sample: &Dataset) -> Result<(Vec<f64>, usize)> {
    let records: Vec<_> = domain_sample.records().collect();
    let per_record: Vec<Result<Option<Vec<f64>>>> = records
        .par_iter()
        .map(|record| match matcher.score_candidates(record) {
            Ok(scored) => Ok(Some(scored.into_iter().map(|(_, s)| s).collect())),
            Err(e) if e.is_per_record() => Ok(None),
            Err(e) => Err(e),
        })
        .collect();
    let mut scores = Vec::new();
    let mut excluded = 0;
    for r in per_record {
        match r? {
            Some(record_scores) => scores.extend(record_scores),
            None => excluded += 1,
        }
    }
    Ok((scores, excluded))
}

fn sweep(mut points: Vec<(f64, f64)>, recall_weight: f64) -> Result<ThresholdChoice> {
    if !(recall_weight > 0.0 && recall_weight.is_finite()) {
        return Err(LinkageError::Configuration(format!(
            "recall weight must be positive, got {}",
            recall_weight
        )));
    }
    if points.is_empty() {
        return Err(LinkageError::InsufficientData(
            "no scored candidate pairs to calibrate a threshold on".to_string(),
        ));
    }
    let total_true: f64 = points.iter().map(|(_, w)| w).sum();
    if total_true <= 0.0 {
        return Err(LinkageError::InsufficientData(
            "calibration set contains no matches".to_string(),
        ));
    }

    points.sort_by(|a, b| b.0.total_cmp(&a.0));
    let mut best: Option<ThresholdChoice> = None;
    let mut true_above = 0.0;
    let mut count_above = 0usize;
    let mut i = 0;
    while i < points.len() {
        let cutoff = points[i].0;
        // A cutoff admits every point with an equal score.
        while i < points.len() && points[i].0 == cutoff {
            true_above += points[i].1;
            count_above += 1;
            i += 1;
        }
        let precision = true_above / count_above as f64;
        let recall = (true_above / total_true).min(1.0);
        let f_score = f_beta(precision, recall, recall_weight);
        if best.map_or(true, |b| f_score > b.f_score) {
            best = Some(ThresholdChoice {
                threshold: cutoff,
                f_score,
                precision,
                recall,
            });
        }
    }
    best.ok_or_else(|| LinkageError::InsufficientData("no cutoff evaluated".to_string()))
}

/// Picks the score cutoff maximizing F-beta with `beta = recall_weight`.
pub struct ThresholdSelector;

impl ThresholdSelector {
    /// Scores every blocked candidate of `domain_sample` and treats the
    /// scores themselves as match probabilities: expected precision above a
    /// cutoff is the mean score there, expected recall the share of the total
    /// score mass there.
    pub fn select(
        matcher: &Matcher,
        domain_sample: &Dataset,
        recall_weight: f64,
    ) -> Result<ThresholdChoice> {
        let logger = PhaseLogger::new(Stage::Threshold);
        logger.log_start(&format!(
            "{} domain records, recall weight {}",
            domain_sample.len(),
            recall_weight
        ));

        let (scores, excluded) = score_sample(matcher, domain_sample)?;
        logger.log_excluded(excluded, domain_sample.len());
        logger.log_phase("Candidates scored", Some(&format!("{} pairs", scores.len())));

        let choice = Self::select_scored(&scores, recall_weight)?;
        logger.log_completion(&format!(
            "threshold {:.4} (expected precision {:.3}, recall {:.3})",
            choice.threshold, choice.precision, choice.recall
        ));
        Ok(choice)
    }

    /// Soft-label sweep over raw match probabilities.
    pub fn select_scored(scores: &[f64], recall_weight: f64) -> Result<ThresholdChoice> {
        sweep(scores.iter().map(|&s| (s, s)).collect(), recall_weight)
    }

    /// Sweep over scores with known ground truth.
    pub fn select_labeled(scored: &[(f64, bool)], recall_weight: f64) -> Result<ThresholdChoice> {
        sweep(
            scored
                .iter()
                .map(|&(s, is_match)| (s, if is_match { 1.0 } else { 0.0 }))
                .collect(),
            recall_weight,
        )
    }
}
