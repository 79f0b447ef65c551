// src/matching/matcher.rs
use log::debug;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{LinkageError, Result};
use crate::features::FeatureVectorizer;
use crate::learning::ClassifierModel;
use crate::matching::gazetteer_index::GazetteerIndex;
use crate::models::{Dataset, DomainMatches, MatchRunStats, Record, RecordId};
use crate::settings::TrainedSettings;
use crate::utils::progress_bars::logging::{PhaseLogger, Stage};
use crate::utils::progress_bars::progress_config::ProgressConfig;
use crate::utils::progress_bars::stage_bar;

/// Descending score, then ascending range id.
fn rank(a: &(RecordId, f64), b: &(RecordId, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

/// Scores domain records against a gazetteer index with a trained model.
pub struct Matcher {
    vectorizer: FeatureVectorizer,
    model: ClassifierModel,
    index: Arc<GazetteerIndex>,
}

impl Matcher {
    pub fn new(settings: &TrainedSettings, index: Arc<GazetteerIndex>) -> Result<Self> {
        let vectorizer = settings.vectorizer()?;
        index.verify_settings(settings)?;
        Ok(Self {
            vectorizer,
            model: settings.model.clone(),
            index,
        })
    }

    pub fn index(&self) -> &Arc<GazetteerIndex> {
        &self.index
    }

    fn check_params(threshold: f64, n: usize) -> Result<()> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LinkageError::Configuration(format!(
                "threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if n == 0 {
            return Err(LinkageError::Configuration(
                "at least one match per record must be requested".to_string(),
            ));
        }
        Ok(())
    }

    /// Every blocked candidate of `record` with its score, best first.
    pub fn score_candidates(&self, record: &Record) -> Result<Vec<(RecordId, f64)>> {
        self.index.admits(record)?;
        let range = self.index.range();
        let mut scored = Vec::new();
        for range_id in self.index.candidates(record) {
            let Some(candidate) = range.get(&range_id) else {
                continue;
            };
            if let Err(e) = self.vectorizer.admits(record, candidate) {
                debug!("Skipping candidate: {}", e);
                continue;
            }
            let features = self.vectorizer.vectorize(record, candidate);
            scored.push((range_id, self.model.score(&features)?));
        }
        scored.sort_by(rank);
        Ok(scored)
    }

    /// Top `n` candidates scoring at least `threshold`, or `None` when nothing survives.
    pub fn match_record(
        &self,
        record: &Record,
        threshold: f64,
        n: usize,
    ) -> Result<Option<DomainMatches>> {
        Self::check_params(threshold, n)?;
        let mut scored = self.score_candidates(record)?;
        scored.retain(|(_, score)| *score >= threshold);
        scored.truncate(n);
        if scored.is_empty() {
            return Ok(None);
        }
        Ok(Some(DomainMatches {
            domain_id: record.id.clone(),
            matches: scored,
        }))
    }

    /// Lazily yields matches in domain id order. Records violating the
    /// missing-field policy are skipped and counted on the iterator.
    pub fn matches<'a>(
        &'a self,
        domain: &'a Dataset,
        threshold: f64,
        n: usize,
    ) -> Result<DomainMatchIter<'a>> {
        Self::check_params(threshold, n)?;
        Ok(DomainMatchIter {
            matcher: self,
            records: Box::new(domain.records()),
            threshold,
            n,
            excluded: 0,
        })
    }

    /// Matches every domain record in parallel. Output is in domain id order.
    pub fn match_all(
        &self,
        domain: &Dataset,
        threshold: f64,
        n: usize,
        progress: &ProgressConfig,
    ) -> Result<(Vec<DomainMatches>, MatchRunStats)> {
        Self::check_params(threshold, n)?;
        let logger = PhaseLogger::new(Stage::Matching);
        logger.log_start(&format!(
            "{} domain records, threshold {}, top {}",
            domain.len(),
            threshold,
            n
        ));

        let records: Vec<&Record> = domain.records().collect();
        let pb = stage_bar(progress, records.len() as u64, "🔗", "Matching records...");

        // Ok(None) marks a record excluded by the missing-field policy.
        let outcomes: Vec<Result<Option<(usize, Option<DomainMatches>)>>> = records
            .par_iter()
            .map(|record| {
                let scored = self.score_candidates(record);
                pb.inc(1);
                let mut kept = match scored {
                    Ok(scored) => scored,
                    Err(e) if e.is_per_record() => {
                        debug!("{}", e);
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                };
                let candidates = kept.len();
                kept.retain(|(_, score)| *score >= threshold);
                kept.truncate(n);
                let matches = (!kept.is_empty()).then(|| DomainMatches {
                    domain_id: record.id.clone(),
                    matches: kept,
                });
                Ok(Some((candidates, matches)))
            })
            .collect();

        let mut stats = MatchRunStats {
            domain_records: records.len(),
            ..MatchRunStats::default()
        };
        let mut results = Vec::new();
        let mut top_total = 0.0;
        for outcome in outcomes {
            let Some((candidates, matches)) = outcome? else {
                stats.records_excluded += 1;
                continue;
            };
            stats.candidates_scored += candidates;
            if candidates > 0 {
                stats.records_with_candidates += 1;
            }
            if let Some(m) = matches {
                top_total += m.best_score().unwrap_or(0.0);
                stats.records_linked += 1;
                results.push(m);
            }
        }
        if stats.records_linked > 0 {
            stats.avg_top_score = top_total / stats.records_linked as f64;
        }

        pb.finish_with_message(format!("{} records linked", stats.records_linked));
        logger.log_excluded(stats.records_excluded, stats.domain_records);
        logger.log_completion(&format!(
            "{} of {} records linked ({:.1}%), {} candidates scored, mean top score {:.3}",
            stats.records_linked,
            stats.domain_records,
            stats.link_rate() * 100.0,
            stats.candidates_scored,
            stats.avg_top_score
        ));
        Ok((results, stats))
    }
}

pub struct DomainMatchIter<'a> {
    matcher: &'a Matcher,
    records: Box<dyn Iterator<Item = &'a Record> + 'a>,
    threshold: f64,
    n: usize,
    excluded: usize,
}

impl<'a> DomainMatchIter<'a> {
    /// Records skipped so far for violating the missing-field policy.
    pub fn excluded(&self) -> usize {
        self.excluded
    }
}

impl<'a> Iterator for DomainMatchIter<'a> {
    type Item = Result<DomainMatches>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = self.records.next()?;
            match self.matcher.match_record(record, self.threshold, self.n) {
                Ok(Some(matches)) => return Some(Ok(matches)),
                Ok(None) => continue,
                Err(e) if e.is_per_record() => {
                    debug!("{}", e);
                    self.excluded += 1;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparators::FieldSpec;
    use crate::models::Label;
    use crate::test_support::{acme_domain, acme_range, org, trained_settings};

    fn matcher() -> Matcher {
        let settings = trained_settings();
        let index = Arc::new(GazetteerIndex::from_settings(Arc::new(acme_range()), &settings));
        Matcher::new(&settings, index).unwrap()
    }

    #[test]
    fn test_threshold_zero_links_every_blocked_record() {
        let matcher = matcher();
        let domain = acme_domain();
        for n in [1, 2, 3] {
            let linked: Vec<DomainMatches> = matcher
                .matches(&domain, 0.0, n)
                .unwrap()
                .collect::<Result<_>>()
                .unwrap();
            let with_candidates = domain
                .records()
                .filter(|r| !matcher.index().candidates(r).is_empty())
                .count();
            assert_eq!(linked.len(), with_candidates);
            for m in &linked {
                assert!(!m.matches.is_empty() && m.matches.len() <= n);
                assert!(m.matches.windows(2).all(|w| w[0].1 >= w[1].1));
            }
        }
    }

    #[test]
    fn test_match_all_agrees_with_lazy_matches() {
        let matcher = matcher();
        let domain = acme_domain();
        let lazy: Vec<DomainMatches> = matcher
            .matches(&domain, 0.3, 2)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let (eager, stats) = matcher
            .match_all(&domain, 0.3, 2, &ProgressConfig::disabled())
            .unwrap();
        assert_eq!(lazy, eager);
        assert_eq!(stats.records_linked, eager.len());
        assert_eq!(stats.domain_records, domain.len());
    }

    #[test]
    fn test_acme_scenario_scores_high() {
        let settings = trained_settings();
        let domain = Dataset::new(vec![org("d1", "acme corp", "1 main st", "5551234")]);
        let range = Arc::new(Dataset::new(vec![org(
            "r1",
            "acme corporation",
            "1 main street",
            "5551234",
        )]));
        let index = Arc::new(GazetteerIndex::from_settings(range, &settings));
        let matcher = Matcher::new(&settings, index).unwrap();

        let results: Vec<DomainMatches> = matcher
            .matches(&domain, 0.8, 1)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].matches[0].0, "r1");
        assert!(results[0].matches[0].1 > 0.8, "score {}", results[0].matches[0].1);
    }

    #[test]
    fn test_disjoint_records_absent_at_any_threshold() {
        let settings = trained_settings();
        let domain = Dataset::new(vec![org("d1", "acme corp", "1 main st", "5551234")]);
        let range = Arc::new(Dataset::new(vec![org("r1", "globex inc", "9 elm rd", "5559876")]));
        let index = Arc::new(GazetteerIndex::from_settings(range, &settings));
        let matcher = Matcher::new(&settings, index).unwrap();

        assert!(matcher.index().candidates(domain.get("d1").unwrap()).is_empty());
        let (results, stats) = matcher
            .match_all(&domain, 0.0, 1, &ProgressConfig::disabled())
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(stats.candidates_scored, 0);
    }

    #[test]
    fn test_missing_required_field_excluded_and_counted() {
        let domain_full = acme_domain();
        let range = acme_range();
        let mut fields = crate::test_support::default_fields(&[&domain_full, &range]);
        fields.push(FieldSpec::exact("phone", false));
        let settings = crate::test_support::settings_for(fields, &domain_full, &range, |d, r| {
            if d.value("phone") == r.value("phone") {
                Label::Match
            } else {
                Label::Distinct
            }
        });
        let index = Arc::new(GazetteerIndex::from_settings(Arc::new(range), &settings));
        let matcher = Matcher::new(&settings, index).unwrap();

        let domain = Dataset::new(vec![
            org("d1", "acme corp", "1 main st", "5551234"),
            org("d2", "acme corp", "1 main st", ""),
        ]);
        let mut iter = matcher.matches(&domain, 0.0, 1).unwrap();
        let linked: Vec<_> = iter.by_ref().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(iter.excluded(), 1);

        let (_, stats) = matcher
            .match_all(&domain, 0.0, 1, &ProgressConfig::disabled())
            .unwrap();
        assert_eq!(stats.records_excluded, 1);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let matcher = matcher();
        let domain = acme_domain();
        assert!(matches!(
            matcher.matches(&domain, 1.5, 1),
            Err(LinkageError::Configuration(_))
        ));
        assert!(matcher.matches(&domain, 0.5, 0).is_err());
    }
}
