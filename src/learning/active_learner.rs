// src/learning/active_learner.rs
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::blocking::{Blocker, Predicate, PredicateLearner};
use crate::error::{LinkageError, Result};
use crate::features::{create_shared_cache, FeatureVectorizer, SharedFeatureCache};
use crate::learning::classifier::Classifier;
use crate::learning::oracle::{LabelOracle, OracleLabel};
use crate::learning::training_corpus::TrainingCorpus;
use crate::models::{CandidatePair, Dataset, Label, LabeledPair, Record};
use crate::settings::TrainedSettings;
use crate::utils::config::{EngineConfig, LearnerConfig};
use crate::utils::progress_bars::logging::{PhaseLogger, Stage};
use crate::utils::progress_bars::progress_callback::create_simple_callback;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerState {
    AwaitingLabel,
    Retraining,
    Converged,
}

/// Drives a labeling session: picks the most informative unlabeled pair,
/// asks the oracle, records the answer and retrains.
pub struct ActiveLearner {
    domain: Arc<Dataset>,
    range: Arc<Dataset>,
    domain_sample: Dataset,
    range_sample: Dataset,
    vectorizer: FeatureVectorizer,
    classifier: Classifier,
    predicate_learner: PredicateLearner,
    predicates: Vec<Predicate>,
    config: LearnerConfig,
    pool: Vec<(CandidatePair, Vec<f64>)>,
    labeled: Vec<LabeledPair>,
    /// Pairs labeled or skipped; never offered again.
    seen: HashSet<CandidatePair>,
    corpus: Option<TrainingCorpus>,
    cache: SharedFeatureCache,
    session_id: Uuid,
    state: LearnerState,
    labels_since_refresh: usize,
    logger: PhaseLogger,
}

impl ActiveLearner {
    pub fn new(
        domain: Arc<Dataset>,
        range: Arc<Dataset>,
        vectorizer: FeatureVectorizer,
        config: &EngineConfig,
    ) -> Self {
        let logger = PhaseLogger::new(Stage::Training);
        let learner_config = config.learner.clone();
        logger.log_start(&format!(
            "sampling {} records per dataset",
            learner_config.sample_size
        ));

        let domain_sample = domain.sample(learner_config.sample_size, learner_config.seed);
        let range_sample = range.sample(
            learner_config.sample_size,
            learner_config.seed.wrapping_add(1),
        );
        logger.log_data_loaded(domain_sample.len(), "domain sample");
        logger.log_data_loaded(range_sample.len(), "range sample");

        let fields = vectorizer.fields().to_vec();
        let predicate_learner = PredicateLearner::new(&fields, &learner_config);
        let pool_blocker = Blocker::new(predicate_learner.pool().to_vec(), &fields);
        let (blocked, _) = pool_blocker.candidate_pairs(
            &domain_sample,
            &range_sample,
            Some(create_simple_callback("candidate pool")),
        );

        let mut pairs: BTreeSet<CandidatePair> = blocked.into_iter().collect();
        let blocked_count = pairs.len();
        pairs.extend(random_pairs(
            &domain_sample,
            &range_sample,
            learner_config.random_pair_count,
            learner_config.seed,
        ));
        let pairs: Vec<CandidatePair> = pairs.into_iter().collect();

        let cache = create_shared_cache(config.feature_cache_size);
        let (pool, excluded) = vectorizer.vectorize_pairs(&pairs, &domain, &range, &cache);
        logger.log_excluded_pairs(excluded, pairs.len());
        logger.log_phase(
            "Candidate pool ready",
            Some(&format!(
                "{} pairs ({} blocked, {} random)",
                pool.len(),
                blocked_count,
                pairs.len() - blocked_count
            )),
        );

        Self {
            classifier: Classifier::new(&vectorizer, config.classifier.clone()),
            predicates: Predicate::default_set(&fields),
            domain,
            range,
            domain_sample,
            range_sample,
            vectorizer,
            predicate_learner,
            config: learner_config,
            pool,
            labeled: Vec::new(),
            seen: HashSet::new(),
            corpus: None,
            cache,
            session_id: Uuid::new_v4(),
            state: LearnerState::AwaitingLabel,
            labels_since_refresh: 0,
            logger,
        }
    }

    /// Loads earlier labels from `corpus` and appends new ones to it.
    /// Labels recorded under another field configuration are re-vectorized
    /// when both records are still present, and skipped otherwise.
    pub fn with_corpus(mut self, corpus: TrainingCorpus) -> Result<Self> {
        let prior = corpus.load()?;
        let fingerprint = self.vectorizer.config_fingerprint().to_string();
        let mut revectorized = 0;
        let mut skipped = 0;

        for mut example in prior {
            if example.config_fingerprint != fingerprint
                || example.features.len() != self.vectorizer.dimension()
            {
                let features = self.records(&example.pair).and_then(|(d, r)| {
                    self.vectorizer
                        .vectorize_cached(&example.pair, d, r, &self.cache)
                        .ok()
                });
                match features {
                    Some(features) => {
                        example.features = features;
                        example.config_fingerprint = fingerprint.clone();
                        revectorized += 1;
                    }
                    None => {
                        skipped += 1;
                        continue;
                    }
                }
            }
            self.seen.insert(example.pair.clone());
            self.labeled.push(example);
        }

        if revectorized > 0 {
            self.logger.log_phase(
                "Re-vectorized earlier labels",
                Some(&format!("{} labels from another field configuration", revectorized)),
            );
        }
        if skipped > 0 {
            self.logger.log_warning(&format!(
                "Skipped {} earlier labels whose records are no longer present",
                skipped
            ));
        }
        if !self.labeled.is_empty() {
            self.refresh_predicates();
            self.retrain()?;
        }
        self.corpus = Some(corpus);
        Ok(self)
    }

    pub fn state(&self) -> LearnerState {
        self.state
    }

    pub fn labeled(&self) -> &[LabeledPair] {
        &self.labeled
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Feature cache `(hits, misses)` so far.
    pub fn cache_stats(&self) -> (usize, usize) {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get_stats()
    }

    fn records(&self, pair: &CandidatePair) -> Option<(&Record, &Record)> {
        Some((self.domain.get(&pair.domain_id)?, self.range.get(&pair.range_id)?))
    }

    fn class_counts(&self) -> (usize, usize) {
        let positives = self.labeled.iter().filter(|l| l.label.is_match()).count();
        (positives, self.labeled.len() - positives)
    }

    /// Index into the pool of the next pair to present, if any remain.
    ///
    /// Until both classes are labeled the most similar pair is chosen (or the
    /// least similar once only matches exist); afterwards the pair the
    /// classifier is least sure about.
    pub fn next_pair(&self) -> Option<usize> {
        let (positives, negatives) = self.class_counts();
        let mut best: Option<(usize, f64)> = None;
        for (i, (pair, features)) in self.pool.iter().enumerate() {
            if self.seen.contains(pair) {
                continue;
            }
            let key = if positives == 0 {
                self.vectorizer.mean_similarity(features)
            } else if negatives == 0 {
                -self.vectorizer.mean_similarity(features)
            } else {
                match self.classifier.uncertainty(features) {
                    Ok(u) => u,
                    Err(_) => continue,
                }
            };
            if best.map_or(true, |(_, b)| key > b) {
                best = Some((i, key));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Runs the labeling loop until the oracle finishes, the pool runs dry or
    /// the iteration budget is spent. Returns the number of labels accepted.
    pub fn run<O: LabelOracle + ?Sized>(&mut self, oracle: &mut O) -> Result<usize> {
        let mut accepted = 0;
        let mut prompts = 0;
        self.state = LearnerState::AwaitingLabel;

        while prompts < self.config.max_labels {
            let Some(idx) = self.next_pair() else {
                info!("🎓 Candidate pool exhausted after {} prompts", prompts);
                break;
            };
            let (pair, features) = self.pool[idx].clone();
            let Some((domain_record, range_record)) = self.records(&pair) else {
                self.seen.insert(pair);
                continue;
            };
            prompts += 1;

            let answer = oracle.present_for_label(domain_record, range_record)?;
            match answer.as_label() {
                Some(label) => {
                    self.record_label(pair, features, label)?;
                    accepted += 1;
                }
                None if answer == OracleLabel::Finished => {
                    debug!("Oracle finished the session after {} prompts", prompts);
                    break;
                }
                None => {
                    debug!("Skipping {} as unsure", pair.key());
                    self.seen.insert(pair);
                }
            }
        }

        let (positives, negatives) = self.class_counts();
        self.logger.log_phase(
            "Labeling session ended",
            Some(&format!(
                "{} new labels, {} match / {} distinct in total",
                accepted, positives, negatives
            )),
        );
        Ok(accepted)
    }

    /// Labels pairs directly, bypassing selection. Pairs must refer to records
    /// of the datasets the learner was built with.
    pub fn mark_pairs(&mut self, examples: &[(CandidatePair, Label)]) -> Result<()> {
        for (pair, label) in examples {
            let (d, r) = self.records(pair).ok_or_else(|| {
                LinkageError::Configuration(format!("unknown record in pair {}", pair.key()))
            })?;
            let features = self
                .vectorizer
                .vectorize_cached(pair, d, r, &self.cache)?;
            self.record_label(pair.clone(), features, *label)?;
        }
        Ok(())
    }

    fn record_label(&mut self, pair: CandidatePair, features: Vec<f64>, label: Label) -> Result<()> {
        self.state = LearnerState::Retraining;
        let example = LabeledPair::new(
            pair.clone(),
            label,
            features.clone(),
            self.vectorizer.config_fingerprint(),
            self.session_id,
        );
        if let Some(corpus) = &self.corpus {
            corpus.append(std::slice::from_ref(&example))?;
        }
        self.labeled.push(example);
        self.seen.insert(pair);

        self.labels_since_refresh += 1;
        if self.labels_since_refresh >= self.config.predicate_refresh_interval {
            self.refresh_predicates();
            self.labels_since_refresh = 0;
        }
        if !self.retrain()? {
            // One class so far: nudge the model toward this label instead.
            self.classifier.update(&features, label.as_target())?;
        }
        self.state = LearnerState::AwaitingLabel;
        Ok(())
    }

    /// Retrains when both classes are present and reports whether it did; a
    /// missing class is not an error mid-session.
    fn retrain(&mut self) -> Result<bool> {
        match self.classifier.train(&self.labeled) {
            Ok(_) => Ok(true),
            Err(LinkageError::InsufficientData(reason)) => {
                debug!("Not retraining yet: {}", reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn refresh_predicates(&mut self) {
        let matches: Vec<(&Record, &Record)> = self
            .labeled
            .iter()
            .filter(|l| l.label.is_match())
            .filter_map(|l| self.records(&l.pair))
            .collect();
        if let Some(learned) = self.predicate_learner.learn(
            &matches,
            &self.domain_sample,
            &self.range_sample,
            self.vectorizer.fields(),
        ) {
            self.predicates = learned;
        }
    }

    /// Final predicate refresh and training. Fails with `InsufficientData`
    /// when a class is missing; the session may then continue labeling.
    pub fn finish(&mut self) -> Result<TrainedSettings> {
        self.state = LearnerState::Retraining;
        self.refresh_predicates();
        let summary = match self.classifier.train(&self.labeled) {
            Ok(summary) => summary,
            Err(e) => {
                self.state = LearnerState::AwaitingLabel;
                return Err(e);
            }
        };
        let settings = TrainedSettings::new(
            &self.vectorizer,
            self.predicates.clone(),
            self.classifier.model().clone(),
        )?;
        self.state = LearnerState::Converged;

        let cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (hits, misses) = cache.get_stats();
        let (entries, capacity) = cache.get_cache_info();
        debug!(
            "Feature cache: {} hits / {} misses, {} of {} entries used",
            hits, misses, entries, capacity
        );
        self.logger.log_completion(&format!(
            "{} labels ({} match / {} distinct), {} predicates, {} iterations",
            self.labeled.len(),
            summary.positives,
            summary.negatives,
            settings.predicates.len(),
            summary.iterations
        ));
        Ok(settings)
    }
}

/// Seeded random cross pairs so the pool holds distinct examples too.
fn random_pairs(domain: &Dataset, range: &Dataset, count: usize, seed: u64) -> Vec<CandidatePair> {
    let domain_ids: Vec<&String> = domain.ids().collect();
    let range_ids: Vec<&String> = range.ids().collect();
    if domain_ids.is_empty() || range_ids.is_empty() {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let d = domain_ids[rng.gen_range(0..domain_ids.len())];
            let r = range_ids[rng.gen_range(0..range_ids.len())];
            CandidatePair::new(d.clone(), r.clone())
        })
        .collect()
}
