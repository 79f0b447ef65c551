// src/utils/config.rs
use log::info;

use crate::utils::env::env_or;

/// Logistic regression training parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// L2 penalty on the weights (the bias is never penalized).
    pub l2_penalty: f64,
    pub learning_rate: f64,
    pub max_iterations: usize,
    /// Training stops once every gradient component is below this.
    pub tolerance: f64,
    /// Minimum labeled examples required of *each* class.
    pub min_examples_per_class: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            l2_penalty: 0.01,
            learning_rate: 1.0,
            max_iterations: 2000,
            tolerance: 1e-7,
            min_examples_per_class: 1,
        }
    }
}

/// Active labeling session parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnerConfig {
    /// Records sampled from each dataset to form the calibration pool.
    pub sample_size: usize,
    /// Extra random cross pairs mixed into the pool so distinct examples exist.
    pub random_pair_count: usize,
    /// Iteration budget: oracle prompts per session, unsure answers included.
    pub max_labels: usize,
    /// Re-learn predicates after this many accepted labels.
    pub predicate_refresh_interval: usize,
    pub max_predicates: usize,
    /// A predicate whose blocks cover more than this share of the sample
    /// cross product is demoted.
    pub max_block_coverage: f64,
    pub seed: u64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            sample_size: 1500,
            random_pair_count: 200,
            max_labels: 200,
            predicate_refresh_interval: 5,
            max_predicates: 8,
            max_block_coverage: 0.5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Minimum score kept. 0.0 reports every blocked candidate.
    pub threshold: f64,
    pub matches_per_record: usize,
    pub recall_weight: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            matches_per_record: 1,
            recall_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub learner: LearnerConfig,
    pub matching: MatchConfig,
    pub feature_cache_size: usize,
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            learner: LearnerConfig::default(),
            matching: MatchConfig::default(),
            feature_cache_size: 20_000,
            worker_threads: num_cpus::get(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            classifier: ClassifierConfig {
                l2_penalty: env_or("L2_PENALTY", d.classifier.l2_penalty),
                learning_rate: env_or("LEARNING_RATE", d.classifier.learning_rate),
                max_iterations: env_or("MAX_TRAINING_ITERATIONS", d.classifier.max_iterations),
                tolerance: d.classifier.tolerance,
                min_examples_per_class: env_or(
                    "MIN_EXAMPLES_PER_CLASS",
                    d.classifier.min_examples_per_class,
                )
                .max(1),
            },
            learner: LearnerConfig {
                sample_size: env_or("SAMPLE_SIZE", d.learner.sample_size),
                random_pair_count: env_or("RANDOM_PAIR_COUNT", d.learner.random_pair_count),
                max_labels: env_or("MAX_LABELS", d.learner.max_labels),
                predicate_refresh_interval: env_or(
                    "PREDICATE_REFRESH_INTERVAL",
                    d.learner.predicate_refresh_interval,
                )
                .max(1),
                max_predicates: env_or("MAX_PREDICATES", d.learner.max_predicates).max(1),
                max_block_coverage: env_or("MAX_BLOCK_COVERAGE", d.learner.max_block_coverage),
                seed: env_or("RANDOM_SEED", d.learner.seed),
            },
            matching: MatchConfig {
                threshold: env_or("MATCH_THRESHOLD", d.matching.threshold).clamp(0.0, 1.0),
                matches_per_record: env_or("MATCHES_PER_RECORD", d.matching.matches_per_record)
                    .max(1),
                recall_weight: env_or("RECALL_WEIGHT", d.matching.recall_weight),
            },
            feature_cache_size: env_or("FEATURE_CACHE_SIZE", d.feature_cache_size).max(1),
            worker_threads: env_or("WORKER_THREADS", d.worker_threads).max(1),
        }
    }

    pub fn log_config(&self) {
        info!("⚙️  Engine configuration:");
        info!(
            "   Classifier: l2={}, lr={}, max_iter={}, min_per_class={}",
            self.classifier.l2_penalty,
            self.classifier.learning_rate,
            self.classifier.max_iterations,
            self.classifier.min_examples_per_class
        );
        info!(
            "   Learner: sample={}, random_pairs={}, max_labels={}, refresh_every={}, max_predicates={}",
            self.learner.sample_size,
            self.learner.random_pair_count,
            self.learner.max_labels,
            self.learner.predicate_refresh_interval,
            self.learner.max_predicates
        );
        info!(
            "   Matching: threshold={}, n={}, recall_weight={}, workers={}",
            self.matching.threshold,
            self.matching.matches_per_record,
            self.matching.recall_weight,
            self.worker_threads
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.matching.threshold, 0.0);
        assert_eq!(config.matching.matches_per_record, 1);
        assert_eq!(config.classifier.min_examples_per_class, 1);
        assert!(config.worker_threads >= 1);
    }

    #[test]
    fn test_env_config() {
        env::set_var("SAMPLE_SIZE", "250");
        env::set_var("MATCH_THRESHOLD", "1.7");
        env::set_var("MATCHES_PER_RECORD", "0");
        env::set_var("L2_PENALTY", "0.1");

        let config = EngineConfig::from_env();
        assert_eq!(config.learner.sample_size, 250);
        assert_eq!(config.matching.threshold, 1.0);
        assert_eq!(config.matching.matches_per_record, 1);
        assert_eq!(config.classifier.l2_penalty, 0.1);

        env::remove_var("SAMPLE_SIZE");
        env::remove_var("MATCH_THRESHOLD");
        env::remove_var("MATCHES_PER_RECORD");
        env::remove_var("L2_PENALTY");
    }
}
