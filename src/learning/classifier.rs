// src/learning/classifier.rs
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{LinkageError, Result};
use crate::features::FeatureVectorizer;
use crate::models::LabeledPair;
use crate::utils::config::ClassifierConfig;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// ln(1 + e^z) without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Logistic regression weights, tied to the field configuration they were
/// trained under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierModel {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub feature_names: Vec<String>,
    pub config_fingerprint: String,
    /// Examples seen across all training calls and online updates.
    pub trials: usize,
}

impl ClassifierModel {
    /// Zero weights. Scores 0.5 for everything until trained.
    pub fn new(vectorizer: &FeatureVectorizer) -> Self {
        Self {
            weights: vec![0.0; vectorizer.dimension()],
            bias: 0.0,
            feature_names: vectorizer.feature_names(),
            config_fingerprint: vectorizer.config_fingerprint().to_string(),
            trials: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.weights.len()
    }

    /// Rejects a model built for a different field configuration.
    pub fn check_compatible(&self, vectorizer: &FeatureVectorizer) -> Result<()> {
        if self.config_fingerprint != vectorizer.config_fingerprint() {
            return Err(LinkageError::Configuration(format!(
                "model was trained for field configuration {} but the current one is {}",
                self.config_fingerprint,
                vectorizer.config_fingerprint()
            )));
        }
        if self.weights.len() != vectorizer.dimension() {
            return Err(LinkageError::Configuration(format!(
                "model has {} weights but the field configuration produces {} features",
                self.weights.len(),
                vectorizer.dimension()
            )));
        }
        Ok(())
    }

    fn check_length(&self, features: &[f64]) -> Result<()> {
        if features.len() != self.weights.len() {
            return Err(LinkageError::Configuration(format!(
                "expected {} features, got {}",
                self.weights.len(),
                features.len()
            )));
        }
        Ok(())
    }

    fn logit_unchecked(&self, features: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(features)
            .map(|(w, f)| w * f)
            .sum::<f64>()
            + self.bias
    }

    /// Match probability in `[0, 1]`.
    pub fn score(&self, features: &[f64]) -> Result<f64> {
        self.check_length(features)?;
        Ok(sigmoid(self.logit_unchecked(features)))
    }

    /// 1.0 at a score of 0.5, falling to 0.0 at either extreme.
    pub fn uncertainty(&self, features: &[f64]) -> Result<f64> {
        let p = self.score(features)?;
        Ok(1.0 - 2.0 * (p - 0.5).abs())
    }

    /// Single-example SGD step toward `target` (1.0 match, 0.0 distinct).
    pub fn update(&mut self, features: &[f64], target: f64, learning_rate: f64) -> Result<()> {
        let prediction = self.score(features)?;
        let error = target - prediction;
        for (w, f) in self.weights.iter_mut().zip(features) {
            *w += learning_rate * error * f;
        }
        self.bias += learning_rate * error;
        self.trials += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub iterations: usize,
    pub converged: bool,
    pub loss: f64,
    pub positives: usize,
    pub negatives: usize,
}

/// L2-regularized logistic regression, warm-started on every `train` call.
#[derive(Debug, Clone)]
pub struct Classifier {
    model: ClassifierModel,
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(vectorizer: &FeatureVectorizer, config: ClassifierConfig) -> Self {
        Self {
            model: ClassifierModel::new(vectorizer),
            config,
        }
    }

    pub fn model(&self) -> &ClassifierModel {
        &self.model
    }

    pub fn score(&self, features: &[f64]) -> Result<f64> {
        self.model.score(features)
    }

    pub fn uncertainty(&self, features: &[f64]) -> Result<f64> {
        self.model.uncertainty(features)
    }

    pub fn update(&mut self, features: &[f64], target: f64) -> Result<()> {
        self.model
            .update(features, target, self.config.learning_rate)
    }

    /// Full-batch gradient descent on mean log-loss plus `l2/2 * |w|^2`,
    /// starting from the current weights. The bias is not penalized.
    pub fn train(&mut self, labeled: &[LabeledPair]) -> Result<TrainingSummary> {
        let positives = labeled.iter().filter(|l| l.label.is_match()).count();
        let negatives = labeled.len() - positives;
        let needed = self.config.min_examples_per_class.max(1);
        if positives < needed || negatives < needed {
            return Err(LinkageError::InsufficientData(format!(
                "{} matches and {} distinct pairs labeled, need at least {} of each",
                positives, negatives, needed
            )));
        }
        for example in labeled {
            if example.config_fingerprint != self.model.config_fingerprint {
                return Err(LinkageError::Configuration(format!(
                    "labeled pair {} was vectorized under field configuration {}",
                    example.pair.key(),
                    example.config_fingerprint
                )));
            }
            self.model.check_length(&example.features)?;
        }

        let n = labeled.len() as f64;
        let lambda = self.config.l2_penalty.max(0.0);
        // Step size learning_rate / L, where L bounds the gradient's Lipschitz constant.
        let max_sq_norm = labeled
            .iter()
            .map(|l| 1.0 + l.features.iter().map(|f| f * f).sum::<f64>())
            .fold(1.0, f64::max);
        let step = self.config.learning_rate / (0.25 * max_sq_norm + lambda);

        let dim = self.model.weights.len();
        let mut grad_w = vec![0.0; dim];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;
            for example in labeled {
                let p = sigmoid(self.model.logit_unchecked(&example.features));
                let err = p - example.label.as_target();
                for (g, f) in grad_w.iter_mut().zip(&example.features) {
                    *g += err * f;
                }
                grad_b += err;
            }
            let mut max_grad = (grad_b / n).abs();
            for (g, w) in grad_w.iter_mut().zip(&self.model.weights) {
                *g = *g / n + lambda * w;
                max_grad = max_grad.max(g.abs());
            }
            if max_grad < self.config.tolerance {
                converged = true;
                break;
            }
            for (w, g) in self.model.weights.iter_mut().zip(&grad_w) {
                *w -= step * g;
            }
            self.model.bias -= step * grad_b / n;
            iterations += 1;
        }

        self.model.trials += labeled.len();
        let loss = self.loss(labeled);
        debug!(
            "Classifier weights after training: {:?}, bias {:.4}",
            self.model.weights, self.model.bias
        );
        info!(
            "🎓 Trained on {} labels ({} match / {} distinct): {} iterations, loss {:.4}{}",
            labeled.len(),
            positives,
            negatives,
            iterations,
            loss,
            if converged { "" } else { " (iteration budget reached)" }
        );
        Ok(TrainingSummary {
            iterations,
            converged,
            loss,
            positives,
            negatives,
        })
    }

    /// Regularized mean log-loss on `labeled`.
    pub fn loss(&self, labeled: &[LabeledPair]) -> f64 {
        if labeled.is_empty() {
            return 0.0;
        }
        let data_loss: f64 = labeled
            .iter()
            .map(|l| {
                let z = self.model.logit_unchecked(&l.features);
                if l.label.is_match() {
                    softplus(-z)
                } else {
                    softplus(z)
                }
            })
            .sum::<f64>()
            / labeled.len() as f64;
        let penalty: f64 = self.model.weights.iter().map(|w| w * w).sum::<f64>()
            * self.config.l2_penalty
            / 2.0;
        data_loss + penalty
    }
}
