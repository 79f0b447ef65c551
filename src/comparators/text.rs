// src/comparators/text.rs
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use super::FieldComparator;

/// Splits on anything that is not alphanumeric. Input is expected lowercased.
pub fn tokenize(value: &str) -> Vec<&str> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Document frequencies of a background corpus, frozen at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfIdfCorpus {
    document_count: usize,
    document_frequency: BTreeMap<String, usize>,
}

impl TfIdfCorpus {
    pub fn build<'a>(documents: impl IntoIterator<Item = &'a str>) -> Self {
        let mut document_count = 0;
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for doc in documents {
            document_count += 1;
            let distinct: BTreeSet<&str> = tokenize(doc).into_iter().collect();
            for term in distinct {
                *document_frequency.entry(term.to_string()).or_insert(0) += 1;
            }
        }
        Self {
            document_count,
            document_frequency,
        }
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Smoothed IDF. Terms never seen in the corpus get the largest weight;
    /// an empty corpus gives every term weight 1.
    pub fn idf(&self, term: &str) -> f64 {
        let df = self.document_frequency.get(term).copied().unwrap_or(0);
        ((1 + self.document_count) as f64 / (1 + df) as f64).ln() + 1.0
    }

    fn vector(&self, value: &str) -> BTreeMap<String, f64> {
        let mut tf: BTreeMap<String, f64> = BTreeMap::new();
        for token in tokenize(value) {
            *tf.entry(token.to_string()).or_insert(0.0) += 1.0;
        }
        for (term, weight) in tf.iter_mut() {
            *weight *= self.idf(term);
        }
        tf
    }

    /// Cosine similarity of the TF-IDF vectors of `a` and `b`. A value with no
    /// tokens has similarity 0 with everything.
    pub fn cosine(&self, a: &str, b: &str) -> f64 {
        let va = self.vector(a);
        let vb = self.vector(b);
        if va.is_empty() || vb.is_empty() {
            return 0.0;
        }
        let dot: f64 = va
            .iter()
            .filter_map(|(term, wa)| vb.get(term).map(|wb| wa * wb))
            .sum();
        let norm_a = va.values().map(|w| w * w).sum::<f64>().sqrt();
        let norm_b = vb.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }

    pub(crate) fn hash_into(&self, hasher: &mut Sha256) {
        hasher.update(self.document_count.to_le_bytes());
        for (term, df) in &self.document_frequency {
            hasher.update(term.as_bytes());
            hasher.update([0x1f]);
            hasher.update(df.to_le_bytes());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextComparator {
    corpus: TfIdfCorpus,
}

impl TextComparator {
    pub fn new(corpus: TfIdfCorpus) -> Self {
        Self { corpus }
    }

    pub fn corpus(&self) -> &TfIdfCorpus {
        &self.corpus
    }
}

impl FieldComparator for TextComparator {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        self.corpus.cosine(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> TfIdfCorpus {
        TfIdfCorpus::build(vec![
            "acme corp",
            "acme corporation",
            "globex corp",
            "initech corp",
            "umbrella corp",
        ])
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("1 main st."), vec!["1", "main", "st"]);
        assert!(tokenize("  -- ").is_empty());
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let c = corpus();
        assert_eq!(c.document_count(), 5);
        assert!(c.idf("acme") > c.idf("corp"));
        assert!(c.idf("unseen") > c.idf("acme"));
    }

    #[test]
    fn test_cosine_prefers_rare_overlap() {
        let c = TextComparator::new(corpus());
        let rare = c.similarity("acme corp", "acme holdings");
        let common = c.similarity("acme corp", "globex corp");
        assert!(rare > common, "rare={} common={}", rare, common);
        assert!((c.similarity("acme corp", "acme corp") - 1.0).abs() < 1e-12);
        assert_eq!(c.similarity("acme", "globex"), 0.0);
        assert_eq!(c.similarity("", "acme"), 0.0);
    }

    #[test]
    fn test_corpus_is_frozen() {
        let c = TextComparator::new(corpus());
        let before = c.similarity("acme corp", "acme corporation");
        // Comparing new values does not move document frequencies.
        let _ = c.similarity("brand new words", "brand new words");
        assert_eq!(before, c.similarity("acme corp", "acme corporation"));
        assert_eq!(c.corpus().document_count(), 5);
    }
}
