// src/comparators/fuzzy.rs
use strsim::jaro_winkler;

use super::FieldComparator;

/// Jaro-Winkler similarity. Callers go through `FieldSpec`, which orders the
/// arguments, so the result does not depend on which side a value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuzzyComparator;

impl FieldComparator for FuzzyComparator {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        jaro_winkler(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzzy_similarity_range() {
        let c = FuzzyComparator;
        assert_eq!(c.similarity("acme corp", "acme corp"), 1.0);
        let close = c.similarity("acme corp", "acme corporation");
        let far = c.similarity("acme corp", "globex");
        assert!(close > 0.85, "close = {}", close);
        assert!(far < close);
        assert!((0.0..=1.0).contains(&far));
    }
}
