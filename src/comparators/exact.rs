// src/comparators/exact.rs

use super::FieldComparator;

/// 1.0 on equality, 0.0 otherwise. Values arrive case and format normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExactComparator;

impl FieldComparator for ExactComparator {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            1.0
        } else {
            0.0
        }
    }
}
