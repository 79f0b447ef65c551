// src/comparators/mod.rs
//! Per-field similarity features.
//!
//! Every field contributes a similarity in `[0, 1]` and, when the field allows
//! missing values, a separate missing indicator. A missing value never shows up
//! as a similarity of zero.

pub mod exact;
pub mod fuzzy;
pub mod text;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LinkageError, Result};
use crate::models::Record;
use crate::utils::constants::NEUTRAL_SIMILARITY;

pub use exact::ExactComparator;
pub use fuzzy::FuzzyComparator;
pub use text::{tokenize, TextComparator, TfIdfCorpus};

/// Similarity between two present values of one field.
pub trait FieldComparator {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonType {
    Exact,
    Fuzzy,
    Text,
}

impl ComparisonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonType::Exact => "exact",
            ComparisonType::Fuzzy => "fuzzy",
            ComparisonType::Text => "text",
        }
    }
}

fn default_has_missing() -> bool {
    true
}

/// User-authored field declaration, e.g. loaded from a fields JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub field: String,
    #[serde(rename = "type")]
    pub comparison: ComparisonType,
    #[serde(default = "default_has_missing", rename = "has_missing")]
    pub has_missing: bool,
    /// Background corpus for text fields. Ignored for other types.
    #[serde(default)]
    pub corpus: Option<Vec<String>>,
}

impl FieldDefinition {
    pub fn new(field: &str, comparison: ComparisonType, has_missing: bool) -> Self {
        Self {
            field: field.to_string(),
            comparison,
            has_missing,
            corpus: None,
        }
    }

    pub fn with_corpus(mut self, corpus: Vec<String>) -> Self {
        self.corpus = Some(corpus);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Exact,
    Fuzzy,
    Text(TextComparator),
}

/// A frozen field configuration. Text fields own their corpus statistics,
/// so later records never move IDF weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: String,
    pub has_missing: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn build(definition: FieldDefinition) -> Self {
        let kind = match definition.comparison {
            ComparisonType::Exact => FieldKind::Exact,
            ComparisonType::Fuzzy => FieldKind::Fuzzy,
            ComparisonType::Text => {
                let corpus = definition.corpus.unwrap_or_default();
                FieldKind::Text(TextComparator::new(TfIdfCorpus::build(
                    corpus.iter().map(String::as_str),
                )))
            }
        };
        Self {
            field: definition.field,
            has_missing: definition.has_missing,
            kind,
        }
    }

    pub fn exact(field: &str, has_missing: bool) -> Self {
        Self::build(FieldDefinition::new(field, ComparisonType::Exact, has_missing))
    }

    pub fn fuzzy(field: &str, has_missing: bool) -> Self {
        Self::build(FieldDefinition::new(field, ComparisonType::Fuzzy, has_missing))
    }

    pub fn text<'a>(field: &str, has_missing: bool, corpus: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            field: field.to_string(),
            has_missing,
            kind: FieldKind::Text(TextComparator::new(TfIdfCorpus::build(corpus))),
        }
    }

    pub fn comparison_type(&self) -> ComparisonType {
        match self.kind {
            FieldKind::Exact => ComparisonType::Exact,
            FieldKind::Fuzzy => ComparisonType::Fuzzy,
            FieldKind::Text(_) => ComparisonType::Text,
        }
    }

    /// Number of feature dimensions this field contributes.
    pub fn dimension(&self) -> usize {
        if self.has_missing {
            2
        } else {
            1
        }
    }

    pub fn feature_names(&self) -> Vec<String> {
        let base = format!("{}:{}", self.field, self.comparison_type().as_str());
        if self.has_missing {
            vec![base.clone(), format!("{}:missing", base)]
        } else {
            vec![base]
        }
    }

    /// Checks the missing-field policy for one record.
    pub fn check_record(&self, record: &Record) -> Result<()> {
        if !self.has_missing && record.value(&self.field).is_none() {
            return Err(LinkageError::MissingField {
                record_id: record.id.clone(),
                field: self.field.clone(),
            });
        }
        Ok(())
    }

    /// Appends this field's features for a value pair to `out`.
    pub fn compare_into(&self, a: Option<&str>, b: Option<&str>, out: &mut Vec<f64>) {
        match (a, b) {
            (Some(a), Some(b)) => {
                // Order the arguments so every comparator is exactly symmetric.
                let (first, second) = if a <= b { (a, b) } else { (b, a) };
                out.push(self.similarity(first, second).clamp(0.0, 1.0));
                if self.has_missing {
                    out.push(0.0);
                }
            }
            _ => {
                out.push(NEUTRAL_SIMILARITY);
                if self.has_missing {
                    out.push(1.0);
                }
            }
        }
    }

    pub fn compare(&self, a: Option<&str>, b: Option<&str>) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.dimension());
        self.compare_into(a, b, &mut out);
        out
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        match &self.kind {
            FieldKind::Exact => ExactComparator.similarity(a, b),
            FieldKind::Fuzzy => FuzzyComparator.similarity(a, b),
            FieldKind::Text(c) => c.similarity(a, b),
        }
    }

    /// Feeds everything that determines this field's features into `hasher`.
    pub(crate) fn hash_into(&self, hasher: &mut Sha256) {
        hasher.update(self.field.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.comparison_type().as_str().as_bytes());
        hasher.update([self.has_missing as u8]);
        if let FieldKind::Text(c) = &self.kind {
            c.corpus().hash_into(hasher);
        }
        hasher.update([0x1e]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_value_is_neutral_with_indicator() {
        let spec = FieldSpec::exact("phone", true);
        assert_eq!(spec.compare(None, Some("5551234")), vec![0.5, 1.0]);
        assert_eq!(spec.compare(None, None), vec![0.5, 1.0]);
        assert_eq!(spec.compare(Some("5551234"), Some("5551234")), vec![1.0, 0.0]);
        assert_eq!(spec.compare(Some("5551234"), Some("5559999")), vec![0.0, 0.0]);
    }

    #[test]
    fn test_no_indicator_when_missing_not_allowed() {
        let spec = FieldSpec::fuzzy("name", false);
        assert_eq!(spec.dimension(), 1);
        assert_eq!(spec.feature_names(), vec!["name:fuzzy".to_string()]);
        assert_eq!(spec.compare(Some("acme"), Some("acme")), vec![1.0]);
    }

    #[test]
    fn test_exact_and_fuzzy_are_symmetric() {
        let values = [
            "acme corp",
            "acme corporation",
            "1 main st",
            "1 main street",
            "globex",
            "a",
            "",
            "ünïcode name",
        ];
        for spec in [FieldSpec::exact("f", true), FieldSpec::fuzzy("f", true)] {
            for a in values {
                for b in values {
                    assert_eq!(
                        spec.compare(Some(a), Some(b)),
                        spec.compare(Some(b), Some(a)),
                        "{:?} not symmetric for ({}, {})",
                        spec.comparison_type(),
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_check_record_enforces_policy() {
        let record = Record::new("d1").with_field("name", Some("acme"));
        assert!(FieldSpec::exact("phone", true).check_record(&record).is_ok());
        let err = FieldSpec::exact("phone", false)
            .check_record(&record)
            .unwrap_err();
        assert!(err.is_per_record());
    }

    #[test]
    fn test_definition_from_json() {
        let defs: Vec<FieldDefinition> = serde_json::from_str(
            r#"[{"field": "name", "type": "fuzzy"},
                {"field": "phone", "type": "exact", "has_missing": false}]"#,
        )
        .unwrap();
        assert!(defs[0].has_missing);
        assert!(!defs[1].has_missing);
        assert_eq!(defs[1].comparison, ComparisonType::Exact);
    }
}
