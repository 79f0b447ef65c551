// src/error.rs
use thiserror::Error;

/// Failure modes of the linkage engine.
///
/// `Configuration` and `InsufficientData` abort the current phase.
/// `MissingField` is reported per record; callers exclude the record and keep going.
#[derive(Debug, Error)]
pub enum LinkageError {
    #[error("configuration mismatch: {0}")]
    Configuration(String),

    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    #[error("record '{record_id}' is missing required field '{field}'")]
    MissingField { record_id: String, field: String },

    #[error("gazetteer index is stale: built for {expected}, queried with {found}")]
    IndexStale { expected: String, found: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl LinkageError {
    /// True for errors that concern a single record rather than the whole run.
    pub fn is_per_record(&self) -> bool {
        matches!(self, LinkageError::MissingField { .. })
    }
}

pub type Result<T> = std::result::Result<T, LinkageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_is_per_record() {
        let err = LinkageError::MissingField {
            record_id: "domain.csv3".to_string(),
            field: "phone".to_string(),
        };
        assert!(err.is_per_record());
        assert_eq!(
            err.to_string(),
            "record 'domain.csv3' is missing required field 'phone'"
        );
        assert!(!LinkageError::InsufficientData("no positives".into()).is_per_record());
    }
}
