// src/ingest.rs
//! CSV in and out: value cleanup, dataset loading, default field setup and
//! the match report writer.
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

use crate::comparators::{FieldDefinition, FieldSpec};
use crate::error::{LinkageError, Result};
use crate::models::{Dataset, DomainMatches, Record};

const CLEANUP_RULES: &[(&str, &str)] = &[
    (r"\n", " "),
    (r"-", ""),
    (r"/", " "),
    (r"'", ""),
    (r",", ""),
    (r":", " "),
    (r" +", " "),
];

static CLEANUP_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    CLEANUP_RULES
        .iter()
        .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
            Ok(re) => Some((re, *replacement)),
            Err(e) => {
                warn!("Invalid regex pattern: '{}'. Error: {}", pattern, e);
                None
            }
        })
        .collect()
});

/// Cleans one raw cell. Returns `None` when nothing is left, which the
/// comparators then treat as a missing value.
pub fn preprocess(value: &str) -> Option<String> {
    let mut cleaned = value.to_string();
    for (re, replacement) in CLEANUP_PATTERNS.iter() {
        cleaned = re.replace_all(&cleaned, *replacement).into_owned();
    }
    let cleaned = cleaned
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_lowercase()
        .trim()
        .to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Reads a headed CSV file. Record ids are the file name followed by the
/// zero-based row number, so ids from two files never collide.
pub fn read_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let row_values = result?;
        let mut record = Record::new(format!("{}{}", file_name, row));
        for (header, raw) in headers.iter().zip(row_values.iter()) {
            record
                .fields
                .insert(header.trim().to_string(), preprocess(raw));
        }
        records.push(record);
    }
    info!("📥 Read {} records from {}", records.len(), path.display());
    Ok(Dataset::new(records))
}

/// Organization fields used when no field file is given: a fuzzy and a
/// TF-IDF comparison on `name` (IDF from every name in `datasets`), and TF-IDF
/// on `address` and `phone`. All of them tolerate missing values.
pub fn default_fields(datasets: &[&Dataset]) -> Vec<FieldSpec> {
    vec![
        FieldSpec::fuzzy("name", true),
        FieldSpec::text(
            "name",
            true,
            datasets.iter().flat_map(|d| d.field_values("name")),
        ),
        FieldSpec::text("address", true, std::iter::empty()),
        FieldSpec::text("phone", true, std::iter::empty()),
    ]
}

/// Reads a JSON array of field definitions.
pub fn load_field_definitions(path: impl AsRef<Path>) -> Result<Vec<FieldSpec>> {
    let path = path.as_ref();
    let definitions: Vec<FieldDefinition> = serde_json::from_str(&fs::read_to_string(path)?)?;
    if definitions.is_empty() {
        return Err(LinkageError::Configuration(format!(
            "{} defines no fields",
            path.display()
        )));
    }
    Ok(definitions.into_iter().map(FieldSpec::build).collect())
}

/// Writes `confidence_score,domain_id,range_id` rows, one per surviving
/// match. `domain_prefix` and `range_prefix` are cut from the front of the ids.
pub fn write_matches(
    path: impl AsRef<Path>,
    matches: &[DomainMatches],
    domain_prefix: &str,
    range_prefix: &str,
) -> Result<usize> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["confidence_score", "domain_id", "range_id"])?;
    let mut rows = 0;
    for result in matches.iter().cloned().flat_map(DomainMatches::into_results) {
        writer.write_record([
            result.score.to_string(),
            strip_id(&result.domain_id, domain_prefix).to_string(),
            strip_id(&result.range_id, range_prefix).to_string(),
        ])?;
        rows += 1;
    }
    writer.flush()?;
    info!("📤 Wrote {} matches to {}", rows, path.display());
    Ok(rows)
}

fn strip_id<'a>(id: &'a str, prefix: &str) -> &'a str {
    id.strip_prefix(prefix).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparators::ComparisonType;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_preprocess_cleans_punctuation_and_case() {
        assert_eq!(
            preprocess("  \"ACME-Corp, Inc.\"  ").as_deref(),
            Some("acmecorp inc.")
        );
        assert_eq!(
            preprocess("12/B Main St:\nSuite  4").as_deref(),
            Some("12 b main st suite 4")
        );
        assert_eq!(preprocess("O'Brien's").as_deref(), Some("obriens"));
    }

    #[test]
    fn test_preprocess_empty_is_none() {
        assert_eq!(preprocess(""), None);
        assert_eq!(preprocess("   "), None);
        assert_eq!(preprocess("\"\""), None);
        assert_eq!(preprocess(" - , "), None);
    }

    #[test]
    fn test_read_dataset_ids_and_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("domain.csv");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "name,address,phone").unwrap();
        writeln!(file, "Acme Corp,1 Main St,555-1234").unwrap();
        writeln!(file, "Globex,,").unwrap();
        drop(file);

        let dataset = read_dataset(&path).unwrap();
        assert_eq!(dataset.len(), 2);
        let first = dataset.get("domain.csv0").unwrap();
        assert_eq!(first.value("name"), Some("acme corp"));
        assert_eq!(first.value("phone"), Some("5551234"));
        let second = dataset.get("domain.csv1").unwrap();
        assert_eq!(second.value("address"), None);
    }

    #[test]
    fn test_default_fields_shape() {
        let dataset = Dataset::new(vec![Record::new("a").with_field("name", Some("acme corp"))]);
        let fields = default_fields(&[&dataset]);
        let kinds: Vec<(&str, ComparisonType)> = fields
            .iter()
            .map(|f| (f.field.as_str(), f.comparison_type()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("name", ComparisonType::Fuzzy),
                ("name", ComparisonType::Text),
                ("address", ComparisonType::Text),
                ("phone", ComparisonType::Text),
            ]
        );
        assert!(fields.iter().all(|f| f.has_missing));
    }

    #[test]
    fn test_load_field_definitions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fields.json");
        fs::write(
            &path,
            r#"[{"field": "name", "type": "fuzzy"}, {"field": "phone", "type": "exact", "has_missing": false}]"#,
        )
        .unwrap();
        let fields = load_field_definitions(&path).unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields[0].has_missing);
        assert_eq!(fields[1].comparison_type(), ComparisonType::Exact);
        assert!(!fields[1].has_missing);

        fs::write(&path, "[]").unwrap();
        assert!(matches!(
            load_field_definitions(&path),
            Err(LinkageError::Configuration(_))
        ));
    }

    #[test]
    fn test_write_matches_strips_prefixes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let matches = vec![DomainMatches {
            domain_id: "domain.csv3".to_string(),
            matches: vec![("range.csv7".to_string(), 0.75), ("range.csv9".to_string(), 0.5)],
        }];
        let rows = write_matches(&path, &matches, "domain.csv", "range.csv").unwrap();
        assert_eq!(rows, 2);
        let written = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "confidence_score,domain_id,range_id");
        assert_eq!(lines[1], "0.75,3,7");
        assert_eq!(lines[2], "0.5,3,9");
    }
}
