// src/settings.rs
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::blocking::Predicate;
use crate::comparators::FieldSpec;
use crate::error::{LinkageError, Result};
use crate::features::FeatureVectorizer;
use crate::learning::ClassifierModel;
use crate::utils::constants::ARTIFACT_FORMAT_VERSION;

/// Everything needed to match without retraining. The gazetteer index is a
/// separate artifact joined to this one by `config_fingerprint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedSettings {
    pub format_version: u32,
    pub config_fingerprint: String,
    pub field_specs: Vec<FieldSpec>,
    pub predicates: Vec<Predicate>,
    pub model: ClassifierModel,
}

impl TrainedSettings {
    pub fn new(
        vectorizer: &FeatureVectorizer,
        predicates: Vec<Predicate>,
        model: ClassifierModel,
    ) -> Result<Self> {
        model.check_compatible(vectorizer)?;
        if predicates.is_empty() {
            return Err(LinkageError::Configuration(
                "settings need at least one blocking predicate".to_string(),
            ));
        }
        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            config_fingerprint: vectorizer.config_fingerprint().to_string(),
            field_specs: vectorizer.fields().to_vec(),
            predicates,
            model,
        })
    }

    /// Rebuilds the vectorizer and checks it against the stored model.
    pub fn vectorizer(&self) -> Result<FeatureVectorizer> {
        let vectorizer = FeatureVectorizer::new(self.field_specs.clone())?;
        if vectorizer.config_fingerprint() != self.config_fingerprint {
            return Err(LinkageError::Configuration(format!(
                "stored field specs hash to {} but settings declare {}",
                vectorizer.config_fingerprint(),
                self.config_fingerprint
            )));
        }
        self.model.check_compatible(&vectorizer)?;
        Ok(vectorizer)
    }

    /// Fails with `Configuration` unless `fields` is the configuration these
    /// settings were trained with.
    pub fn check_fields(&self, fields: &[FieldSpec]) -> Result<()> {
        let requested = FeatureVectorizer::new(fields.to_vec())?;
        if requested.config_fingerprint() != self.config_fingerprint {
            return Err(LinkageError::Configuration(format!(
                "requested fields hash to {} but settings were trained with {}; retrain to change fields",
                requested.config_fingerprint(),
                self.config_fingerprint
            )));
        }
        Ok(())
    }

    pub fn predicate_fingerprint(&self) -> String {
        Predicate::fingerprint(&self.predicates)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("💾 Saved trained settings to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings: TrainedSettings = serde_json::from_str(&fs::read_to_string(path)?)?;
        if settings.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(LinkageError::Configuration(format!(
                "{} has format version {}, expected {}",
                path.display(),
                settings.format_version,
                ARTIFACT_FORMAT_VERSION
            )));
        }
        settings.vectorizer()?;
        info!(
            "📂 Loaded trained settings from {} ({} fields, {} predicates)",
            path.display(),
            settings.field_specs.len(),
            settings.predicates.len()
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{GazetteerIndex, Matcher};
    use crate::test_support::{acme_domain, acme_range, default_fields, trained_settings};
    use crate::utils::progress_bars::progress_config::ProgressConfig;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_save_load_round_trip_is_exact() {
        let settings = trained_settings();
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        settings.save(&path).unwrap();
        let loaded = TrainedSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
        for (a, b) in loaded.model.weights.iter().zip(&settings.model.weights) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_reloaded_settings_match_identically() {
        let settings = trained_settings();
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        settings.save(&path).unwrap();
        let loaded = TrainedSettings::load(&path).unwrap();

        let range = Arc::new(acme_range());
        let run = |s: &TrainedSettings| {
            let index = Arc::new(GazetteerIndex::from_settings(Arc::clone(&range), s));
            let matcher = Matcher::new(s, index).unwrap();
            matcher
                .match_all(&acme_domain(), 0.0, 2, &ProgressConfig::disabled())
                .unwrap()
        };
        let (before, before_stats) = run(&settings);
        let (after, after_stats) = run(&loaded);
        assert!(!before.is_empty());
        assert_eq!(before, after);
        assert_eq!(before_stats.candidates_scored, after_stats.candidates_scored);
        for (a, b) in before.iter().zip(&after) {
            for ((_, sa), (_, sb)) in a.matches.iter().zip(&b.matches) {
                assert_eq!(sa.to_bits(), sb.to_bits());
            }
        }
    }

    #[test]
    fn test_check_fields_rejects_other_configuration() {
        let settings = trained_settings();
        let domain = acme_domain();
        let range = acme_range();
        settings
            .check_fields(&default_fields(&[&domain, &range]))
            .unwrap();
        assert!(matches!(
            settings.check_fields(&[FieldSpec::exact("phone", false)]),
            Err(LinkageError::Configuration(_))
        ));
    }

    #[test]
    fn test_tampered_field_specs_are_rejected() {
        let mut settings = trained_settings();
        settings.field_specs[0].has_missing = !settings.field_specs[0].has_missing;
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        settings.save(&path).unwrap();
        assert!(matches!(
            TrainedSettings::load(&path),
            Err(LinkageError::Configuration(_))
        ));
    }

    #[test]
    fn test_model_for_other_configuration_rejected() {
        let settings = trained_settings();
        let other = FeatureVectorizer::new(vec![FieldSpec::exact("phone", true)]).unwrap();
        assert!(matches!(
            TrainedSettings::new(&other, settings.predicates.clone(), settings.model.clone()),
            Err(LinkageError::Configuration(_))
        ));
    }
}
