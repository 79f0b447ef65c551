// src/test_support.rs
//! Shared fixtures for unit tests.
use std::sync::Arc;

use crate::comparators::FieldSpec;
use crate::features::FeatureVectorizer;
use crate::learning::{ActiveLearner, FnOracle, OracleLabel};
use crate::models::{CandidatePair, Dataset, Label, Record};
use crate::settings::TrainedSettings;
use crate::utils::config::EngineConfig;

pub use crate::ingest::default_fields;

/// An organization record. Empty strings stand for missing values.
pub fn org(id: &str, name: &str, address: &str, phone: &str) -> Record {
    Record::new(id)
        .with_field("name", Some(name))
        .with_field("address", Some(address))
        .with_field("phone", Some(phone))
}

pub fn acme_domain() -> Dataset {
    Dataset::new(vec![
        org("d1", "acme corp", "1 main st", "5551234"),
        org("d2", "globex industries", "22 elm rd", "5552222"),
        org("d3", "initech software", "400 oak ave", "5553333"),
        org("d4", "umbrella health", "9 pine st", "5554444"),
        org("d5", "stark tools", "10 lake dr", "5555555"),
        org("d6", "wayne foods", "77 hill rd", "5556666"),
    ])
}

pub fn acme_range() -> Dataset {
    Dataset::new(vec![
        org("r1", "acme corporation", "1 main street", "5551234"),
        org("r2", "globex industries inc", "22 elm road", "5552222"),
        org("r3", "initech", "400 oak avenue", "5553333"),
        org("r4", "umbrella health group", "9 pine street", "5554444"),
        org("r5", "stark tool co", "10 lake drive", "5555555"),
        org("r6", "acme holdings", "500 market st", "5559999"),
        org("r7", "globex media", "8 bay rd", "5558888"),
        org("r8", "wonka candy", "3 mill ln", "5557777"),
    ])
}

fn same_phone(domain: &Record, range: &Record) -> bool {
    domain.value("phone").is_some() && domain.value("phone") == range.value("phone")
}

/// In the acme fixtures two records are the same organization exactly when
/// their phone numbers agree.
pub fn phone_oracle() -> FnOracle<impl FnMut(&Record, &Record) -> OracleLabel> {
    FnOracle::new(|d: &Record, r: &Record| {
        if same_phone(d, r) {
            OracleLabel::Match
        } else {
            OracleLabel::Distinct
        }
    })
}

/// Trains settings by labeling every cross pair of `domain` and `range` with `judge`.
pub fn settings_for(
    fields: Vec<FieldSpec>,
    domain: &Dataset,
    range: &Dataset,
    judge: impl Fn(&Record, &Record) -> Label,
) -> TrainedSettings {
    let domain = Arc::new(domain.clone());
    let range = Arc::new(range.clone());
    let vectorizer = FeatureVectorizer::new(fields).unwrap();
    let mut config = EngineConfig::default();
    config.classifier.l2_penalty = 0.001;

    let examples: Vec<(CandidatePair, Label)> = domain
        .records()
        .flat_map(|d| {
            range
                .records()
                .map(|r| (CandidatePair::new(d.id.clone(), r.id.clone()), judge(d, r)))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut learner = ActiveLearner::new(Arc::clone(&domain), Arc::clone(&range), vectorizer, &config);
    learner.mark_pairs(&examples).unwrap();
    learner.finish().unwrap()
}

pub fn trained_settings() -> TrainedSettings {
    let domain = acme_domain();
    let range = acme_range();
    let fields = default_fields(&[&domain, &range]);
    settings_for(fields, &domain, &range, |d, r| {
        if same_phone(d, r) {
            Label::Match
        } else {
            Label::Distinct
        }
    })
}
