// src/matching/gazetteer_index.rs
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::blocking::{Blocker, InvertedIndex, Predicate};
use crate::comparators::FieldSpec;
use crate::error::{LinkageError, Result};
use crate::models::{Dataset, Record, RecordId};
use crate::settings::TrainedSettings;
use crate::utils::constants::ARTIFACT_FORMAT_VERSION;
use crate::utils::progress_bars::logging::{PhaseLogger, Stage};

/// The persisted part of an index. Record contents are not stored; the range
/// dataset is supplied again on load and checked by fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexArtifact {
    format_version: u32,
    config_fingerprint: String,
    predicate_fingerprint: String,
    range_fingerprint: String,
    range_record_count: usize,
    predicates: Vec<Predicate>,
    postings: InvertedIndex,
}

/// Inverted index over the canonical range dataset. Immutable once built;
/// a changed range or predicate set means building a new one.
#[derive(Debug, Clone)]
pub struct GazetteerIndex {
    artifact: IndexArtifact,
    blocker: Blocker,
    fields: Vec<FieldSpec>,
    range: Arc<Dataset>,
}

impl GazetteerIndex {
    pub fn build(
        range: Arc<Dataset>,
        predicates: &[Predicate],
        fields: &[FieldSpec],
        config_fingerprint: &str,
    ) -> Self {
        let logger = PhaseLogger::new(Stage::Indexing);
        logger.log_start(&format!(
            "{} range records, {} predicates",
            range.len(),
            predicates.len()
        ));
        let blocker = Blocker::new(predicates.to_vec(), fields);
        let postings = blocker.index(&range);
        logger.log_excluded(postings.records_excluded(), range.len());

        let artifact = IndexArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            config_fingerprint: config_fingerprint.to_string(),
            predicate_fingerprint: Predicate::fingerprint(predicates),
            range_fingerprint: range.fingerprint().to_string(),
            range_record_count: range.len(),
            predicates: predicates.to_vec(),
            postings,
        };
        logger.log_completion(&format!(
            "{} records indexed under {} block keys",
            artifact.postings.records_indexed(),
            artifact.postings.block_key_count()
        ));
        Self {
            artifact,
            blocker,
            fields: fields.to_vec(),
            range,
        }
    }

    pub fn from_settings(range: Arc<Dataset>, settings: &TrainedSettings) -> Self {
        Self::build(
            range,
            &settings.predicates,
            &settings.field_specs,
            &settings.config_fingerprint,
        )
    }

    /// A fresh index over `range` with the same predicates and fields.
    pub fn rebuild(&self, range: Arc<Dataset>) -> Self {
        Self::build(
            range,
            &self.artifact.predicates,
            &self.fields,
            &self.artifact.config_fingerprint,
        )
    }

    pub fn range(&self) -> &Arc<Dataset> {
        &self.range
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.artifact.predicates
    }

    pub fn config_fingerprint(&self) -> &str {
        &self.artifact.config_fingerprint
    }

    pub fn predicate_fingerprint(&self) -> &str {
        &self.artifact.predicate_fingerprint
    }

    pub fn range_fingerprint(&self) -> &str {
        &self.artifact.range_fingerprint
    }

    pub fn records_indexed(&self) -> usize {
        self.artifact.postings.records_indexed()
    }

    /// Fails with `IndexStale` when `range` is not the dataset this index was built from.
    pub fn verify(&self, range: &Dataset) -> Result<()> {
        if range.fingerprint() != self.artifact.range_fingerprint {
            return Err(LinkageError::IndexStale {
                expected: self.artifact.range_fingerprint.clone(),
                found: range.fingerprint().to_string(),
            });
        }
        Ok(())
    }

    /// Checks the index belongs to `settings`: same field configuration
    /// (`Configuration` otherwise) and same predicates (`IndexStale` otherwise).
    pub fn verify_settings(&self, settings: &TrainedSettings) -> Result<()> {
        if self.artifact.config_fingerprint != settings.config_fingerprint {
            return Err(LinkageError::Configuration(format!(
                "index was built for field configuration {} but settings use {}",
                self.artifact.config_fingerprint, settings.config_fingerprint
            )));
        }
        let expected = settings.predicate_fingerprint();
        if self.artifact.predicate_fingerprint != expected {
            return Err(LinkageError::IndexStale {
                expected,
                found: self.artifact.predicate_fingerprint.clone(),
            });
        }
        Ok(())
    }

    /// Fails with `MissingField` when the query record may not be blocked.
    pub fn admits(&self, record: &Record) -> Result<()> {
        self.blocker.admits(record)
    }

    pub fn candidates(&self, record: &Record) -> BTreeSet<RecordId> {
        self.blocker.candidates_for(&self.artifact.postings, record)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, serde_json::to_string(&self.artifact)?)?;
        info!(
            "💾 Saved gazetteer index ({} records) to {}",
            self.artifact.range_record_count,
            path.display()
        );
        Ok(())
    }

    /// Loads an index for `settings` over `range`. A mismatch between the
    /// stored and supplied range, or stored and current predicates, is `IndexStale`.
    pub fn load(
        path: impl AsRef<Path>,
        range: Arc<Dataset>,
        settings: &TrainedSettings,
    ) -> Result<Self> {
        let path = path.as_ref();
        let artifact: IndexArtifact = serde_json::from_str(&fs::read_to_string(path)?)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(LinkageError::Configuration(format!(
                "{} has format version {}, expected {}",
                path.display(),
                artifact.format_version,
                ARTIFACT_FORMAT_VERSION
            )));
        }
        let index = Self {
            blocker: Blocker::new(artifact.predicates.clone(), &settings.field_specs),
            artifact,
            fields: settings.field_specs.clone(),
            range,
        };
        index.verify_settings(settings)?;
        index.verify(&index.range)?;
        info!("📂 Loaded gazetteer index from {}", path.display());
        Ok(index)
    }
}

/// The current index behind a lock. Readers take a cheap `Arc` snapshot;
/// a rebuild happens off-lock and is published with a single swap, so a
/// query never sees a half-built index.
pub struct SharedGazetteer {
    current: RwLock<Arc<GazetteerIndex>>,
}

impl SharedGazetteer {
    pub fn new(index: GazetteerIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    pub fn snapshot(&self) -> Arc<GazetteerIndex> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn swap(&self, index: GazetteerIndex) -> Arc<GazetteerIndex> {
        let fresh = Arc::new(index);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::clone(&fresh);
        fresh
    }

    pub fn rebuild(&self, range: Arc<Dataset>) -> Arc<GazetteerIndex> {
        let rebuilt = self.snapshot().rebuild(range);
        self.swap(rebuilt)
    }

    /// Returns an index valid for `range`, rebuilding first if the current one is stale.
    pub fn ensure_fresh(&self, range: &Arc<Dataset>) -> Result<Arc<GazetteerIndex>> {
        let current = self.snapshot();
        match current.verify(range) {
            Ok(()) => Ok(current),
            Err(LinkageError::IndexStale { expected, found }) => {
                warn!(
                    "🗂️ Gazetteer index is stale (built for {}, range is now {}), rebuilding",
                    expected, found
                );
                Ok(self.rebuild(Arc::clone(range)))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::PredicateKind;
    use crate::test_support::{acme_range, org, trained_settings};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_changed_range_is_stale() {
        let settings = trained_settings();
        let range = Arc::new(acme_range());
        let index = GazetteerIndex::from_settings(Arc::clone(&range), &settings);
        assert!(index.verify(&range).is_ok());
        assert!(index.verify_settings(&settings).is_ok());

        let mut records: Vec<Record> = range.records().cloned().collect();
        records.push(org("r99", "acme new", "2 main st", "5550099"));
        let changed = Dataset::new(records);
        assert!(matches!(
            index.verify(&changed),
            Err(LinkageError::IndexStale { .. })
        ));
    }

    #[test]
    fn test_changed_predicates_are_stale() {
        let mut settings = trained_settings();
        let index = GazetteerIndex::from_settings(Arc::new(acme_range()), &settings);
        settings.predicates = vec![Predicate::new("address", PredicateKind::FirstChars { k: 5 })];
        assert!(matches!(
            index.verify_settings(&settings),
            Err(LinkageError::IndexStale { .. })
        ));
    }

    #[test]
    fn test_ensure_fresh_rebuilds_and_swaps() {
        let settings = trained_settings();
        let shared = SharedGazetteer::new(GazetteerIndex::from_settings(
            Arc::new(acme_range()),
            &settings,
        ));
        let before = shared.snapshot();

        let same = Arc::new(acme_range());
        assert!(Arc::ptr_eq(&shared.ensure_fresh(&same).unwrap(), &before));

        let mut records: Vec<Record> = acme_range().records().cloned().collect();
        records.retain(|r| r.id != "r1");
        let smaller = Arc::new(Dataset::new(records));
        let rebuilt = shared.ensure_fresh(&smaller).unwrap();
        assert!(!Arc::ptr_eq(&rebuilt, &before));
        assert!(rebuilt.verify(&smaller).is_ok());
        assert!(Arc::ptr_eq(&shared.snapshot(), &rebuilt));
        // The old snapshot stays usable for readers that still hold it.
        assert!(before.verify(&acme_range()).is_ok());
    }

    #[test]
    fn test_save_load_round_trip() {
        let settings = trained_settings();
        let range = Arc::new(acme_range());
        let index = GazetteerIndex::from_settings(Arc::clone(&range), &settings);
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        index.save(&path).unwrap();

        let loaded = GazetteerIndex::load(&path, Arc::clone(&range), &settings).unwrap();
        assert_eq!(loaded.artifact, index.artifact);
        let query = org("q", "acme corp", "1 main st", "5551234");
        assert_eq!(loaded.candidates(&query), index.candidates(&query));

        let other = Arc::new(Dataset::new(vec![org("r1", "x", "y", "z")]));
        assert!(matches!(
            GazetteerIndex::load(&path, other, &settings),
            Err(LinkageError::IndexStale { .. })
        ));
    }

    #[test]
    fn test_readers_see_whole_indexes_during_swaps() {
        let settings = trained_settings();
        let full = Arc::new(acme_range());
        let smaller = Arc::new(Dataset::new(
            full.records().filter(|r| r.id != "r1").cloned().collect::<Vec<_>>(),
        ));
        let shared = Arc::new(SharedGazetteer::new(GazetteerIndex::from_settings(
            Arc::clone(&full),
            &settings,
        )));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut reads = 0usize;
                    while reads == 0 || !done.load(Ordering::SeqCst) {
                        let snap = shared.snapshot();
                        assert!(snap.verify(snap.range()).is_ok());
                        assert_eq!(snap.records_indexed(), snap.range().len());
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for i in 0..40 {
            let target = if i % 2 == 0 { &smaller } else { &full };
            let current = shared.ensure_fresh(target).unwrap();
            assert!(current.verify(target).is_ok());
        }
        done.store(true, Ordering::SeqCst);
        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert!(shared.snapshot().verify(&full).is_ok());
    }
}
