// src/models/core.rs
use once_cell::sync::OnceCell;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub type RecordId = String;

/// One normalized row of a dataset. Values are already cleaned upstream;
/// an empty string is treated the same as an absent value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: BTreeMap<String, Option<String>>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter, mostly for fixtures and ingestion.
    pub fn with_field(mut self, name: &str, value: Option<&str>) -> Self {
        self.fields
            .insert(name.to_string(), value.map(|v| v.to_string()));
        self
    }

    /// Returns the value of a field, or `None` when it is absent, null or empty.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.trim().is_empty())
    }
}

/// An immutable keyed collection of records. Iteration is ordered by id.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: BTreeMap<RecordId, Record>,
    fingerprint: OnceCell<String>,
}

impl Dataset {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
            fingerprint: OnceCell::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.keys()
    }

    /// All non-missing values of one field, in id order. Used to assemble text corpora.
    pub fn field_values<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.records.values().filter_map(move |r| r.value(field))
    }

    /// SHA-256 over the full content. Two datasets with the same fingerprint are
    /// interchangeable for indexing purposes.
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| {
            let mut hasher = Sha256::new();
            for (id, record) in &self.records {
                hasher.update(id.as_bytes());
                hasher.update([0x1e]);
                for (field, value) in &record.fields {
                    hasher.update(field.as_bytes());
                    hasher.update([0x1f]);
                    match value {
                        Some(v) => hasher.update(v.as_bytes()),
                        None => hasher.update([0x00]),
                    }
                    hasher.update([0x1f]);
                }
                hasher.update([0x1d]);
            }
            hex::encode(hasher.finalize())
        })
    }

    /// Deterministic random subset of at most `size` records.
    pub fn sample(&self, size: usize, seed: u64) -> Dataset {
        if size >= self.records.len() {
            return Dataset::new(self.records.values().cloned());
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let ids: Vec<&RecordId> = self.records.keys().collect();
        let picked = ids
            .choose_multiple(&mut rng, size)
            .filter_map(|id| self.records.get(*id).cloned());
        Dataset::new(picked)
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Dataset::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> Record {
        Record::new("d1")
            .with_field("name", Some("acme corp"))
            .with_field("phone", Some(""))
    }

    #[test]
    fn test_empty_value_is_missing() {
        let record = acme();
        assert_eq!(record.value("name"), Some("acme corp"));
        assert_eq!(record.value("phone"), None);
        assert_eq!(record.value("address"), None);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Dataset::new(vec![acme()]);
        let b = Dataset::new(vec![acme()]);
        assert_eq!(a.fingerprint(), b.fingerprint());

        let changed = Dataset::new(vec![acme().with_field("name", Some("acme inc"))]);
        assert_ne!(a.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn test_sample_is_deterministic() {
        let data: Dataset = (0..50)
            .map(|i| Record::new(format!("r{}", i)).with_field("name", Some("x")))
            .collect();
        let s1 = data.sample(10, 7);
        let s2 = data.sample(10, 7);
        assert_eq!(s1.len(), 10);
        assert_eq!(s1.ids().collect::<Vec<_>>(), s2.ids().collect::<Vec<_>>());
        assert_eq!(data.sample(100, 7).len(), 50);
    }
}
