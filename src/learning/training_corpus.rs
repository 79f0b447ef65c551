// src/learning/training_corpus.rs
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::LabeledPair;

/// Append-only JSON Lines log of labeled pairs. Existing lines are never
/// rewritten, so labels from earlier sessions survive in their original order.
#[derive(Debug, Clone)]
pub struct TrainingCorpus {
    path: PathBuf,
}

impl TrainingCorpus {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded labels in file order. A missing file is an empty corpus.
    pub fn load(&self) -> Result<Vec<LabeledPair>> {
        if !self.path.exists() {
            debug!("No training corpus at {}", self.path.display());
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut labeled = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            labeled.push(serde_json::from_str(&line)?);
        }
        info!(
            "📚 Loaded {} labeled pairs from {}",
            labeled.len(),
            self.path.display()
        );
        Ok(labeled)
    }

    pub fn append(&self, labeled: &[LabeledPair]) -> Result<()> {
        if labeled.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for pair in labeled {
            serde_json::to_writer(&mut writer, pair)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        debug!(
            "Appended {} labeled pairs to {}",
            labeled.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidatePair, Label};
    use tempfile::tempdir;
    use uuid::Uuid;

    fn labeled(d: &str, label: Label) -> LabeledPair {
        LabeledPair::new(
            CandidatePair::new(d, "r1"),
            label,
            vec![0.1, 1.0 / 3.0],
            "fp",
            Uuid::new_v4(),
        )
    }

    #[test]
    fn test_append_preserves_order_across_sessions() {
        let dir = tempdir().unwrap();
        let corpus = TrainingCorpus::new(dir.path().join("training.jsonl"));
        assert!(corpus.load().unwrap().is_empty());

        let first = vec![labeled("d1", Label::Match), labeled("d2", Label::Distinct)];
        corpus.append(&first).unwrap();
        let second = vec![labeled("d3", Label::Match)];
        TrainingCorpus::new(corpus.path()).append(&second).unwrap();

        let loaded = corpus.load().unwrap();
        let ids: Vec<&str> = loaded.iter().map(|l| l.pair.domain_id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"]);
        assert_eq!(loaded[0], first[0]);
        assert_eq!(loaded[2].features[1].to_bits(), (1.0f64 / 3.0).to_bits());
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("training.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();
        assert!(TrainingCorpus::new(&path).load().is_err());
    }
}
