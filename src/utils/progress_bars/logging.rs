// src/utils/progress_bars/logging.rs - Logging helpers shared by the engine stages
use log::{debug, info, warn};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Blocking,
    Training,
    Indexing,
    Matching,
    Threshold,
}

impl Stage {
    fn label(self) -> (&'static str, &'static str) {
        match self {
            Stage::Blocking => ("BLOCKING", "🧱"),
            Stage::Training => ("TRAINING", "🎓"),
            Stage::Indexing => ("INDEXING", "🗂️"),
            Stage::Matching => ("MATCHING", "🔗"),
            Stage::Threshold => ("THRESHOLD", "🎯"),
        }
    }
}

#[derive(Clone)]
pub struct PhaseLogger {
    stage_name: &'static str,
    stage_emoji: &'static str,
    start_time: Instant,
}

impl PhaseLogger {
    pub fn new(stage: Stage) -> Self {
        let (stage_name, stage_emoji) = stage.label();
        Self {
            stage_name,
            stage_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, details: &str) {
        info!(
            "[{}] {} 🚀 Starting {} ({})",
            self.stage_name,
            self.stage_emoji,
            self.stage_name.to_lowercase(),
            details
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.stage_name,
                self.stage_emoji,
                phase,
                details,
                elapsed.as_secs_f32()
            ),
            None => info!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.stage_name,
                self.stage_emoji,
                phase,
                elapsed.as_secs_f32()
            ),
        }
    }

    pub fn log_data_loaded(&self, count: usize, data_type: &str) {
        info!(
            "[{}] {} 📊 Loaded {} {} records",
            self.stage_name, self.stage_emoji, count, data_type
        );
    }

    pub fn log_excluded(&self, excluded: usize, total: usize) {
        if excluded > 0 {
            warn!(
                "[{}] {} 🚫 Excluded {} of {} records that violate the missing-field policy",
                self.stage_name, self.stage_emoji, excluded, total
            );
        }
    }

    pub fn log_excluded_pairs(&self, excluded: usize, total: usize) {
        if excluded > 0 {
            warn!(
                "[{}] {} 🚫 Dropped {} of {} pairs that violate the missing-field policy",
                self.stage_name, self.stage_emoji, excluded, total
            );
        }
    }

    pub fn log_pair_generation(&self, total_pairs: usize, queried_records: usize) {
        info!(
            "[{}] {} 📈 Candidate pairs: {} (from {} query records)",
            self.stage_name, self.stage_emoji, total_pairs, queried_records
        );
    }

    pub fn log_completion(&self, summary: &str) {
        info!(
            "[{}] {} ✅ Completed in {:.2}s: {}",
            self.stage_name,
            self.stage_emoji,
            self.start_time.elapsed().as_secs_f64(),
            summary
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️ {}", self.stage_name, self.stage_emoji, message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.stage_name, self.stage_emoji, message);
    }
}
