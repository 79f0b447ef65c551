pub mod core;
pub mod matching;
pub mod stats_models;

pub use self::core::{Dataset, Record, RecordId};
pub use self::matching::{CandidatePair, DomainMatches, Label, LabeledPair, MatchResult};
pub use self::stats_models::{BlockingStats, MatchRunStats};
