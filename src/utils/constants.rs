// src/utils/constants.rs

/// Similarity reported for a field when either value is missing. The separate
/// missing indicator carries the signal; this value must not look like a
/// confident disagreement.
pub const NEUTRAL_SIMILARITY: f64 = 0.5;

/// Prefix lengths tried for `FirstChars` predicates during predicate learning.
pub const PREFIX_LENGTHS: [usize; 2] = [3, 5];

/// N-gram sizes tried for `SortedTokenNgram` predicates during predicate learning.
pub const TOKEN_NGRAM_SIZES: [usize; 1] = [2];

/// Bumped whenever the settings or index artifact layout changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

pub const DEFAULT_SETTINGS_FILE: &str = "gazetteer_learned_settings.json";
pub const DEFAULT_INDEX_FILE: &str = "gazetteer_index.json";
pub const DEFAULT_TRAINING_FILE: &str = "gazetteer_training.jsonl";
pub const DEFAULT_OUTPUT_FILE: &str = "gazetteer_output.csv";
