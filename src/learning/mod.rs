pub mod active_learner;
pub mod classifier;
pub mod oracle;
pub mod training_corpus;

pub use active_learner::{ActiveLearner, LearnerState};
pub use classifier::{Classifier, ClassifierModel, TrainingSummary};
pub use oracle::{ConsoleOracle, FnOracle, LabelOracle, OracleLabel, ScriptedOracle};
pub use training_corpus::TrainingCorpus;
