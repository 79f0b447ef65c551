pub mod blocker;
pub mod predicate;
pub mod predicate_learner;

pub use blocker::{Blocker, InvertedIndex};
pub use predicate::{Predicate, PredicateKind};
pub use predicate_learner::{PredicateLearner, PredicateScore};
