pub mod gazetteer_index;
pub mod matcher;
pub mod threshold;

pub use gazetteer_index::{GazetteerIndex, SharedGazetteer};
pub use matcher::{DomainMatchIter, Matcher};
pub use threshold::{ThresholdChoice, ThresholdSelector};
