pub mod feature_cache;
pub mod vectorizer;

pub use feature_cache::{create_shared_cache, FeatureCache, SharedFeatureCache};
pub use vectorizer::FeatureVectorizer;
