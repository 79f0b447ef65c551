// src/lib.rs
pub mod blocking;
pub mod comparators;
pub mod error;
pub mod features;
pub mod ingest;
pub mod learning;
pub mod matching;
pub mod models;
pub mod settings;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use error::{LinkageError, Result};
