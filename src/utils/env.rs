// src/utils/env.rs
use log::{debug, info};
use std::env;
use std::str::FromStr;

/// Loads `.env` if present. A missing file is not an error; the process
/// environment is used as-is.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => info!("Loaded environment variables from {}", path.display()),
        Err(e) => debug!("No .env file loaded ({}), using system environment", e),
    }
}

/// Reads and parses an environment variable, falling back to `default`
/// when it is unset or unparsable.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
