// src/bin/report_model_weights.rs

use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::env;

use gazetteer_lib::settings::TrainedSettings;
use gazetteer_lib::utils::constants::DEFAULT_SETTINGS_FILE;
use gazetteer_lib::utils::env::load_env;

fn print_model_report(settings: &TrainedSettings) {
    let model = &settings.model;
    println!("    --------------------------------------------------");
    println!(
        "    Classifier - {} features (Training rounds: {})",
        model.weights.len(),
        model.trials
    );
    println!("    --------------------------------------------------");

    if model.trials == 0 {
        println!("      Model was never trained. Weights are all 0.");
        return;
    }

    let mut weighted_features: Vec<(&str, f64)> = model
        .feature_names
        .iter()
        .map(String::as_str)
        .zip(model.weights.iter().copied())
        .collect();

    // Most influential first
    weighted_features.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(Ordering::Equal)
    });

    println!("      Features (Sorted by Absolute Weight):");
    println!("      ------------------------------------------------------");
    println!("      | {:<35} | {:>10} |", "Feature Name", "Weight");
    println!("      |---------------------------------------|------------|");
    for (name, weight) in &weighted_features {
        println!("      | {:<35} | {:>10.4} |", name, weight);
    }
    println!("      |---------------------------------------|------------|");
    println!("      | {:<35} | {:>10.4} |", "(Bias Term)", model.bias);
    println!("      ------------------------------------------------------\n");
}

fn main() -> Result<()> {
    load_env();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SETTINGS_FILE.to_string());
    let settings = TrainedSettings::load(&path)
        .with_context(|| format!("Failed to load settings from {}", path))?;

    println!("--- Gazetteer Model Weight Report ---");
    println!("\nSettings: {}", path);
    println!("Configuration fingerprint: {}\n", settings.config_fingerprint);

    println!("==================================================");
    println!("  Blocking predicates");
    println!("==================================================");
    for predicate in &settings.predicates {
        println!("    {}", predicate);
    }
    println!();

    print_model_report(&settings);
    println!("--- End of Report ---");
    Ok(())
}
