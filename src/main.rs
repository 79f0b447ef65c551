use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use gazetteer_lib::features::FeatureVectorizer;
use gazetteer_lib::ingest::{default_fields, load_field_definitions, read_dataset, write_matches};
use gazetteer_lib::learning::{ActiveLearner, ConsoleOracle, TrainingCorpus};
use gazetteer_lib::matching::{GazetteerIndex, Matcher, SharedGazetteer, ThresholdSelector};
use gazetteer_lib::models::Dataset;
use gazetteer_lib::settings::TrainedSettings;
use gazetteer_lib::utils::config::EngineConfig;
use gazetteer_lib::utils::constants::{
    DEFAULT_INDEX_FILE, DEFAULT_OUTPUT_FILE, DEFAULT_SETTINGS_FILE, DEFAULT_TRAINING_FILE,
};
use gazetteer_lib::utils::env::load_env;
use gazetteer_lib::utils::get_memory_usage;
use gazetteer_lib::utils::progress_bars::progress_callback::{create_simple_callback, ProgressTracker};
use gazetteer_lib::utils::progress_bars::progress_config::ProgressConfig;
use gazetteer_lib::LinkageError;

#[derive(Parser)]
#[command(author, version, about = "Link a messy domain dataset against a canonical gazetteer", long_about = None)]
struct Args {
    /// Messy records to link
    #[arg(long, default_value = "domain.csv")]
    domain: PathBuf,

    /// Canonical records
    #[arg(long, default_value = "range.csv")]
    range: PathBuf,

    /// Trained settings; created by an interactive session when absent
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Persisted gazetteer index
    #[arg(long, default_value = DEFAULT_INDEX_FILE)]
    index: PathBuf,

    /// Labeled pairs, appended to during training
    #[arg(long, default_value = DEFAULT_TRAINING_FILE)]
    training: PathBuf,

    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    output: PathBuf,

    /// JSON array of field definitions; organization defaults otherwise
    #[arg(long)]
    fields: Option<PathBuf>,

    /// Minimum score to report; overrides MATCH_THRESHOLD
    #[arg(long)]
    threshold: Option<f64>,

    /// Match with the calibrated threshold instead of the fixed one
    #[arg(long)]
    use_calibrated_threshold: bool,

    /// Matches reported per domain record
    #[arg(long)]
    matches: Option<usize>,

    #[arg(long)]
    recall_weight: Option<f64>,

    /// Ignore existing settings and label again
    #[arg(long)]
    retrain: bool,

    /// Verbose logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn train_settings(
    args: &Args,
    config: &EngineConfig,
    domain: &Arc<Dataset>,
    range: &Arc<Dataset>,
) -> Result<TrainedSettings> {
    let fields = match &args.fields {
        Some(path) => load_field_definitions(path)
            .with_context(|| format!("Failed to read field definitions from {}", path.display()))?,
        None => default_fields(&[domain.as_ref(), range.as_ref()]),
    };
    let display_fields: Vec<String> = fields
        .iter()
        .map(|f| f.field.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let vectorizer = FeatureVectorizer::new(fields).context("Invalid field configuration")?;

    let mut learner = ActiveLearner::new(Arc::clone(domain), Arc::clone(range), vectorizer, config)
        .with_corpus(TrainingCorpus::new(&args.training))
        .context("Failed to load prior training labels")?;
    info!(
        "🎓 Labeling session {} ({} prior labels, {} candidate pairs)",
        learner.session_id(),
        learner.labeled().len(),
        learner.pool_len()
    );

    let stdin = io::stdin();
    let mut oracle = ConsoleOracle::new(stdin.lock(), io::stdout(), display_fields);
    let settings = loop {
        let accepted = learner.run(&mut oracle)?;
        match learner.finish() {
            Ok(settings) => break settings,
            Err(LinkageError::InsufficientData(reason)) if accepted > 0 => {
                warn!("Cannot train yet ({}), labeling continues", reason);
            }
            Err(e) => return Err(e).context("Training did not produce usable settings"),
        }
    };
    settings
        .save(&args.settings)
        .with_context(|| format!("Failed to save settings to {}", args.settings.display()))?;
    Ok(settings)
}

fn load_or_build_index(
    path: &Path,
    range: &Arc<Dataset>,
    settings: &TrainedSettings,
) -> Result<Arc<GazetteerIndex>> {
    let index = if path.exists() {
        match GazetteerIndex::load(path, Arc::clone(range), settings) {
            Ok(index) => index,
            Err(e) => {
                warn!("Stored index unusable ({}), rebuilding", e);
                GazetteerIndex::from_settings(Arc::clone(range), settings)
            }
        }
    } else {
        GazetteerIndex::from_settings(Arc::clone(range), settings)
    };
    let shared = SharedGazetteer::new(index);
    let current = shared.ensure_fresh(range)?;
    current
        .save(path)
        .with_context(|| format!("Failed to save index to {}", path.display()))?;
    Ok(current)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    load_env();

    let start_time = Instant::now();
    let mut config = EngineConfig::from_env();
    if let Some(threshold) = args.threshold {
        config.matching.threshold = threshold;
    }
    if let Some(n) = args.matches {
        config.matching.matches_per_record = n;
    }
    if let Some(weight) = args.recall_weight {
        config.matching.recall_weight = weight;
    }
    config.log_config();
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build_global()
    {
        warn!("Could not size the worker pool: {}", e);
    }

    let progress = ProgressConfig::from_env();
    let mut tracker = ProgressTracker::new(Some(create_simple_callback("pipeline")));

    tracker.set_phase("Reading datasets");
    let domain = Arc::new(
        read_dataset(&args.domain)
            .with_context(|| format!("Failed to read {}", args.domain.display()))?,
    );
    let range = Arc::new(
        read_dataset(&args.range)
            .with_context(|| format!("Failed to read {}", args.range.display()))?,
    );

    tracker.set_phase("Preparing settings");
    let settings = if args.settings.exists() && !args.retrain {
        let settings = TrainedSettings::load(&args.settings)
            .with_context(|| format!("Failed to load settings from {}", args.settings.display()))?;
        if let Some(path) = &args.fields {
            let fields = load_field_definitions(path)
                .with_context(|| format!("Failed to read field definitions from {}", path.display()))?;
            settings.check_fields(&fields).with_context(|| {
                format!(
                    "{} does not match the fields {} was trained with",
                    path.display(),
                    args.settings.display()
                )
            })?;
        }
        settings
    } else {
        train_settings(&args, &config, &domain, &range)?
    };

    tracker.set_phase("Indexing gazetteer");
    let index = load_or_build_index(&args.index, &range, &settings)?;
    let matcher = Matcher::new(&settings, index).context("Settings and index disagree")?;

    tracker.set_phase("Calibrating threshold");
    let calibration = domain.sample(config.learner.sample_size, config.learner.seed);
    let threshold = match ThresholdSelector::select(&matcher, &calibration, config.matching.recall_weight) {
        Ok(choice) => {
            info!(
                "📏 Calibrated threshold {:.4} (F {:.3}); fixed threshold {}",
                choice.threshold, choice.f_score, config.matching.threshold
            );
            if args.use_calibrated_threshold {
                choice.threshold
            } else {
                config.matching.threshold
            }
        }
        Err(LinkageError::InsufficientData(reason)) => {
            warn!("Threshold calibration skipped: {}", reason);
            config.matching.threshold
        }
        Err(e) => return Err(e).context("Threshold calibration failed"),
    };

    tracker.set_phase("Matching");
    let (results, stats) = matcher
        .match_all(
            &domain,
            threshold,
            config.matching.matches_per_record,
            &progress,
        )
        .context("Matching failed")?;
    tracker.update_progress(stats.records_linked, stats.domain_records);
    let rows = write_matches(
        &args.output,
        &results,
        &file_name(&args.domain),
        &file_name(&args.range),
    )
    .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracker.finish_phase(&format!("{} rows written", rows));

    info!("=== Linkage Summary ===");
    info!("Domain records: {}", stats.domain_records);
    info!("Records linked: {} ({:.1}%)", stats.records_linked, stats.link_rate() * 100.0);
    info!("Records excluded: {}", stats.records_excluded);
    info!("Candidates scored: {}", stats.candidates_scored);
    info!("Total execution time: {:.2?}", start_time.elapsed());
    if progress.should_show_memory() {
        info!("Final memory usage: {} MB", get_memory_usage());
    }
    Ok(())
}
