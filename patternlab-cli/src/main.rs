//! PatternLab CLI — label, augment, match, validate and scan commands.
//!
//! Commands:
//! - `add` — cut a window out of a CSV price file and store it as a template
//! - `augment` — add mirrored siblings for every original template
//! - `list` — print the stored templates
//! - `match` — classify a window of a CSV price file against the library
//! - `validate` — cross-validation, confusion matrix and threshold sweep
//! - `scan` — slide a window over a price file and report detections

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use patternlab_core::domain::{MatchSummary, TemplateMetadata};
use patternlab_core::preprocess::extract_fixed_length;
use patternlab_core::{PatternLibrary, PatternMatcher};
use patternlab_runner::export::{
    export_confusion_csv, export_report_json, generate_report, save_scan_artifacts,
};
use patternlab_runner::{load_csv, Backtester, RunnerConfig};

#[derive(Parser)]
#[command(
    name = "patternlab",
    about = "PatternLab CLI — DTW chart-pattern matching"
)]
struct Cli {
    /// Template library JSON file.
    #[arg(long, global = true, default_value = "patterns/library.json")]
    library: PathBuf,

    /// TOML config with engine and evaluation sections. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a labeled window of a CSV price file as a template.
    Add {
        /// Pattern label (e.g., double_top, bull_flag).
        label: String,

        /// CSV price file (timestamp,open,high,low,close[,volume]).
        csv: PathBuf,

        /// Index of the window's first bar.
        #[arg(long)]
        start: usize,

        /// Window length in bars.
        #[arg(long)]
        len: usize,

        #[arg(long)]
        symbol: Option<String>,

        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Add mirrored siblings for every original template.
    Augment,
    /// Print the stored templates.
    List {
        /// Only templates with this label.
        #[arg(long)]
        label: Option<String>,

        /// Emit JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Classify a window of a CSV price file.
    Match {
        csv: PathBuf,

        /// Window length in bars.
        #[arg(long)]
        len: usize,

        /// Index of the window's first bar. Defaults to the trailing window.
        #[arg(long)]
        start: Option<usize>,

        #[arg(long, default_value_t = 0.0)]
        min_confidence: f64,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Cross-validate the library and write a report.
    Validate {
        /// Overrides `[evaluation] min_confidence`.
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Overrides `[evaluation] folds`.
        #[arg(long)]
        folds: Option<usize>,

        /// Keep mirrored templates in the evaluation set.
        #[arg(long, default_value_t = false)]
        include_augmented: bool,

        /// Directory for report.md, report.json and confusion.csv.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Slide a window over a price file and report detections.
    Scan {
        csv: PathBuf,

        #[arg(long)]
        window: usize,

        #[arg(long, default_value_t = 1)]
        step: usize,

        #[arg(long, default_value_t = 0.7)]
        min_confidence: f64,

        /// Directory for detections.csv and scan.json.
        #[arg(long, default_value = "results/scan")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RunnerConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunnerConfig::default(),
    };

    match cli.command {
        Commands::Add {
            label,
            csv,
            start,
            len,
            symbol,
            timeframe,
        } => run_add(&cli.library, &config, label, &csv, start, len, symbol, timeframe),
        Commands::Augment => run_augment(&cli.library, &config),
        Commands::List { label, json } => run_list(&cli.library, &config, label.as_deref(), json),
        Commands::Match {
            csv,
            len,
            start,
            min_confidence,
            json,
        } => run_match(&cli.library, &config, &csv, len, start, min_confidence, json),
        Commands::Validate {
            min_confidence,
            folds,
            include_augmented,
            output_dir,
        } => run_validate(
            &cli.library,
            config,
            min_confidence,
            folds,
            include_augmented,
            output_dir.as_deref(),
        ),
        Commands::Scan {
            csv,
            window,
            step,
            min_confidence,
            output_dir,
        } => run_scan(&cli.library, &config, &csv, window, step, min_confidence, &output_dir),
    }
}

fn open_library(path: &Path, config: &RunnerConfig) -> Result<PatternLibrary> {
    let mut library = PatternLibrary::from_config(&config.engine);
    library
        .load(path)
        .with_context(|| format!("failed to load library {}", path.display()))?;
    debug!(path = %path.display(), templates = library.len(), "library opened");
    Ok(library)
}

fn save_library(library: &PatternLibrary, path: &Path) -> Result<()> {
    library
        .save(path)
        .with_context(|| format!("failed to save library {}", path.display()))
}

#[allow(clippy::too_many_arguments)]
fn run_add(
    library_path: &Path,
    config: &RunnerConfig,
    label: String,
    csv: &Path,
    start: usize,
    len: usize,
    symbol: Option<String>,
    timeframe: Option<String>,
) -> Result<()> {
    let series = load_csv(csv).with_context(|| format!("failed to read {}", csv.display()))?;
    let window = extract_fixed_length(&series.bars, start, len)?;

    let mut library = open_library(library_path, config)?;
    let metadata = TemplateMetadata {
        symbol,
        timeframe,
        ..TemplateMetadata::default()
    };
    let template = library.add_pattern(label, window, metadata)?;
    println!(
        "Added {} ({}, {} bars, quality {:.3})",
        template.id, template.label, template.bars_count, template.quality_score
    );

    save_library(&library, library_path)?;
    println!("Library: {} templates", library.len());
    Ok(())
}

fn run_augment(library_path: &Path, config: &RunnerConfig) -> Result<()> {
    let mut library = open_library(library_path, config)?;
    let added = library.augment_library();
    save_library(&library, library_path)?;
    println!("Added {added} augmented template(s); library now holds {}.", library.len());
    Ok(())
}

fn run_list(
    library_path: &Path,
    config: &RunnerConfig,
    label: Option<&str>,
    json: bool,
) -> Result<()> {
    let library = open_library(library_path, config)?;
    let templates = match label {
        Some(label) => library.templates_by_label(label),
        None => library.iter().collect(),
    };

    if json {
        let summaries: Vec<_> = templates.iter().map(|t| t.summary()).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if templates.is_empty() {
        println!("No templates in {}", library_path.display());
        return Ok(());
    }

    println!(
        "{:<36} {:<20} {:<8} {:<6} {:>5} {:>8} {:<10}",
        "ID", "Label", "Symbol", "TF", "Bars", "Quality", "Augmented"
    );
    println!("{}", "-".repeat(100));
    for t in &templates {
        println!(
            "{:<36} {:<20} {:<8} {:<6} {:>5} {:>8.3} {:<10}",
            t.id.as_str(),
            t.label.as_str(),
            t.symbol,
            t.timeframe,
            t.bars_count,
            t.quality_score,
            if t.is_augmented { "yes" } else { "" }
        );
    }
    println!();
    let labels: Vec<String> = library.labels().iter().map(|l| l.to_string()).collect();
    println!("{} template(s); labels: {}", templates.len(), labels.join(", "));
    Ok(())
}

fn run_match(
    library_path: &Path,
    config: &RunnerConfig,
    csv: &Path,
    len: usize,
    start: Option<usize>,
    min_confidence: f64,
    json: bool,
) -> Result<()> {
    let series = load_csv(csv).with_context(|| format!("failed to read {}", csv.display()))?;
    let start = match start {
        Some(start) => start,
        None => match series.bars.len().checked_sub(len) {
            Some(start) => start,
            None => bail!("series has {} bars, window needs {len}", series.bars.len()),
        },
    };
    let window = extract_fixed_length(&series.bars, start, len)?;

    let mut library = open_library(library_path, config)?;
    if library.is_empty() {
        bail!("library {} is empty; add templates first", library_path.display());
    }
    let query = library.preprocessor().checked_normalize(window)?;
    let matcher = PatternMatcher::from_config(&config.engine);
    let matches = matcher.find_matches(&mut library, &query, min_confidence);
    let summaries: Vec<MatchSummary> = matches.iter().map(|m| m.summary()).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!("Window: bars {start}..{} of {}", start + len, csv.display());
    if summaries.is_empty() {
        println!("No match at or above {min_confidence:.2}");
        return Ok(());
    }
    println!(
        "{:<20} {:>10} {:>4} {:>12}  {}",
        "Label", "Confidence", "k", "Avg Dist", "Best Template"
    );
    for s in &summaries {
        println!(
            "{:<20} {:>10.3} {:>4} {:>12.4}  {}",
            s.label.as_str(),
            s.confidence,
            s.k_neighbors,
            s.avg_distance,
            s.best_template.as_ref().map(|id| id.as_str()).unwrap_or("-")
        );
    }
    Ok(())
}

fn run_validate(
    library_path: &Path,
    mut config: RunnerConfig,
    min_confidence: Option<f64>,
    folds: Option<usize>,
    include_augmented: bool,
    output_dir: Option<&Path>,
) -> Result<()> {
    if let Some(min_confidence) = min_confidence {
        config.evaluation.min_confidence = min_confidence;
    }
    if let Some(folds) = folds {
        config.evaluation.folds = folds;
    }
    if include_augmented {
        config.evaluation.exclude_augmented = false;
    }
    config.evaluation.validate()?;

    let library = open_library(library_path, &config)?;
    let matcher = PatternMatcher::from_config(&config.engine);
    let eval = config.evaluation.clone();
    let backtester = Backtester::new(&library, &matcher).with_config(eval.clone());

    let report = backtester.run_configured()?;
    let confusion = backtester.confusion_matrix(eval.min_confidence, eval.exclude_augmented);
    let sweep = backtester.threshold_sweep(&eval.thresholds, eval.exclude_augmented);
    let markdown = generate_report(&report, Some(&confusion), &sweep);

    match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            std::fs::write(dir.join("report.md"), &markdown)?;
            std::fs::write(dir.join("report.json"), export_report_json(&report)?)?;
            std::fs::write(dir.join("confusion.csv"), export_confusion_csv(&confusion)?)?;
            println!("Report saved to: {}", dir.display());
        }
        None => print!("{markdown}"),
    }
    Ok(())
}

fn run_scan(
    library_path: &Path,
    config: &RunnerConfig,
    csv: &Path,
    window: usize,
    step: usize,
    min_confidence: f64,
    output_dir: &Path,
) -> Result<()> {
    if window == 0 || step == 0 {
        bail!("--window and --step must be positive");
    }
    let series = load_csv(csv).with_context(|| format!("failed to read {}", csv.display()))?;
    let mut library = open_library(library_path, config)?;
    if library.is_empty() {
        bail!("library {} is empty; add templates first", library_path.display());
    }
    library.ensure_index();

    let matcher = PatternMatcher::from_config(&config.engine);
    let report = Backtester::new(&library, &matcher).scan(&series.bars, window, step, min_confidence);

    println!(
        "Scanned {} window(s) of {} bars: {} detection(s)",
        report.windows_evaluated,
        window,
        report.detections.len()
    );
    for d in report.detections.iter().take(20) {
        println!(
            "  {:>6}..{:<6} {}  {:<20} {:.3}",
            d.start_index,
            d.end_index,
            d.start_time.format("%Y-%m-%d %H:%M"),
            d.label.as_str(),
            d.confidence
        );
    }
    if report.detections.len() > 20 {
        println!("  ... {} more", report.detections.len() - 20);
    }

    let dir = save_scan_artifacts(&report, output_dir)?;
    println!("Artifacts saved to: {}", dir.display());
    Ok(())
}
