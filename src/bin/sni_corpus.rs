//! Command-line entry point for the dataset pipeline.
//!
//! Each stage runs on its own against a store directory:
//!
//! ```text
//! sni-corpus extract scraped/            # scraped pages -> extracted text
//! sni-corpus divide --dev 20 --test 10   # extracted text -> train/dev/test
//! sni-corpus preprocess train.jsonl dev.jsonl test.jsonl
//! sni-corpus evaluate predictions.jsonl --top-n 5
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sni_corpus::{
    export_partition, read_scraped_dir, DatasetStore, EvaluationError, ExtractOptions,
    ExtractionRun, LabelTemplate, MemoryStore, Partition, Partitioner, Predictions, Scorer,
    SplitPercentages,
};

#[derive(Debug, Parser)]
#[command(
    name = "sni-corpus",
    version,
    about = "Build an SNI company-classification dataset from scraped websites"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "SNI_CORPUS_STORE",
        default_value = "data/store",
        value_name = "DIR",
        help = "Store snapshot directory"
    )]
    store: PathBuf,
    #[arg(
        long,
        global = true,
        default_value = "info",
        help = "Log level used when RUST_LOG is not set"
    )]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract text from scraped pages and store it per company.
    Extract(ExtractArgs),
    /// Split extracted company text into train/dev/test partitions.
    Divide(DivideArgs),
    /// Write the partitions as labeled JSON-lines corpora.
    Preprocess(PreprocessArgs),
    /// Score model predictions against the test partition.
    Evaluate(EvaluateArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    #[arg(value_name = "SCRAPED_DIR", help = "Directory of scraped page JSON files")]
    scraped_dir: PathBuf,
    #[arg(long, help = "Skip <meta> title/description")]
    no_meta: bool,
    #[arg(long, help = "Skip body text")]
    no_body: bool,
    #[arg(long, help = "Only take text from <p> elements")]
    paragraphs_only: bool,
    #[arg(long, help = "Keep links, scripts, cookie banners and year strings")]
    no_filter: bool,
}

#[derive(Debug, Args)]
struct DivideArgs {
    #[arg(long, default_value_t = 70, help = "Percent of companies for training")]
    train: u32,
    #[arg(long, default_value_t = 20, help = "Percent of companies for evaluation")]
    dev: u32,
    #[arg(long, default_value_t = 10, help = "Percent of companies for testing")]
    test: u32,
}

#[derive(Debug, Args)]
struct PreprocessArgs {
    train_out: PathBuf,
    dev_out: PathBuf,
    test_out: PathBuf,
    #[arg(long, default_value_t = 300, help = "Minimum characters per company")]
    min_data_length: usize,
}

#[derive(Debug, Args)]
struct EvaluateArgs {
    #[arg(
        value_name = "PREDICTIONS",
        help = "JSON lines of {\"company_id\": ..., \"cats\": {code: score}}"
    )]
    predictions: PathBuf,
    #[arg(long, default_value_t = 300, help = "Minimum characters per company")]
    min_data_length: usize,
    #[arg(long, default_value_t = 5, help = "Number of top predictions to check")]
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct PredictionLine {
    company_id: String,
    cats: Predictions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .try_init();

    match cli.command {
        Command::Extract(args) => extract(&cli.store, args),
        Command::Divide(args) => divide(&cli.store, args),
        Command::Preprocess(args) => preprocess(&cli.store, args),
        Command::Evaluate(args) => evaluate(&cli.store, args),
    }
}

fn open_store(dir: &Path) -> Result<MemoryStore> {
    MemoryStore::open(dir).with_context(|| format!("failed to open store at {}", dir.display()))
}

fn extract(store_dir: &Path, args: ExtractArgs) -> Result<()> {
    let mut store = open_store(store_dir)?;
    let pages = read_scraped_dir(&args.scraped_dir)
        .with_context(|| format!("failed to read {}", args.scraped_dir.display()))?;

    let options = ExtractOptions::default()
        .with_filter(!args.no_filter)
        .with_extract_meta(!args.no_meta)
        .with_extract_body(!args.no_body)
        .with_paragraphs_only(args.paragraphs_only);
    ExtractionRun::new(options).run(&pages, &mut store)?;

    store.save(store_dir)?;
    Ok(())
}

fn divide(store_dir: &Path, args: DivideArgs) -> Result<()> {
    // Reject a bad split before the store is even opened.
    let split = SplitPercentages::new(args.train, args.dev, args.test).validate()?;
    let mut store = open_store(store_dir)?;
    Partitioner::new(split).run(&mut store)?;
    store.save(store_dir)?;
    Ok(())
}

fn preprocess(store_dir: &Path, args: PreprocessArgs) -> Result<()> {
    let store = open_store(store_dir)?;
    let template = LabelTemplate::from_store(&store)?;
    info!(labels = template.len(), "built label template");

    let outputs = [
        (Partition::Train, &args.train_out),
        (Partition::Dev, &args.dev_out),
        (Partition::Test, &args.test_out),
    ];
    for (partition, path) in outputs {
        let summary = export_partition(&store, partition, &template, args.min_data_length, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        for (label, count) in &summary.per_label {
            info!(?partition, sni = %label, documents = count, "documents per label");
        }
    }
    Ok(())
}

fn evaluate(store_dir: &Path, args: EvaluateArgs) -> Result<()> {
    let store = open_store(store_dir)?;
    let predictions = read_predictions(&args.predictions)?;
    let mut scorer = Scorer::new(args.top_n, args.min_data_length)?;

    info!("starting evaluation");
    for doc in store.partition(Partition::Test)? {
        let Some(cats) = predictions.get(&doc.company_id) else {
            warn!(company_id = %doc.company_id, "no predictions for company, skipping");
            continue;
        };
        scorer.score_document(&doc, |_| Ok::<_, EvaluationError>(cats.clone()))?;
    }
    scorer.report().log();
    Ok(())
}

fn read_predictions(path: &Path) -> Result<HashMap<String, Predictions>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read predictions from {}", path.display()))?;
    let mut out = HashMap::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: PredictionLine = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: malformed prediction", path.display(), lineno + 1))?;
        out.insert(parsed.company_id, parsed.cats);
    }
    Ok(out)
}
