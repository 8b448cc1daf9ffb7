//! FeatureLab CLI: feature export and helper commands.
//!
//! Commands:
//! - `export`: derive features from a bar file (or synthetic bars) into CSV
//! - `schema`: print the exported column list for a configuration
//! - `synthetic`: write a seeded synthetic bar file

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use featurelab_core::catalog::{self, FeatureSchema};
use featurelab_runner::{
    generate_synthetic_bars, load_bars_csv, run_pipeline, write_bars_csv, CsvSink,
    PipelineConfig, RunSummary,
};

#[derive(Parser)]
#[command(
    name = "featurelab",
    about = "FeatureLab CLI: causal feature export for OHLC bar data"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaArg {
    Classic,
    Extended,
}

impl From<SchemaArg> for FeatureSchema {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Classic => FeatureSchema::Classic,
            SchemaArg::Extended => FeatureSchema::Extended,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Derive features from bars and write one row per emitted bar.
    Export {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bar CSV with a timestamp,open,high,low,close header.
        #[arg(long, conflicts_with = "synthetic")]
        input: Option<PathBuf>,

        /// Use this many synthetic bars instead of an input file.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Seed for synthetic bars.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output file, overriding the config.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Column set, overriding the config.
        #[arg(long, value_enum)]
        schema: Option<SchemaArg>,
    },
    /// Print the exported column names, one per line.
    Schema {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Column set, overriding the config.
        #[arg(long, value_enum)]
        schema: Option<SchemaArg>,
    },
    /// Write a seeded synthetic bar file.
    Synthetic {
        /// Number of daily bars.
        #[arg(long, default_value_t = 1000)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// First bar date (YYYY-MM-DD).
        #[arg(long, default_value = "2010-01-04")]
        start: String,

        #[arg(long, default_value = "bars.csv")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            config,
            input,
            synthetic,
            seed,
            output,
            schema,
        } => run_export_cmd(config, input, synthetic, seed, output, schema),
        Commands::Schema { config, schema } => run_schema_cmd(config, schema),
        Commands::Synthetic {
            bars,
            seed,
            start,
            output,
        } => run_synthetic_cmd(bars, seed, &start, output),
    }
}

/// Log to stderr so stdout stays clean for `schema` output.
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing")
}

fn load_config(path: Option<PathBuf>, schema: Option<SchemaArg>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(schema) = schema {
        config.features.schema = schema.into();
    }
    Ok(config)
}

fn run_export_cmd(
    config_path: Option<PathBuf>,
    input: Option<PathBuf>,
    synthetic: Option<usize>,
    seed: u64,
    output: Option<PathBuf>,
    schema: Option<SchemaArg>,
) -> Result<()> {
    let mut config = load_config(config_path, schema)?;
    if let Some(output) = output {
        config.output = output;
    }

    let data = match (input, synthetic) {
        (Some(path), None) => {
            load_bars_csv(&path).with_context(|| format!("loading bars {}", path.display()))?
        }
        (None, Some(n)) => {
            info!(bars = n, seed, "generating synthetic bars");
            generate_synthetic_bars(n, seed, default_start()?)
        }
        (None, None) => bail!("one of --input or --synthetic is required"),
        (Some(_), Some(_)) => bail!("--input and --synthetic are mutually exclusive"),
    };

    let mut sink = CsvSink::new(&config.output);
    let summary = run_pipeline(&config, &data, &mut sink)
        .with_context(|| format!("exporting to {}", config.output.display()))?;
    print_summary(&summary, &config);
    Ok(())
}

fn run_schema_cmd(config_path: Option<PathBuf>, schema: Option<SchemaArg>) -> Result<()> {
    let config = load_config(config_path, schema)?;
    let set = catalog::build(&config.features).context("building feature graph")?;
    for name in set.assembler().header() {
        println!("{name}");
    }
    eprintln!(
        "{} columns, {} derived series, {} warm-up bars",
        set.assembler().header().len(),
        set.graph().node_count(),
        set.warmup_bars()
    );
    Ok(())
}

fn run_synthetic_cmd(n: usize, seed: u64, start: &str, output: PathBuf) -> Result<()> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("invalid --start '{start}'"))?
        .and_hms_opt(0, 0, 0)
        .context("invalid --start time")?;
    let data = generate_synthetic_bars(n, seed, start);
    write_bars_csv(&output, &data.bars)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Wrote {n} bars to {} (dataset hash {})",
        output.display(),
        &data.dataset_hash[..16]
    );
    Ok(())
}

fn default_start() -> Result<chrono::NaiveDateTime> {
    NaiveDate::from_ymd_opt(2010, 1, 4)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid default start date")
}

fn print_summary(summary: &RunSummary, config: &PipelineConfig) {
    println!();
    println!("=== Export Summary ===");
    println!("Instrument:     {}", summary.instrument);
    println!("Run ID:         {}", &summary.run_id[..16]);
    println!("Dataset hash:   {}", &summary.dataset_hash[..16]);
    if summary.is_synthetic {
        println!("Data:           SYNTHETIC");
    }
    println!("Bars processed: {}", summary.bars_processed);
    println!("Warm-up bars:   {}", summary.warmup_bars);
    println!("Columns:        {}", summary.columns);
    println!("Rows written:   {}", summary.rows_written);
    if summary.rows_skipped > 0 {
        println!("Rows skipped:   {}", summary.rows_skipped);
    }
    if let (Some(first), Some(last)) = (summary.first_row, summary.last_row) {
        println!("Date range:     {first} to {last}");
    }
    println!("Output:         {}", config.output.display());
}
