//! Stageload CLI - transform, load and validate staged datasets
//!
//! # Main Commands
//!
//! ```bash
//! stageload transform data/raw/churn.csv --preset churn -o staged.csv
//! stageload load staged.csv --table telco_customer_data
//! stageload validate staged.csv --preset churn --table telco_customer_data
//! stageload run data/raw/*.json --preset air        # full pipeline
//! ```
//!
//! Store credentials come from the environment (`SUPABASE_URL`,
//! `SUPABASE_KEY`; a `.env` file is honored). Table, batch size and retry
//! budget have defaults and per-command flag overrides.

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stageload::load::failed_records;
use stageload::parser::{self, sensor};
use stageload::validation::{check_records, validate_readback, CheckSpec};
use stageload::{
    pipeline, Config, DatasetKind, LoadOptions, Loader, RunOptions, StoreClient, StoreTarget,
    TransformSpec,
};

#[derive(Parser)]
#[command(name = "stageload")]
#[command(about = "Batched, retrying bulk-loader for staged datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Built-in dataset presets.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// Telco customer churn CSV export
    Churn,
    /// City air-quality sensor documents
    Air,
}

impl Preset {
    fn kind(self) -> DatasetKind {
        match self {
            Preset::Churn => DatasetKind::Churn,
            Preset::Air => DatasetKind::AirQuality,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Transform raw inputs into an enriched staged dataset
    Transform {
        /// Input files: CSV, or JSON sensor documents
        inputs: Vec<PathBuf>,

        /// Built-in dataset preset
        #[arg(long)]
        preset: Option<Preset>,

        /// Transform spec JSON file (overrides --preset rules)
        #[arg(long)]
        spec: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the record-level schema check
        #[arg(long)]
        no_check: bool,
    },

    /// Load a staged dataset into the remote store
    Load {
        /// Staged CSV file
        input: PathBuf,

        /// Target table (default: preset table or STAGELOAD_TABLE)
        #[arg(long)]
        table: Option<String>,

        /// Records per chunk
        #[arg(long)]
        batch_size: Option<usize>,

        /// Retries after the first attempt
        #[arg(long)]
        max_retries: Option<u32>,

        /// Columns coerced to canonical timestamp text on the wire
        #[arg(long = "time-column")]
        time_columns: Vec<String>,

        /// Write the load report JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Compare a staged dataset against the loaded table
    Validate {
        /// Staged CSV file (the reference copy)
        input: PathBuf,

        /// Built-in dataset preset (derives the checks)
        #[arg(long)]
        preset: Option<Preset>,

        /// Transform spec JSON file (derives the checks)
        #[arg(long)]
        spec: Option<PathBuf>,

        /// Table to read back
        #[arg(long)]
        table: Option<String>,
    },

    /// Full pipeline: transform, load, read back, validate
    Run {
        /// Input files: CSV, or JSON sensor documents
        inputs: Vec<PathBuf>,

        /// Built-in dataset preset
        #[arg(long)]
        preset: Option<Preset>,

        /// Transform spec JSON file (overrides --preset rules)
        #[arg(long)]
        spec: Option<PathBuf>,

        /// Target table (default: preset table or STAGELOAD_TABLE)
        #[arg(long)]
        table: Option<String>,

        /// Also write the enriched dataset to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the load report JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Skip the post-load read-back comparison
        #[arg(long)]
        no_readback: bool,
    },
}

#[tokio::main]
async fn main() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Transform {
            inputs,
            preset,
            spec,
            output,
            no_check,
        } => cmd_transform(&inputs, preset, spec.as_deref(), output.as_deref(), no_check),

        Commands::Load {
            input,
            table,
            batch_size,
            max_retries,
            time_columns,
            report,
        } => {
            cmd_load(
                &input,
                table,
                batch_size,
                max_retries,
                time_columns,
                report.as_deref(),
            )
            .await
        }

        Commands::Validate {
            input,
            preset,
            spec,
            table,
        } => cmd_validate(&input, preset, spec.as_deref(), table).await,

        Commands::Run {
            inputs,
            preset,
            spec,
            table,
            output,
            report,
            no_readback,
        } => {
            cmd_run(
                &inputs,
                preset,
                spec.as_deref(),
                table,
                output.as_deref(),
                report.as_deref(),
                no_readback,
            )
            .await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn cmd_transform(
    inputs: &[PathBuf],
    preset: Option<Preset>,
    spec_path: Option<&Path>,
    output: Option<&Path>,
    no_check: bool,
) -> CliResult {
    let (spec, kind) = resolve_spec(preset, spec_path)?;
    let (records, headers) = read_inputs(inputs)?;
    info!(records = records.len(), "read raw records");

    let outcome = stageload::transform(&records, &spec)?;
    info!("{}", outcome.summary());
    for skip in outcome.skipped.iter().take(5) {
        warn!(row = skip.row, reason = %skip.reason, "skipped record");
    }

    if !no_check {
        if let Some(kind) = kind {
            let check = check_records(&outcome.records, kind);
            if check.invalid > 0 {
                warn!(valid = check.valid, invalid = check.invalid, "schema check");
                for (row, errors) in check.errors.iter().take(5) {
                    warn!(row, errors = %errors.join("; "), "invalid record");
                }
            } else {
                info!(valid = check.valid, "all records passed the schema check");
            }
        }
    }

    let columns = spec.output_columns(&headers);
    match output {
        Some(path) => {
            parser::write_file(path, &outcome.records, &columns)?;
            info!(file = %path.display(), rows = outcome.records.len(), "wrote staged dataset");
        }
        None => print!("{}", parser::write_records(&outcome.records, &columns)?),
    }
    Ok(())
}

async fn cmd_load(
    input: &Path,
    table: Option<String>,
    batch_size: Option<usize>,
    max_retries: Option<u32>,
    time_columns: Vec<String>,
    report_path: Option<&Path>,
) -> CliResult {
    let config = Config::from_env()?;
    let store = StoreClient::new(&config.store)?;

    let dataset = parser::read_file(input)?;
    info!(file = %input.display(), rows = dataset.records.len(), "read staged dataset");

    let mut options = LoadOptions::from(&config.load);
    if let Some(size) = batch_size {
        options.batch_size = size;
    }
    if let Some(retries) = max_retries {
        options.max_retries = retries;
    }
    options.timestamp_columns = time_columns;

    let table = table.unwrap_or(config.load.table);
    let loader = Loader::new(&store, table.as_str(), options);
    let report = loader.load_all(&dataset.records).await?;

    print_summary("LOAD SUMMARY", &report.summary_rows());
    if !report.is_complete() {
        for range in report.failed_row_ranges() {
            println!("lost rows {}..{}", range.start, range.end);
        }
    }

    if let Some(path) = report_path {
        std::fs::write(path, report.to_json()?)?;
        info!(file = %path.display(), "wrote load report");
    }
    Ok(())
}

async fn cmd_validate(
    input: &Path,
    preset: Option<Preset>,
    spec_path: Option<&Path>,
    table: Option<String>,
) -> CliResult {
    let config = Config::from_env()?;
    let store = StoreClient::new(&config.store)?;
    let (spec, kind) = resolve_spec(preset, spec_path)?;

    let dataset = parser::read_file(input)?;
    let table = resolve_table(table, kind, &config);
    info!(table = %table, "reading back loaded table");
    let readback = store.select_all(&table).await?;

    let checks = CheckSpec::from_transform(&spec);
    let report = validate_readback(&dataset.records, &readback, &checks);

    print_summary("VALIDATION SUMMARY", &report.summary_rows());
    Ok(())
}

async fn cmd_run(
    inputs: &[PathBuf],
    preset: Option<Preset>,
    spec_path: Option<&Path>,
    table: Option<String>,
    output: Option<&Path>,
    report_path: Option<&Path>,
    no_readback: bool,
) -> CliResult {
    let config = Config::from_env()?;
    let store = StoreClient::new(&config.store)?;
    let (spec, kind) = resolve_spec(preset, spec_path)?;
    let (records, headers) = read_inputs(inputs)?;

    let options = RunOptions {
        table: resolve_table(table, kind, &config),
        load: LoadOptions::from(&config.load),
        spec,
        kind,
        skip_readback: no_readback,
    };

    let outcome = pipeline::run(&records, &store, &options).await?;

    if let Some(path) = output {
        let columns = options.spec.output_columns(&headers);
        parser::write_file(path, &outcome.enriched, &columns)?;
        info!(file = %path.display(), "wrote staged dataset");
    }

    print_summary("LOAD SUMMARY", &outcome.report.summary_rows());
    if !outcome.report.is_complete() {
        let lost = failed_records(&outcome.report, &outcome.enriched);
        println!("rows lost after retries: {}", lost.len());
    }
    if let Some(validation) = &outcome.validation {
        print_summary("VALIDATION SUMMARY", &validation.summary_rows());
    }

    if let Some(path) = report_path {
        std::fs::write(path, outcome.report.to_json()?)?;
        info!(file = %path.display(), "wrote load report");
    }
    Ok(())
}

/// Resolve the transform spec: an explicit spec file wins over a preset.
fn resolve_spec(
    preset: Option<Preset>,
    spec_path: Option<&Path>,
) -> Result<(TransformSpec, Option<DatasetKind>), Box<dyn std::error::Error>> {
    if let Some(path) = spec_path {
        let content = std::fs::read_to_string(path)?;
        return Ok((TransformSpec::from_json(&content)?, None));
    }
    match preset {
        Some(preset) => {
            let kind = preset.kind();
            Ok((kind.spec(), Some(kind)))
        }
        None => Err("either --preset or --spec is required".into()),
    }
}

/// Table precedence: explicit flag, then preset default, then environment.
fn resolve_table(flag: Option<String>, kind: Option<DatasetKind>, config: &Config) -> String {
    flag.or_else(|| kind.map(|k| k.default_table().to_string()))
        .unwrap_or_else(|| config.load.table.clone())
}

/// Read CSV files and JSON sensor documents into one record sequence.
/// A document matching no recognized shape is skipped and logged.
fn read_inputs(inputs: &[PathBuf]) -> Result<(Vec<Value>, Vec<String>), Box<dyn std::error::Error>> {
    if inputs.is_empty() {
        return Err("no input files given".into());
    }

    let mut records = Vec::new();
    let mut headers: Option<Vec<String>> = None;

    for path in inputs {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown");
            let city = sensor::city_from_stem(stem);
            let text = std::fs::read_to_string(path)?;
            let doc: Value = match serde_json::from_str(&text) {
                Ok(doc) => doc,
                Err(error) => {
                    warn!(file = %path.display(), error = %error, "skipping malformed document");
                    continue;
                }
            };
            match sensor::normalize_document(city, &doc) {
                Ok(mut rows) => {
                    info!(file = %path.display(), rows = rows.len(), city = %city, "normalized document");
                    records.append(&mut rows);
                    headers.get_or_insert_with(sensor_headers);
                }
                Err(error) => {
                    warn!(file = %path.display(), error = %error, "skipping document");
                }
            }
        } else {
            let dataset = parser::read_file(path)?;
            info!(file = %path.display(), rows = dataset.records.len(), "read dataset");
            if headers.is_none() {
                headers = Some(dataset.headers.clone());
            }
            records.extend(dataset.records);
        }
    }

    Ok((records, headers.unwrap_or_default()))
}

/// Column order of normalized sensor records.
fn sensor_headers() -> Vec<String> {
    let mut headers = vec!["city".to_string(), "time".to_string()];
    headers.extend(sensor::POLLUTANT_COLUMNS.iter().map(|c| c.to_string()));
    headers.push("uv_index".to_string());
    headers
}

/// Print a metric-name to value summary table.
fn print_summary(title: &str, rows: &[(String, String)]) {
    println!("\n===== {} =====", title);
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, value) in rows {
        println!("{:<width$}  {}", name, value, width = width);
    }
}
