use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod catalog;
mod config;
mod dataset;
mod db;
mod error;
mod models;
mod report;
mod risk;
mod telemetry;

use catalog::EventCatalog;
use config::Settings;
use models::{DateRange, EventCode, EventRecord};
use risk::{Evaluation, EvaluationRequest};

#[derive(Parser)]
#[command(name = "driver-risk-score")]
#[command(about = "Weighted risk ranking of drivers from telemetry violation events", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Read events from a CSV file instead of Postgres
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Args)]
struct PeriodArgs {
    /// First day to include (defaults to the earliest event)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day to include (defaults to the latest event)
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Args)]
struct EvaluationArgs {
    /// JSON object of event code to percent, e.g. {"16": 60, "25": 40}
    #[arg(long)]
    weights: Option<PathBuf>,
    /// Percent for one event code; overrides the weights file
    #[arg(long = "weight", value_name = "CODE=PERCENT", value_parser = config::parse_weight_override)]
    overrides: Vec<(EventCode, i64)>,
    /// Number of top-ranked drivers to report
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=20))]
    drivers: u8,
    #[command(flatten)]
    period: PeriodArgs,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import events from a CSV file into Postgres
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the event codes present in the data and the default period
    Codes {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Rank drivers by weighted risk score
    Score {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        evaluation: EvaluationArgs,
    },
    /// Write per-driver reports for the top-ranked drivers
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        evaluation: EvaluationArgs,
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
        /// Output path, or - for stdout
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load();
    telemetry::init(&settings).context("failed to initialise logging")?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { csv } => {
            let pool = connect(&settings).await?;
            let inserted = db::import_csv(&pool, &csv)
                .await
                .with_context(|| format!("failed to import {}", csv.display()))?;
            println!("Inserted {inserted} events from {}.", csv.display());
        }
        Commands::Codes { source, period } => {
            let records = load_events(&settings, &source).await?;
            let dataset = risk::derive_indicators(&records);
            let catalog = EventCatalog::default();
            let range = resolve_range(&period, &records);
            let summaries = range
                .map(|range| risk::summarize_codes(&dataset, &catalog, range))
                .unwrap_or_default();
            print!("{}", report::build_code_listing(range, &summaries));
        }
        Commands::Score { source, evaluation } => {
            let Some((range, outcome)) = run_evaluation(&settings, &source, &evaluation).await?
            else {
                return Ok(());
            };

            match outcome {
                Evaluation::NoEventsFound => println!("{}", report::NO_EVENTS_MESSAGE),
                Evaluation::Ranked {
                    drivers_scored,
                    reports,
                } => {
                    println!(
                        "Top drivers by risk score ({} to {}, {} drivers scored):",
                        report::display_date(range.start),
                        report::display_date(range.end),
                        drivers_scored
                    );
                    for driver in &reports {
                        println!(
                            "- Driver {} score {:.2} across {} days",
                            driver.driver_id,
                            driver.total_score,
                            driver.daily_series.len()
                        );
                    }
                }
            }
        }
        Commands::Report {
            source,
            evaluation,
            format,
            out,
        } => {
            let Some((range, outcome)) = run_evaluation(&settings, &source, &evaluation).await?
            else {
                return Ok(());
            };

            let body = match format {
                ReportFormat::Markdown => report::build_report(range, &outcome),
                ReportFormat::Json => report::build_json_report(range, &outcome)?,
            };
            emit_report(&body, &out, &outcome, &mut std::io::stdout().lock())?;
        }
    }

    Ok(())
}

/// Writes the report to `out`, or to `console` when `out` is `-`. Status
/// lines go to `console` only when the body went to a file, so piped output
/// stays a clean document.
fn emit_report(
    body: &str,
    out: &Path,
    outcome: &Evaluation,
    console: &mut impl Write,
) -> anyhow::Result<()> {
    if out.as_os_str() == "-" {
        write!(console, "{body}")?;
        return Ok(());
    }

    std::fs::write(out, body).with_context(|| format!("failed to write {}", out.display()))?;
    if *outcome == Evaluation::NoEventsFound {
        writeln!(console, "{}", report::NO_EVENTS_MESSAGE)?;
    }
    writeln!(console, "Report written to {}.", out.display())?;
    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let database_url = settings.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_events(settings: &Settings, source: &SourceArgs) -> anyhow::Result<Vec<EventRecord>> {
    let records = match &source.csv {
        Some(path) => dataset::load_csv(path)
            .with_context(|| format!("failed to load events from {}", path.display()))?,
        None => {
            let pool = connect(settings).await?;
            db::fetch_events(&pool).await?
        }
    };
    tracing::info!(events = records.len(), "loaded event log");
    Ok(records)
}

fn resolve_range(period: &PeriodArgs, records: &[EventRecord]) -> Option<DateRange> {
    let bounds = dataset::date_bounds(records);
    let start = period.from.or(bounds.map(|range| range.start))?;
    let end = period.to.or(bounds.map(|range| range.end))?;
    Some(DateRange::new(start, end))
}

fn print_welcome() {
    println!("Welcome to the driver risk assessment!");
    println!("Give each event a percentage with --weight CODE=PERCENT or a --weights file.");
    println!("Make sure all percentages add up to 100%.");
    println!("Run `driver-risk-score codes` to see which event codes the data offers.");
}

/// Loads the data and runs one evaluation. Returns `None` when there was
/// nothing to evaluate and the user has already been told why.
async fn run_evaluation(
    settings: &Settings,
    source: &SourceArgs,
    args: &EvaluationArgs,
) -> anyhow::Result<Option<(DateRange, Evaluation)>> {
    let Some(weights) = config::assemble_weights(args.weights.as_deref(), &args.overrides)? else {
        print_welcome();
        return Ok(None);
    };

    let records = load_events(settings, source).await?;
    let Some(range) = resolve_range(&args.period, &records) else {
        println!("{}", report::NO_EVENTS_MESSAGE);
        return Ok(None);
    };

    let dataset = risk::derive_indicators(&records);
    let catalog = EventCatalog::default();
    tracing::debug!(codes = ?dataset.codes_present(), "derived event indicators");

    let (request, dropped) = EvaluationRequest::for_dataset(
        &dataset,
        &catalog,
        &weights,
        usize::from(args.drivers),
        range,
    );
    if !dropped.is_empty() {
        tracing::warn!(codes = ?dropped, "ignoring weights for codes not offered by the data");
    }
    tracing::info!(
        drivers = request.driver_limit,
        start = %range.start,
        end = %range.end,
        "evaluating driver risk"
    );

    let outcome = risk::evaluate(&dataset, &request, &catalog)
        .context("Please fill in the percentages correctly")?;
    match &outcome {
        Evaluation::NoEventsFound => tracing::info!("no events in the selected period"),
        Evaluation::Ranked { drivers_scored, .. } => {
            tracing::info!(drivers_scored, "ranked drivers")
        }
    }

    Ok(Some((range, outcome)))
}
