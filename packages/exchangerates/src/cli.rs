//! Command-line interface for the exchange rate exporter.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{
    validate_parameters, Backoff, Endpoints, BASE_DELAY_MS, DEFAULT_FREQUENCY, DEFAULT_OUTPUT_DIR,
    DEFAULT_OVERRIDES_DIR, DEFAULT_SOURCE, DEFAULT_TARGET, DELAY_CEILING_SECS, DELAY_STEP_MS,
};
use crate::error::Result;
use crate::http::RateLimitedFetcher;
use crate::reference::{OverrideTables, Reconciler};
use crate::types::{Entity, Frequency, RateRequest, RateSource, Target};
use crate::writer::{write_countries_currencies, write_exchange_rates};

/// IMF exchange rates - Export agency exchange rate series as a flat CSV.
#[derive(Parser)]
#[command(name = "imf-exchangerates")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download exchange rates and write the CSV plus currency snapshots.
    Fetch {
        /// Frequency of rates: A (annual), Q (quarterly), M (monthly)
        #[arg(long, value_enum, ignore_case = true, default_value_t = DEFAULT_FREQUENCY)]
        freq: Frequency,

        /// Series variant: ENSE, ENSA (per SDR) or ENDE, ENDA (per target)
        #[arg(long, value_enum, ignore_case = true, default_value_t = DEFAULT_SOURCE)]
        source: RateSource,

        /// Conversion target: XDR (with ENSE/ENSA) or USD (with ENDE/ENDA)
        #[arg(long, value_enum, ignore_case = true, default_value_t = DEFAULT_TARGET)]
        target: Target,

        /// Single reporting entity code (default: all entities)
        #[arg(long, default_value = "*")]
        entity: Entity,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Write only the currency mapping snapshots.
    Currencies {
        #[command(flatten)]
        options: RunOptions,
    },
}

/// Options shared by every command that talks to the upstream services.
#[derive(Args, Debug, Clone)]
pub struct RunOptions {
    /// Output directory (created if missing)
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Directory holding eurozone.csv and missing.csv
    #[arg(long, default_value = DEFAULT_OVERRIDES_DIR)]
    pub overrides: PathBuf,

    /// Delay before every request, in milliseconds
    #[arg(long, default_value_t = BASE_DELAY_MS)]
    pub base_delay_ms: u64,

    /// Delay increment after a failed attempt, in milliseconds
    #[arg(long, default_value_t = DELAY_STEP_MS)]
    pub delay_step_ms: u64,

    /// Give up once the delay reaches this many seconds
    #[arg(long, default_value_t = DELAY_CEILING_SECS)]
    pub ceiling_secs: u64,

    /// Serve every endpoint from a mirror rooted at this URL
    #[arg(long, hide = true)]
    pub mirror: Option<String>,
}

impl RunOptions {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            base_delay: Duration::from_millis(self.base_delay_ms),
            step: Duration::from_millis(self.delay_step_ms),
            ceiling: Duration::from_secs(self.ceiling_secs),
        }
    }

    pub fn endpoints(&self) -> Endpoints {
        match &self.mirror {
            Some(root) => Endpoints::with_root(root),
            None => Endpoints::default(),
        }
    }
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            freq,
            source,
            target,
            entity,
            options,
        } => fetch_command(RateRequest::new(freq, source, target), &entity, &options),
        Commands::Currencies { options } => currencies_command(&options),
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Run one step under the spinner, clearing it on failure.
fn step<T>(pb: &ProgressBar, message: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    pb.set_message(message);
    f().inspect_err(|_| pb.finish_and_clear())
}

/// Load override tables and create the output directory.
///
/// Runs before any network activity.
fn prepare(options: &RunOptions) -> Result<OverrideTables> {
    let overrides = OverrideTables::load(&options.overrides)?;
    std::fs::create_dir_all(&options.output)?;
    Ok(overrides)
}

/// Execute the fetch command.
fn fetch_command(request: RateRequest, entity: &Entity, options: &RunOptions) -> Result<()> {
    validate_parameters(request.source, request.target)?;
    let overrides = prepare(options)?;

    println!(
        "{} {} {} {} for {}",
        style("Fetching").bold(),
        style(request.frequency).cyan(),
        style(request.source).cyan(),
        style(request.target).cyan(),
        style(entity.as_key()).green()
    );
    println!();

    let endpoints = options.endpoints();
    let mut fetcher = RateLimitedFetcher::new(options.backoff())?;
    let pb = spinner();

    let reconciler = step(&pb, "Fetching reference data...", || {
        Reconciler::fetch(&mut fetcher, &endpoints, overrides)
    })?;

    let summary = step(&pb, "Fetching exchange rates...", || {
        write_exchange_rates(
            &mut fetcher,
            &endpoints,
            &reconciler,
            &request,
            entity,
            &options.output,
        )
    })?;

    let (pre_eurozone, current) = step(&pb, "Writing currency snapshots...", || {
        write_countries_currencies(&reconciler, &options.output)
    })?;

    pb.finish_and_clear();

    println!("  Rows: {}", summary.rows);
    if summary.rows == 0 {
        println!("  {}", style("No observations returned").yellow().bold());
    }
    println!();
    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        summary.path.display()
    );
    println!("          {}", pre_eurozone.display());
    println!("          {}", current.display());

    Ok(())
}

/// Execute the currencies command.
fn currencies_command(options: &RunOptions) -> Result<()> {
    let overrides = prepare(options)?;

    let endpoints = options.endpoints();
    let mut fetcher = RateLimitedFetcher::new(options.backoff())?;
    let pb = spinner();

    let reconciler = step(&pb, "Fetching reference data...", || {
        Reconciler::fetch(&mut fetcher, &endpoints, overrides)
    })?;
    let (pre_eurozone, current) = step(&pb, "Writing currency snapshots...", || {
        write_countries_currencies(&reconciler, &options.output)
    })?;

    pb.finish_and_clear();

    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        pre_eurozone.display()
    );
    println!("          {}", current.display());

    Ok(())
}
