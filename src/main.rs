use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use radiation_sync::{
    write_snapshot, Evaluation, Horizon, Metric, RadiationSync, RadiationSyncError, Region, SyncConfig,
    SyncReport, CACHE_DIR_VAR,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Fetches, caches and reconciles KMA ground-truth irradiance and solar forecasts.
struct Cli {
    /// Cache root, overriding RADIATION_CACHE_DIR and the platform default.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync hourly ASOS observations for one or more stations
    Asos {
        #[arg(long = "station", required = true)]
        stations: Vec<String>,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Sync same-day and next-day forecasts for a region
    Forecast {
        #[arg(long)]
        region: String,
        /// Display name stamped on every record
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Join cached observations with cached forecasts and report accuracy
    Reconcile {
        #[arg(long)]
        station: String,
        #[arg(long)]
        region: String,
        #[arg(long, default_value = "today")]
        horizon: Horizon,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// Also write the joined rows to this CSV file
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

fn print_report(report: &SyncReport) {
    for outcome in &report.outcomes {
        println!("{}", outcome);
    }
    println!(
        "{} cached, {} skipped, {} empty, {} row(s) written",
        report.cached(),
        report.skipped(),
        report.empty(),
        report.rows()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // Only the ASOS service needs the key; cached data can be read without one.
    let mut config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(RadiationSyncError::MissingServiceKey(_)) if !matches!(cli.command, Commands::Asos { .. }) => {
            SyncConfig::builder()
                .service_key("")
                .maybe_cache_dir(std::env::var_os(CACHE_DIR_VAR).map(PathBuf::from))
                .build()
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = Some(dir);
    }
    let client = RadiationSync::new(config).await?;

    match cli.command {
        Commands::Asos { stations, start, end } => {
            let report = client
                .sync_observations()
                .stations(&stations)
                .start(start)
                .end(end)
                .call()
                .await?;
            print_report(&report);
        }
        Commands::Forecast {
            region,
            name,
            start,
            end,
        } => {
            let report = client
                .sync_forecasts()
                .regions(&[Region::new(region, name)])
                .start(start)
                .end(end)
                .call()
                .await?;
            print_report(&report);
        }
        Commands::Reconcile {
            station,
            region,
            horizon,
            start,
            end,
            snapshot,
        } => {
            let pairs = client
                .reconcile()
                .station(&station)
                .region_code(&region)
                .horizon(horizon)
                .start(start)
                .end(end)
                .call()
                .await?;
            println!("{} reconciled pair(s) ({})", pairs.len(), horizon);
            for metric in Metric::ALL {
                match Evaluation::of(&pairs, metric) {
                    Some(evaluation) => println!("{}", evaluation),
                    None => println!("{}: no pairs", metric),
                }
            }
            if let Some(path) = snapshot {
                write_snapshot(&pairs, &path)
                    .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
                println!("Snapshot saved to `{}`", path.display());
            }
        }
    }

    Ok(())
}
