//! Kp Forecaster - command line entry point
//!
//! Every subcommand prints JSON on stdout except `aviation`, which prints the
//! markdown briefing. Pipeline failures print a `{kind, message}` object on
//! stderr and exit with status 1.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use kp_forecaster_lib::core::scheduler;
use kp_forecaster_lib::{init_logging, KpForecaster, PipelineError, PipelineFailure, Settings};
use serde::Serialize;
use tracing::{error, info};

/// Planetary Kp index forecaster
#[derive(Parser, Debug)]
#[command(name = "kp-forecaster")]
#[command(about = "Forecast the planetary Kp index from live NOAA solar-wind data")]
#[command(version)]
struct Args {
    /// Fixed seed for the forecast noise (reproducible curves)
    #[arg(long, global = true, env = "KP_NOISE_SEED")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full report: current Kp, 24h history, 72h forecast, terminator
    Forecast,
    /// Forecast point a number of hours from now
    At {
        /// Hours ahead, 0 to 72
        #[arg(long)]
        offset: f64,
    },
    /// Aurora latitude and scale for a given Kp
    Latitude {
        /// Kp value, 0 to 9
        #[arg(long)]
        kp: f64,
    },
    /// Aviation briefing from the official 3-day Kp forecast
    Aviation,
    /// Re-run the forecast on a cron schedule until interrupted
    Watch {
        /// Six-field cron expression (sec min hour dom mon dow)
        #[arg(long, env = "KP_WATCH_CRON")]
        cron: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    let mut settings = Settings::from_env();
    if args.seed.is_some() {
        settings.noise_seed = args.seed;
    }

    let forecaster = KpForecaster::from_settings(&settings);
    let now = Utc::now();

    match args.command {
        Command::Forecast => emit(forecaster.full_forecast(now).await),
        Command::At { offset } => emit(forecaster.forecast_at_offset(offset, now).await),
        Command::Latitude { kp } => emit(forecaster.latitude_report(kp)),
        Command::Aviation => match forecaster.aviation_report(now).await {
            Ok(report) => {
                println!("{}", report.aviation_impact_report);
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
        Command::Watch { cron } => {
            let cron = cron.unwrap_or(settings.watch_cron);
            match watch(Arc::new(forecaster), &cron).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Watch mode failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn watch(forecaster: Arc<KpForecaster>, cron: &str) -> anyhow::Result<()> {
    let mut sched = scheduler::init(forecaster, cron).await?;
    tokio::signal::ctrl_c().await?;
    info!("Shutting down scheduler...");
    sched.shutdown().await?;
    Ok(())
}

fn emit<T: Serialize>(result: Result<T, PipelineError>) -> ExitCode {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to serialize output: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => fail(&e),
    }
}

fn fail(err: &PipelineError) -> ExitCode {
    let failure = PipelineFailure::from(err);
    match serde_json::to_string(&failure) {
        Ok(json) => eprintln!("{}", json),
        Err(_) => eprintln!("{}", err),
    }
    ExitCode::FAILURE
}
