use crate::core::pipeline::KpForecaster;
use crate::models::ForecastReport;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Start watch mode: run the full forecast once now, then on every tick of `cron`.
pub async fn init(forecaster: Arc<KpForecaster>, cron: &str) -> Result<JobScheduler, anyhow::Error> {
    let sched = JobScheduler::new().await?;
    let job_forecaster = forecaster.clone();

    sched.add(
        Job::new_async(cron, move |_uuid, _l| {
            let forecaster = job_forecaster.clone();
            Box::pin(async move {
                info!("Running scheduled forecast...");
                run_once(&forecaster).await;
            })
        })?
    ).await?;

    // Startup run, so the first summary does not wait for the next tick
    tokio::spawn(async move {
        info!("Running startup forecast...");
        run_once(&forecaster).await;
    });

    sched.start().await?;
    info!("Watch mode scheduled with '{}'", cron);
    Ok(sched)
}

/// One forecast run. Failures are logged and never stop the schedule.
pub async fn run_once(forecaster: &KpForecaster) -> Option<ForecastReport> {
    match forecaster.full_forecast(chrono::Utc::now()).await {
        Ok(report) => {
            log_summary(&report);
            Some(report)
        }
        Err(e) => {
            error!("Scheduled forecast failed [{}]: {}", e.kind().as_str(), e);
            None
        }
    }
}

fn log_summary(report: &ForecastReport) {
    let peak = report.forecast_72h
        .iter()
        .max_by(|a, b| a.forecast_kp.total_cmp(&b.forecast_kp));

    info!("========================================");
    info!("KP FORECAST {}", report.last_updated.format("%Y-%m-%d %H:%M UTC"));
    info!("   - Current Kp:    {:.2} ({})", report.current_forecast.forecast_kp, report.current_forecast.official_scale);
    info!("   - Aurora Reach:  {:.1}° ({:?})", report.current_forecast.geomagnetic_latitude, report.aurora_details.level);
    if let Some(peak) = peak {
        info!("   - 72h Peak:      {:.2} ({}) at {}", peak.forecast_kp, peak.official_scale, peak.time.format("%Y-%m-%d %H:%M"));
    }
    info!("========================================");
}
