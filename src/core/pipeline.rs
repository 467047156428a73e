use crate::analysis::aviation::aviation_forecast;
use crate::analysis::geo::{solar_terminator, GEOMAGNETIC_POLE};
use crate::analysis::scale::{aurora_details, geomagnetic_latitude, official_kp_string, KP_MAX, KP_MIN};
use crate::config::Settings;
use crate::core::features::{synthesize_features, FeatureTable};
use crate::core::timeseries::{normalize_feed, resample_forward_fill, TimeSeries};
use crate::error::PipelineError;
use crate::fetcher::swpc::SwpcFetcher;
use crate::fetcher::{fetch_pipeline_feeds, FeedKind, FeedSource};
use crate::forecast::extrapolation::{generate_72h_forecast, FORECAST_HOURS};
use crate::forecast::GaussianNoise;
use crate::model::artifact::load_model;
use crate::model::ForecastModel;
use crate::models::{
    AviationReport, CurrentForecast, FeedPayload, ForecastReport, KpHistoryPoint, LatitudeReport,
    OffsetForecast, ReportMetadata,
};
use chrono::{DateTime, Duration, Utc};
use std::time::Duration as StdDuration;
use tracing::{error, info};

/// Fixed confidence reported alongside every forecast.
pub const MODEL_CONFIDENCE: f64 = 0.85;

const HISTORY_HOURS: i64 = 24;

/// Result of one pipeline run. `kp_history` is the normalized Kp feed in
/// its own vocabulary (`Kp`).
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub predicted_kp: f64,
    pub kp_history: TimeSeries,
    pub features: FeatureTable,
}

pub struct KpForecaster {
    source: Box<dyn FeedSource>,
    model: Option<ForecastModel>,
    look_back: usize,
    fetch_timeout: StdDuration,
    forecast_feed_timeout: StdDuration,
    noise_seed: Option<u64>,
}

impl KpForecaster {
    pub fn new(source: Box<dyn FeedSource>, model: Option<ForecastModel>) -> Self {
        let defaults = Settings::default();
        Self {
            source,
            model,
            look_back: defaults.look_back_steps,
            fetch_timeout: defaults.fetch_timeout,
            forecast_feed_timeout: defaults.forecast_feed_timeout,
            noise_seed: None,
        }
    }

    /// SWPC feeds plus the artifacts on disk. A model that fails to load is
    /// logged and every run then reports `ModelUnavailable`.
    pub fn from_settings(settings: &Settings) -> Self {
        let model = match load_model(&settings.model_path, &settings.scaler_path) {
            Ok(model) => Some(model),
            Err(e) => {
                error!("Forecasting model not loaded: {}", e);
                None
            }
        };

        Self {
            source: Box::new(SwpcFetcher::new(settings)),
            model,
            look_back: settings.look_back_steps,
            fetch_timeout: settings.fetch_timeout,
            forecast_feed_timeout: settings.forecast_feed_timeout,
            noise_seed: settings.noise_seed,
        }
    }

    pub fn with_look_back(mut self, steps: usize) -> Self {
        self.look_back = steps;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: StdDuration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_noise_seed(mut self, seed: Option<u64>) -> Self {
        self.noise_seed = seed;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    // ========================================================================
    // CORE PIPELINE
    // ========================================================================

    pub async fn run_forecast_pipeline(&self) -> Result<PipelineOutput, PipelineError> {
        // 1. No model, no run
        let model = self.model.as_ref().ok_or(PipelineError::ModelUnavailable)?;

        // 2. Fan out
        info!("Fetching plasma, magnetic and Kp feeds from {}", self.source.name());
        let feeds = fetch_pipeline_feeds(self.source.as_ref(), self.fetch_timeout).await;

        // 3. Normalize
        let plasma = normalize(FeedKind::Plasma, feeds.plasma.as_ref());
        let magnetic = normalize(FeedKind::Magnetic, feeds.magnetic.as_ref());
        let kp_history = normalize(FeedKind::KpHistory, feeds.kp_history.as_ref());
        info!(
            "Normalized feeds: plasma={} magnetic={} kp={} records",
            plasma.len(),
            magnetic.len(),
            kp_history.len()
        );

        // 4. Features
        let features = synthesize_features(&plasma, &magnetic, &kp_history)?;

        // 5. Point estimate
        let predicted_kp = model.predict_kp(&features, self.look_back)?;
        info!("Predicted Kp {:.2} from {} feature rows", predicted_kp, features.len());

        Ok(PipelineOutput { predicted_kp, kp_history, features })
    }

    // ========================================================================
    // REPORTS
    // ========================================================================

    pub async fn full_forecast(&self, now: DateTime<Utc>) -> Result<ForecastReport, PipelineError> {
        let output = self.run_forecast_pipeline().await?;

        let mut noise = GaussianNoise::from_seed(self.noise_seed);
        let forecast_72h = generate_72h_forecast(output.predicted_kp, &output.features, now, &mut noise);

        let kp = output.predicted_kp;
        Ok(ForecastReport {
            last_updated: now,
            current_forecast: CurrentForecast {
                forecast_kp: round_to(kp, 2),
                official_scale: official_kp_string(Some(kp)),
                geomagnetic_latitude: round_to(geomagnetic_latitude(kp), 1),
            },
            historical_24h: recent_kp_history(&output.kp_history, now),
            forecast_72h,
            aurora_details: aurora_details(kp),
            solar_terminator: solar_terminator(now),
            metadata: ReportMetadata {
                model_confidence: MODEL_CONFIDENCE,
                last_solar_wind_update: output.features.timestamps.last().copied().unwrap_or(now),
                geomagnetic_pole: GEOMAGNETIC_POLE,
            },
        })
    }

    /// The forecast point `offset_hours` after `now`, with the day/night line
    /// at that moment. Offsets run from 0 to 72 inclusive.
    pub async fn forecast_at_offset(&self, offset_hours: f64, now: DateTime<Utc>) -> Result<OffsetForecast, PipelineError> {
        if !offset_hours.is_finite() || !(0.0..=FORECAST_HOURS as f64).contains(&offset_hours) {
            return Err(PipelineError::InvalidRequest(format!(
                "offset must be between 0 and {} hours, got {}",
                FORECAST_HOURS, offset_hours
            )));
        }

        let output = self.run_forecast_pipeline().await?;
        let mut noise = GaussianNoise::from_seed(self.noise_seed);
        let curve = generate_72h_forecast(output.predicted_kp, &output.features, now, &mut noise);

        let index = (offset_hours.floor() as usize).min(FORECAST_HOURS - 1);
        let Some(forecast) = curve.into_iter().nth(index) else {
            return Err(PipelineError::Model(format!("forecast has no point at hour {}", index)));
        };

        let target_time = now + Duration::seconds((offset_hours * 3600.0).round() as i64);
        Ok(OffsetForecast {
            target_time,
            aurora_details: aurora_details(forecast.forecast_kp),
            solar_terminator: solar_terminator(target_time),
            forecast,
        })
    }

    /// Aurora reach for an arbitrary Kp. Does not touch the feeds or the model.
    pub fn latitude_report(&self, kp: f64) -> Result<LatitudeReport, PipelineError> {
        if !kp.is_finite() || !(KP_MIN..=KP_MAX).contains(&kp) {
            return Err(PipelineError::InvalidRequest(format!("Kp must be between 0 and 9, got {}", kp)));
        }

        Ok(LatitudeReport {
            kp_index: kp,
            geomagnetic_latitude: round_to(geomagnetic_latitude(kp), 2),
            official_scale: official_kp_string(Some(kp)),
            aurora_details: aurora_details(kp),
        })
    }

    pub async fn aviation_report(&self, now: DateTime<Utc>) -> Result<AviationReport, PipelineError> {
        aviation_forecast(self.source.as_ref(), self.forecast_feed_timeout, now).await
    }
}

fn normalize(kind: FeedKind, payload: Option<&FeedPayload>) -> TimeSeries {
    match payload {
        Some(payload) => normalize_feed(payload, kind.time_field(), kind.numeric_fields()),
        None => TimeSeries::empty(kind.numeric_fields()),
    }
}

/// Hourly, forward-filled Kp over the 24 h before `now`.
pub fn recent_kp_history(kp_history: &TimeSeries, now: DateTime<Utc>) -> Vec<KpHistoryPoint> {
    let cutoff = now - Duration::hours(HISTORY_HOURS);
    let recent: Vec<(DateTime<Utc>, f64)> = kp_history.points("Kp")
        .into_iter()
        .filter(|(t, _)| *t >= cutoff && *t <= now)
        .collect();

    resample_forward_fill(&recent, Duration::hours(1))
        .into_iter()
        .map(|(time, kp)| KpHistoryPoint {
            time,
            kp_index: round_to(kp, 2),
            official_scale: official_kp_string(Some(kp)),
            geomagnetic_latitude: geomagnetic_latitude(kp),
        })
        .collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
