//! Runtime settings, read from the environment (and `.env` when present).

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PLASMA_URL: &str = "https://services.swpc.noaa.gov/products/solar-wind/plasma-3-day.json";
pub const DEFAULT_MAG_URL: &str = "https://services.swpc.noaa.gov/products/solar-wind/mag-7-day.json";
pub const DEFAULT_KP_HISTORY_URL: &str = "https://services.swpc.noaa.gov/products/noaa-planetary-k-index.json";
pub const DEFAULT_KP_FORECAST_URL: &str = "https://services.swpc.noaa.gov/products/noaa-planetary-k-index-forecast.json";

/// Look-back window the deployed model was trained with (18 x 15 min ticks).
pub const DEFAULT_LOOK_BACK_STEPS: usize = 18;

#[derive(Debug, Clone)]
pub struct Settings {
    pub plasma_url: String,
    pub mag_url: String,
    pub kp_history_url: String,
    pub kp_forecast_url: String,
    /// Per-request timeout for the three pipeline feeds.
    pub fetch_timeout: Duration,
    /// Timeout for the official Kp forecast feed used by the aviation briefing.
    pub forecast_feed_timeout: Duration,
    pub look_back_steps: usize,
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    pub watch_cron: String,
    /// Fixed seed for the extrapolation noise; `None` draws from entropy.
    pub noise_seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plasma_url: DEFAULT_PLASMA_URL.to_string(),
            mag_url: DEFAULT_MAG_URL.to_string(),
            kp_history_url: DEFAULT_KP_HISTORY_URL.to_string(),
            kp_forecast_url: DEFAULT_KP_FORECAST_URL.to_string(),
            fetch_timeout: Duration::from_secs(30),
            forecast_feed_timeout: Duration::from_secs(15),
            look_back_steps: DEFAULT_LOOK_BACK_STEPS,
            model_path: PathBuf::from("enhanced_kp_model.json"),
            scaler_path: PathBuf::from("feature_scaler.json"),
            watch_cron: "0 0 * * * *".to_string(),
            noise_seed: None,
        }
    }
}

impl Settings {
    /// Loads `.env` if present, then overlays any `KP_*` variables on the defaults.
    /// Unparseable numbers fall back to the default with a warning.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(v) = lookup("KP_PLASMA_URL") { settings.plasma_url = v; }
        if let Some(v) = lookup("KP_MAG_URL") { settings.mag_url = v; }
        if let Some(v) = lookup("KP_HISTORY_URL") { settings.kp_history_url = v; }
        if let Some(v) = lookup("KP_FORECAST_URL") { settings.kp_forecast_url = v; }
        if let Some(v) = lookup("KP_MODEL_PATH") { settings.model_path = PathBuf::from(v); }
        if let Some(v) = lookup("KP_SCALER_PATH") { settings.scaler_path = PathBuf::from(v); }
        if let Some(v) = lookup("KP_WATCH_CRON") { settings.watch_cron = v; }

        if let Some(secs) = parse_var::<u64>(&lookup, "KP_FETCH_TIMEOUT_SECS") {
            settings.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(steps) = parse_var::<usize>(&lookup, "KP_LOOK_BACK_STEPS") {
            if steps > 0 {
                settings.look_back_steps = steps;
            }
        }
        settings.noise_seed = parse_var::<u64>(&lookup, "KP_NOISE_SEED");

        settings
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid number", key, raw);
            None
        }
    }
}
