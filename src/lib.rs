//! Planetary Kp index forecasting from live NOAA SWPC solar-wind telemetry.
//!
//! The pipeline fetches plasma, magnetic-field and Kp history feeds, merges
//! them onto a 15-minute grid, engineers features, asks a fitted regressor
//! for a point estimate and extrapolates that into a 72-hour curve.

pub mod config;
pub mod error;
pub mod models;
pub mod fetcher;
pub mod core;
pub mod analysis;
pub mod model;
pub mod forecast;

pub use crate::config::Settings;
pub use crate::core::pipeline::{KpForecaster, PipelineOutput};
pub use crate::error::{ErrorKind, PipelineError, PipelineFailure};
pub use crate::model::{FeatureScaler, ForecastModel, KpRegressor};

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
