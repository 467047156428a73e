use super::NoiseSource;
use crate::analysis::scale::{clamp_kp, geomagnetic_latitude, official_kp_string};
use crate::analysis::statistics::{mean_first_difference, sample_std};
use crate::core::features::{FeatureTable, BZ_GSM, KP_INDEX, PLASMA_SPEED, PROTON_DENSITY};
use crate::models::ForecastPoint;
use chrono::{DateTime, Duration, Utc};

pub const FORECAST_HOURS: usize = 72;

/// Rows of Kp history used for momentum and volatility.
pub const CONTEXT_ROWS: usize = 24;

pub const DEFAULT_VOLATILITY: f64 = 0.2;
const DECAY_RATE: f64 = 0.02;
const TREND_WEIGHT: f64 = 0.1;
const NOISE_FRACTION: f64 = 0.3;

const BZ_WEIGHT: f64 = 0.1;
const REFERENCE_SPEED: f64 = 400.0;
const SPEED_WEIGHT: f64 = 0.002;
const REFERENCE_DENSITY: f64 = 5.0;
const DENSITY_WEIGHT: f64 = 0.05;

/// What the curve is extrapolated from besides the point estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastDrivers {
    /// Mean hourly change of Kp over the context window.
    pub trend: f64,
    pub volatility: f64,
    /// Sum of the solar-wind effects at the latest reading, before decay.
    pub physics: f64,
}

impl ForecastDrivers {
    pub fn from_table(features: &FeatureTable) -> Self {
        let (trend, volatility) = match features.tail(KP_INDEX, CONTEXT_ROWS) {
            Some(recent) if features.len() >= CONTEXT_ROWS => (
                mean_first_difference(recent).unwrap_or(0.0),
                sample_std(recent).unwrap_or(DEFAULT_VOLATILITY),
            ),
            _ => (0.0, DEFAULT_VOLATILITY),
        };

        let bz_effect = features.latest(BZ_GSM).map_or(0.0, |bz| -bz * BZ_WEIGHT);
        let speed_effect = features.latest(PLASMA_SPEED)
            .map_or(0.0, |v| (v - REFERENCE_SPEED) * SPEED_WEIGHT);
        let density_effect = features.latest(PROTON_DENSITY)
            .map_or(0.0, |n| (n - REFERENCE_DENSITY) * DENSITY_WEIGHT);

        Self { trend, volatility, physics: bz_effect + speed_effect + density_effect }
    }
}

pub fn time_decay(step: usize) -> f64 {
    (-DECAY_RATE * step as f64).exp()
}

pub fn step_confidence(step: usize) -> f64 {
    (0.9 - 0.01 * step as f64).max(0.3)
}

/// Hourly curve for the next 72 h, anchored at `base_kp` for `now`.
pub fn generate_72h_forecast(
    base_kp: f64,
    features: &FeatureTable,
    now: DateTime<Utc>,
    noise: &mut dyn NoiseSource,
) -> Vec<ForecastPoint> {
    let drivers = ForecastDrivers::from_table(features);

    (0..FORECAST_HOURS)
        .map(|i| {
            let decay = time_decay(i);
            let trend_effect = drivers.trend * i as f64 * TREND_WEIGHT;
            let physics = drivers.physics * decay;
            let perturbation = if i > 0 { noise.sample(drivers.volatility * NOISE_FRACTION) } else { 0.0 };

            let kp = clamp_kp(base_kp * decay + trend_effect + physics + perturbation);

            ForecastPoint {
                time: now + Duration::hours(i as i64),
                forecast_kp: kp,
                geomagnetic_latitude: geomagnetic_latitude(kp),
                official_scale: official_kp_string(Some(kp)),
                confidence: Some(step_confidence(i)),
            }
        })
        .collect()
}
