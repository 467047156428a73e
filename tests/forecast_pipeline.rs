use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use kp_forecaster_lib::core::features::{MODEL_FEATURE_COLUMNS, WARM_UP_ROWS};
use kp_forecaster_lib::fetcher::{FeedKind, FeedSource};
use kp_forecaster_lib::forecast::extrapolation::generate_72h_forecast;
use kp_forecaster_lib::forecast::ZeroNoise;
use kp_forecaster_lib::models::FeedPayload;
use kp_forecaster_lib::{ErrorKind, FeatureScaler, ForecastModel, KpForecaster, KpRegressor, PipelineError, PipelineFailure};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

const LOOK_BACK: usize = 18;
const TICKS: usize = 48;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    start() + Duration::minutes(15 * TICKS as i64)
}

fn time_tag(t: DateTime<Utc>) -> Value {
    json!(t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
}

// ============================================================================
// STUB FEEDS
// ============================================================================

/// Steady solar wind on a 15-minute cadence with Kp every 3 hours.
struct SyntheticSwpc {
    bz: f64,
    speed: f64,
    density: f64,
    kp: f64,
    slow_feed: Option<FeedKind>,
}

impl SyntheticSwpc {
    fn new(bz: f64, speed: f64) -> Self {
        Self { bz, speed, density: 5.0, kp: 3.0, slow_feed: None }
    }

    fn payload(&self, feed: FeedKind) -> FeedPayload {
        let tick = |i: usize| start() + Duration::minutes(15 * i as i64);
        let mut rows = Vec::new();

        match feed {
            FeedKind::Plasma => {
                rows.push(vec![json!("time_tag"), json!("density"), json!("speed"), json!("temperature")]);
                for i in 0..TICKS {
                    rows.push(vec![time_tag(tick(i)), json!(self.density.to_string()), json!(self.speed.to_string()), json!("90000")]);
                }
            }
            FeedKind::Magnetic => {
                rows.push(vec![json!("time_tag"), json!("bx_gsm"), json!("by_gsm"), json!("bz_gsm"), json!("lon_gsm"), json!("lat_gsm"), json!("bt")]);
                for i in 0..TICKS {
                    rows.push(vec![
                        time_tag(tick(i)), json!("1.0"), json!("-2.0"), json!(self.bz.to_string()),
                        json!("120.0"), json!("-10.0"), json!((self.bz.abs() + 3.0).to_string()),
                    ]);
                }
            }
            FeedKind::KpHistory => {
                rows.push(vec![json!("time_tag"), json!("Kp"), json!("a_running"), json!("station_count")]);
                for i in (0..TICKS).step_by(12) {
                    rows.push(vec![time_tag(tick(i)), json!(self.kp.to_string()), json!("15"), json!("8")]);
                }
            }
            FeedKind::KpForecast => {
                rows.push(vec![json!("time_tag"), json!("kp"), json!("observed"), json!("noaa_scale")]);
                for i in 0..8 {
                    let t = now() + Duration::hours(3 * i);
                    rows.push(vec![time_tag(t), json!("2.33"), json!("predicted"), json!(null)]);
                }
            }
        }

        FeedPayload::new(rows)
    }
}

#[async_trait]
impl FeedSource for SyntheticSwpc {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn fetch_feed(&self, feed: FeedKind) -> Option<FeedPayload> {
        if self.slow_feed == Some(feed) {
            tokio::time::sleep(StdDuration::from_secs(30)).await;
        }
        Some(self.payload(feed))
    }
}

// ============================================================================
// STUB MODEL
// ============================================================================

struct IdentityScaler {
    width: usize,
    calls: Arc<AtomicUsize>,
}

impl FeatureScaler for IdentityScaler {
    fn n_features_in(&self) -> usize {
        self.width
    }

    fn transform(&self, row: &[f64]) -> Vec<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        row.to_vec()
    }
}

struct ConstantRegressor {
    raw: f64,
    calls: Arc<AtomicUsize>,
}

impl KpRegressor for ConstantRegressor {
    fn predict(&self, rows: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(rows.iter().all(|r| r.len() == LOOK_BACK * MODEL_FEATURE_COLUMNS.len()));
        Ok(vec![self.raw; rows.len()])
    }
}

struct Calls {
    scaler: Arc<AtomicUsize>,
    regressor: Arc<AtomicUsize>,
}

fn stub_model(width: usize, raw: f64) -> (ForecastModel, Calls) {
    let calls = Calls { scaler: Arc::new(AtomicUsize::new(0)), regressor: Arc::new(AtomicUsize::new(0)) };
    let model = ForecastModel::new(
        Arc::new(IdentityScaler { width, calls: calls.scaler.clone() }),
        Arc::new(ConstantRegressor { raw, calls: calls.regressor.clone() }),
    );
    (model, calls)
}

fn forecaster(source: SyntheticSwpc) -> KpForecaster {
    let (model, _) = stub_model(LOOK_BACK * MODEL_FEATURE_COLUMNS.len(), 30.0);
    KpForecaster::new(Box::new(source), Some(model))
        .with_look_back(LOOK_BACK)
        .with_fetch_timeout(StdDuration::from_millis(200))
        .with_noise_seed(Some(7))
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let output = forecaster(SyntheticSwpc::new(-2.0, 450.0)).run_forecast_pipeline().await.unwrap();

    assert_eq!(output.predicted_kp, 3.0);
    assert_eq!(output.features.len(), TICKS - WARM_UP_ROWS);
    assert_eq!(output.kp_history.len(), 4);
    assert!(output.features.values.iter().flatten().all(|v| v.is_finite()));
}

#[tokio::test]
async fn test_storm_forecast_runs_above_nominal() {
    let storm = forecaster(SyntheticSwpc::new(-15.0, 700.0)).run_forecast_pipeline().await.unwrap();
    let nominal = forecaster(SyntheticSwpc::new(0.0, 400.0)).run_forecast_pipeline().await.unwrap();
    assert_eq!(storm.predicted_kp, nominal.predicted_kp);

    let storm_curve = generate_72h_forecast(storm.predicted_kp, &storm.features, now(), &mut ZeroNoise);
    let nominal_curve = generate_72h_forecast(nominal.predicted_kp, &nominal.features, now(), &mut ZeroNoise);

    assert_eq!(nominal_curve[0].forecast_kp, 3.0);
    for i in 0..12 {
        assert!(storm_curve[i].forecast_kp > nominal_curve[i].forecast_kp, "hour {}", i);
    }
}

#[tokio::test]
async fn test_magnetic_timeout_is_insufficient_data() {
    let mut source = SyntheticSwpc::new(-2.0, 450.0);
    source.slow_feed = Some(FeedKind::Magnetic);

    let (model, calls) = stub_model(LOOK_BACK * MODEL_FEATURE_COLUMNS.len(), 30.0);
    let forecaster = KpForecaster::new(Box::new(source), Some(model))
        .with_fetch_timeout(StdDuration::from_millis(50));

    let err = tokio::time::timeout(StdDuration::from_secs(5), forecaster.run_forecast_pipeline())
        .await
        .expect("pipeline must not hang on a slow feed")
        .unwrap_err();

    assert!(matches!(err, PipelineError::InsufficientData(ref feeds) if feeds == "magnetic"));
    assert_eq!(calls.scaler.load(Ordering::SeqCst), 0);
    assert_eq!(calls.regressor.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_short_history_and_wrong_width() {
    let (model, calls) = stub_model(LOOK_BACK * MODEL_FEATURE_COLUMNS.len(), 30.0);
    let long_window = KpForecaster::new(Box::new(SyntheticSwpc::new(0.0, 400.0)), Some(model)).with_look_back(40);
    let err = long_window.run_forecast_pipeline().await.unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientHistory { required: 40, actual } if actual == TICKS - WARM_UP_ROWS));
    assert_eq!(calls.scaler.load(Ordering::SeqCst), 0);

    let (model, calls) = stub_model(25 * LOOK_BACK, 30.0);
    let stale_artifact = KpForecaster::new(Box::new(SyntheticSwpc::new(0.0, 400.0)), Some(model));
    let err = stale_artifact.run_forecast_pipeline().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FeatureShapeMismatch);
    assert_eq!(calls.regressor.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_model_is_service_unavailable() {
    let forecaster = KpForecaster::new(Box::new(SyntheticSwpc::new(0.0, 400.0)), None);
    let err = forecaster.full_forecast(now()).await.unwrap_err();

    let failure = PipelineFailure::from(&err);
    assert_eq!(failure.kind, ErrorKind::ModelUnavailable);
    assert_eq!(serde_json::to_value(&failure).unwrap()["kind"], "model_unavailable");
}

#[tokio::test]
async fn test_full_report_shape() {
    let report = forecaster(SyntheticSwpc::new(-2.0, 450.0)).full_forecast(now()).await.unwrap();

    assert_eq!(report.forecast_72h.len(), 72);
    assert_eq!(report.current_forecast.forecast_kp, 3.0);
    assert_eq!(report.current_forecast.official_scale, "3o");
    assert_eq!(report.current_forecast.geomagnetic_latitude, 60.0);
    assert_eq!(report.metadata.model_confidence, 0.85);
    assert_eq!(report.metadata.geomagnetic_pole.lat, 80.37);
    assert!(report.metadata.last_solar_wind_update <= now());
    assert!(!report.historical_24h.is_empty());
    assert!(report.historical_24h.iter().all(|p| p.kp_index == 3.0));
    assert!(!report.solar_terminator.is_empty());
}

#[tokio::test]
async fn test_offset_forecast_picks_hour() {
    let forecaster = forecaster(SyntheticSwpc::new(-2.0, 450.0));

    let at = forecaster.forecast_at_offset(5.5, now()).await.unwrap();
    assert_eq!(at.forecast.time, now() + Duration::hours(5));
    assert_eq!(at.target_time, now() + Duration::minutes(330));

    let last = forecaster.forecast_at_offset(72.0, now()).await.unwrap();
    assert_eq!(last.forecast.time, now() + Duration::hours(71));

    let err = forecaster.forecast_at_offset(-1.0, now()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn test_quiet_aviation_briefing() {
    let report = forecaster(SyntheticSwpc::new(0.0, 400.0)).aviation_report(now()).await.unwrap();
    assert!(report.blocks.is_empty());
    assert!(report.aviation_impact_report.starts_with("### No Significant Impact Expected"));
}
