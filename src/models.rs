use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::{DateTime, Utc};

/// One feed response as served by SWPC: `[header_row, data_row, data_row, ...]`.
/// Cells are usually strings, but numbers and nulls show up in some products.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedPayload {
    pub rows: Vec<Vec<Value>>,
}

impl FeedPayload {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self { rows }
    }

    /// Accepts any JSON value; anything that is not an array of arrays is rejected.
    pub fn from_json(json: Value) -> Option<Self> {
        let rows = json.as_array()?
            .iter()
            .map(|row| row.as_array().cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(Self { rows })
    }

    pub fn header(&self) -> Option<&[Value]> {
        self.rows.first().map(|r| r.as_slice())
    }

    pub fn data_rows(&self) -> &[Vec<Value>] {
        if self.rows.len() < 2 { &[] } else { &self.rows[1..] }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastPoint {
    pub time: DateTime<Utc>,
    pub forecast_kp: f64,
    pub geomagnetic_latitude: f64,
    pub official_scale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KpHistoryPoint {
    pub time: DateTime<Utc>,
    pub kp_index: f64,
    pub official_scale: String,
    pub geomagnetic_latitude: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuroraDetails {
    pub level: AuroraLevel,
    pub color: String,
    pub radius_factor: u32,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuroraLevel {
    High,
    Moderate,
    Low,
    Minimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentForecast {
    pub forecast_kp: f64,
    pub official_scale: String,
    pub geomagnetic_latitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub model_confidence: f64,
    pub last_solar_wind_update: DateTime<Utc>,
    pub geomagnetic_pole: GeoPoint,
}

/// Everything a dashboard needs for one refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastReport {
    pub last_updated: DateTime<Utc>,
    pub current_forecast: CurrentForecast,
    pub historical_24h: Vec<KpHistoryPoint>,
    pub forecast_72h: Vec<ForecastPoint>,
    pub aurora_details: AuroraDetails,
    pub solar_terminator: Vec<GeoPoint>,
    pub metadata: ReportMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetForecast {
    pub target_time: DateTime<Utc>,
    pub forecast: ForecastPoint,
    pub solar_terminator: Vec<GeoPoint>,
    pub aurora_details: AuroraDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatitudeReport {
    pub kp_index: f64,
    pub geomagnetic_latitude: f64,
    pub official_scale: String,
    pub aurora_details: AuroraDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImpactBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kp_index: f64,
    pub regions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AviationReport {
    pub aviation_impact_report: String,
    pub blocks: Vec<ImpactBlock>,
}
