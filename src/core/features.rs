use crate::analysis::statistics::{difference, rolling_mean, rolling_std, shift};
use crate::core::timeseries::{outer_join, resample_interpolated, MergedSeries, Record, TimeSeries};
use crate::error::PipelineError;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use tracing::debug;

// ============================================================================
// SHARED VOCABULARY
// ============================================================================

pub const PLASMA_SPEED: &str = "plasma_speed";
pub const PROTON_DENSITY: &str = "proton_density";
pub const BT: &str = "bt";
pub const BZ_GSM: &str = "bz_gsm";
pub const KP_INDEX: &str = "kp_index";

pub const NOWCAST_KP: &str = "nowcast_kp";
pub const DYNAMIC_PRESSURE: &str = "dynamic_pressure";
pub const BZ_MAGNITUDE: &str = "bz_magnitude";
pub const BZ_NEGATIVE: &str = "bz_negative";
pub const KP_TREND_1H: &str = "kp_trend_1h";
pub const KP_TREND_3H: &str = "kp_trend_3h";

/// Grid resolution of the merged series.
pub const GRID_MINUTES: i64 = 15;

/// Ticks per hour on the 15-minute grid.
const TICKS_PER_HOUR: usize = 4;

/// The Kp reference is delayed by 3 h so the model never sees the value it predicts.
pub const NOWCAST_LAG: usize = 3 * TICKS_PER_HOUR;
pub const TREND_1H_LAG: usize = TICKS_PER_HOUR;
pub const TREND_3H_LAG: usize = 3 * TICKS_PER_HOUR;

/// Rolling windows: (suffix, ticks). The std window reuses the 3 h length.
pub const ROLLING_MEAN_WINDOWS: [(&str, usize); 3] = [
    ("1h_mean", TICKS_PER_HOUR),
    ("3h_mean", 3 * TICKS_PER_HOUR),
    ("6h_mean", 6 * TICKS_PER_HOUR),
];
pub const ROLLING_STD_WINDOW: (&str, usize) = ("3h_std", 3 * TICKS_PER_HOUR);

/// Solar-wind quantities that get rolling statistics, in column order.
pub const SOLAR_WIND_FEATURES: [&str; 4] = [BT, BZ_GSM, PROTON_DENSITY, PLASMA_SPEED];

const LONGEST_WINDOW: usize = 6 * TICKS_PER_HOUR;

/// Rows lost at the head of a gap-free grid: the longer of the 6 h rolling
/// warm-up (`window - 1` rows) and the lagged 3 h Kp trend.
pub const WARM_UP_ROWS: usize = max_usize(LONGEST_WINDOW - 1, NOWCAST_LAG + TREND_3H_LAG);

const fn max_usize(a: usize, b: usize) -> usize {
    if a > b { a } else { b }
}

/// Every column of the feature table, in contract order.
pub static FEATURE_COLUMNS: Lazy<Vec<String>> = Lazy::new(|| {
    let mut columns: Vec<String> = [PLASMA_SPEED, PROTON_DENSITY, BT, BZ_GSM, KP_INDEX,
        NOWCAST_KP, DYNAMIC_PRESSURE, BZ_MAGNITUDE, BZ_NEGATIVE]
        .iter()
        .map(|c| c.to_string())
        .collect();

    for feature in SOLAR_WIND_FEATURES {
        for (suffix, _) in ROLLING_MEAN_WINDOWS {
            columns.push(format!("{}_{}", feature, suffix));
        }
        columns.push(format!("{}_{}", feature, ROLLING_STD_WINDOW.0));
    }

    columns.push(KP_TREND_1H.to_string());
    columns.push(KP_TREND_3H.to_string());
    columns
});

/// Columns fed to the model: everything except the raw Kp reference column.
pub static MODEL_FEATURE_COLUMNS: Lazy<Vec<String>> = Lazy::new(|| {
    FEATURE_COLUMNS.iter()
        .filter(|c| c.as_str() != KP_INDEX)
        .cloned()
        .collect()
});

// ============================================================================
// FEATURE TABLE
// ============================================================================

/// Fully populated engineered features on the 15-minute grid.
/// Column-major: `values[col][row]`, columns in `FEATURE_COLUMNS` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub timestamps: Vec<DateTime<Utc>>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        let i = self.columns.iter().position(|c| c == name)?;
        Some(&self.values[i])
    }

    /// Latest value of a column.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.column(name)?.last().copied()
    }

    /// Last `n` values of a column (fewer if the table is shorter).
    pub fn tail(&self, name: &str, n: usize) -> Option<&[f64]> {
        let col = self.column(name)?;
        Some(&col[col.len().saturating_sub(n)..])
    }

    /// Last `n` rows of the given columns, flattened row-major.
    /// Missing columns are skipped, so callers must check the width.
    pub fn flatten_tail(&self, columns: &[String], n: usize) -> Vec<f64> {
        let selected: Vec<&[f64]> = columns.iter()
            .filter_map(|c| self.column(c))
            .collect();
        let start = self.len().saturating_sub(n);

        let mut flat = Vec::with_capacity(selected.len() * (self.len() - start));
        for row in start..self.len() {
            for col in &selected {
                flat.push(col[row]);
            }
        }
        flat
    }
}

// ============================================================================
// SYNTHESIS
// ============================================================================

/// Merge plasma, magnetic field and Kp history into the engineered feature
/// table. An input with no timestamped records, or missing one of its
/// columns entirely, fails fast: the outer join needs all three.
pub fn synthesize_features(
    plasma: &TimeSeries,
    magnetic: &TimeSeries,
    kp_history: &TimeSeries,
) -> Result<FeatureTable, PipelineError> {
    // 1. Shared vocabulary, joinable records only
    let mut plasma = select(plasma, &[("speed", PLASMA_SPEED), ("density", PROTON_DENSITY)]);
    let mut magnetic = select(magnetic, &[("bt", BT), ("bz_gsm", BZ_GSM)]);
    let mut kp = select(kp_history, &[("Kp", KP_INDEX)]);
    for s in [&mut plasma, &mut magnetic, &mut kp] {
        s.records.retain(|r| r.timestamp.is_some());
    }

    // A feed is unusable when nothing is left to join or a required column never has a value
    let unusable: Vec<&str> = [("plasma", &plasma), ("magnetic", &magnetic), ("kp_historical", &kp)]
        .iter()
        .filter(|(_, s)| !is_usable(s))
        .map(|(name, _)| *name)
        .collect();
    if !unusable.is_empty() {
        return Err(PipelineError::InsufficientData(unusable.join(", ")));
    }

    // 2. Outer join, sorted, one row per timestamp
    let merged = outer_join(&[&plasma, &magnetic, &kp]);

    // 3. Uniform grid with interpolation and edge fills
    let grid = resample_interpolated(&merged, Duration::minutes(GRID_MINUTES));
    debug!("Merged {} raw rows onto {} grid ticks", merged.len(), grid.len());

    // 4-6. Derived columns
    let derived = derive_columns(&grid);

    // 7. Drop incomplete rows
    Ok(drop_incomplete_rows(&grid.timestamps, derived))
}

/// Pick the named fields out of a series and rename them. Fields the feed did
/// not carry come through as all-`None` columns.
fn select(series: &TimeSeries, mapping: &[(&str, &str)]) -> TimeSeries {
    let indices: Vec<Option<usize>> = mapping.iter().map(|(from, _)| series.field_index(from)).collect();
    TimeSeries {
        fields: mapping.iter().map(|(_, to)| to.to_string()).collect(),
        records: series.records.iter()
            .map(|r| Record {
                timestamp: r.timestamp,
                values: indices.iter().map(|i| i.and_then(|i| r.values.get(i).copied().flatten())).collect(),
            })
            .collect(),
    }
}

fn is_usable(series: &TimeSeries) -> bool {
    !series.is_empty()
        && (0..series.fields.len()).all(|col| series.records.iter().any(|r| r.values[col].is_some()))
}

fn derive_columns(grid: &MergedSeries) -> Vec<(String, Vec<Option<f64>>)> {
    let n = grid.len();
    let col = |name: &str| -> Vec<Option<f64>> {
        grid.column(name).map(|c| c.to_vec()).unwrap_or_else(|| vec![None; n])
    };

    let speed = col(PLASMA_SPEED);
    let density = col(PROTON_DENSITY);
    let bt = col(BT);
    let bz = col(BZ_GSM);
    let kp = col(KP_INDEX);

    let nowcast = shift(&kp, NOWCAST_LAG);
    let dynamic_pressure: Vec<Option<f64>> = density.iter()
        .zip(&speed)
        .map(|(d, v)| Some(1.67e-6 * (*d)? * (*v)?.powi(2)))
        .collect();
    let bz_magnitude: Vec<Option<f64>> = bz.iter().map(|b| b.map(f64::abs)).collect();
    let bz_negative: Vec<Option<f64>> = bz.iter()
        .map(|b| b.map(|b| if b < 0.0 { 1.0 } else { 0.0 }))
        .collect();

    let mut columns: Vec<(String, Vec<Option<f64>>)> = vec![
        (PLASMA_SPEED.to_string(), speed.clone()),
        (PROTON_DENSITY.to_string(), density.clone()),
        (BT.to_string(), bt.clone()),
        (BZ_GSM.to_string(), bz.clone()),
        (KP_INDEX.to_string(), kp),
        (NOWCAST_KP.to_string(), nowcast.clone()),
        (DYNAMIC_PRESSURE.to_string(), dynamic_pressure),
        (BZ_MAGNITUDE.to_string(), bz_magnitude),
        (BZ_NEGATIVE.to_string(), bz_negative),
    ];

    for (feature, values) in [(BT, &bt), (BZ_GSM, &bz), (PROTON_DENSITY, &density), (PLASMA_SPEED, &speed)] {
        for (suffix, window) in ROLLING_MEAN_WINDOWS {
            columns.push((format!("{}_{}", feature, suffix), rolling_mean(values, window)));
        }
        let (suffix, window) = ROLLING_STD_WINDOW;
        columns.push((format!("{}_{}", feature, suffix), rolling_std(values, window)));
    }

    columns.push((KP_TREND_1H.to_string(), difference(&nowcast, TREND_1H_LAG)));
    columns.push((KP_TREND_3H.to_string(), difference(&nowcast, TREND_3H_LAG)));

    debug_assert!(columns.iter().map(|(c, _)| c).eq(FEATURE_COLUMNS.iter()));
    columns
}

fn drop_incomplete_rows(timestamps: &[DateTime<Utc>], columns: Vec<(String, Vec<Option<f64>>)>) -> FeatureTable {
    let keep: Vec<usize> = (0..timestamps.len())
        .filter(|&row| columns.iter().all(|(_, values)| values[row].is_some_and(f64::is_finite)))
        .collect();

    let mut table = FeatureTable {
        timestamps: keep.iter().map(|&row| timestamps[row]).collect(),
        columns: Vec::with_capacity(columns.len()),
        values: Vec::with_capacity(columns.len()),
    };

    for (name, values) in columns {
        table.values.push(keep.iter().filter_map(|&row| values[row]).collect());
        table.columns.push(name);
    }

    table
}
