use crate::models::FeedPayload;
use chrono::{DateTime, Duration, DurationRound, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// One parsed feed row. Unparseable cells are `None`, never an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: Option<DateTime<Utc>>,
    pub values: Vec<Option<f64>>,
}

/// Canonical form of a single feed: named numeric columns keyed by UTC time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub fields: Vec<String>,
    pub records: Vec<Record>,
}

impl TimeSeries {
    pub fn empty(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Non-null `(timestamp, value)` pairs of one column, sorted by time.
    pub fn points(&self, name: &str) -> Vec<(DateTime<Utc>, f64)> {
        let Some(col) = self.field_index(name) else {
            return Vec::new();
        };
        let mut points: Vec<(DateTime<Utc>, f64)> = self.records.iter()
            .filter_map(|r| Some((r.timestamp?, r.values.get(col).copied().flatten()?)))
            .collect();
        points.sort_by_key(|p| p.0);
        points
    }
}

/// Parse a `[header, row, row, ...]` payload. The header names the columns;
/// `time_field` becomes the timestamp, `numeric_fields` the value columns.
/// Fewer than two rows (no header + data) gives an empty series.
pub fn normalize_feed(payload: &FeedPayload, time_field: &str, numeric_fields: &[&str]) -> TimeSeries {
    let mut series = TimeSeries::empty(numeric_fields);

    let Some(header) = payload.header() else {
        return series;
    };
    if payload.rows.len() < 2 {
        return series;
    }

    let position = |name: &str| header.iter().position(|h| h.as_str() == Some(name));
    let time_col = position(time_field);
    let value_cols: Vec<Option<usize>> = numeric_fields.iter().map(|f| position(*f)).collect();

    for row in payload.data_rows() {
        let timestamp = time_col
            .and_then(|i| row.get(i))
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp);

        let values = value_cols.iter()
            .map(|col| col.and_then(|i| row.get(i)).and_then(parse_number))
            .collect();

        series.records.push(Record { timestamp, values });
    }

    series
}

/// SWPC uses `2024-05-10 12:00:00.000`; ISO-8601 variants are accepted too.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS.iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Several series joined on a shared time axis. Column-major: `values[col][row]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl MergedSeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        let i = self.columns.iter().position(|c| c == name)?;
        Some(&self.values[i])
    }
}

/// Outer join on timestamp. Rows come out sorted ascending with one row per
/// distinct timestamp; within a source the last record for a timestamp wins.
/// Records whose timestamp failed to parse cannot be joined and are skipped.
pub fn outer_join(series_list: &[&TimeSeries]) -> MergedSeries {
    let columns: Vec<String> = series_list.iter()
        .flat_map(|s| s.fields.iter().cloned())
        .collect();
    let width = columns.len();

    let mut rows: BTreeMap<DateTime<Utc>, Vec<Option<f64>>> = BTreeMap::new();
    let mut offset = 0;

    for series in series_list {
        let mut records: Vec<(DateTime<Utc>, &Record)> = series.records.iter()
            .filter_map(|r| r.timestamp.map(|ts| (ts, r)))
            .collect();
        // Stable: equal timestamps keep feed order, so the later one overwrites.
        records.sort_by_key(|(ts, _)| *ts);

        for (ts, record) in records {
            let row = rows.entry(ts).or_insert_with(|| vec![None; width]);
            for (j, v) in record.values.iter().enumerate().take(series.fields.len()) {
                row[offset + j] = *v;
            }
        }
        offset += series.fields.len();
    }

    let mut values = vec![Vec::with_capacity(rows.len()); width];
    let mut timestamps = Vec::with_capacity(rows.len());
    for (ts, row) in rows {
        timestamps.push(ts);
        for (col, v) in row.into_iter().enumerate() {
            values[col].push(v);
        }
    }

    MergedSeries { timestamps, columns, values }
}

/// Longest span the grid covers, ending at the last timestamp. The SWPC
/// products carry at most a week of data.
pub const MAX_GRID_SPAN_DAYS: i64 = 10;

/// Re-index onto a uniform grid from `floor(first, step)` to the last timestamp.
/// Each column is interpolated linearly in time between its observations,
/// forward-filled past the last one and backward-filled before the first.
/// A column with no observations at all stays `None`.
///
/// The grid never reaches back more than `MAX_GRID_SPAN_DAYS` before the last
/// timestamp; older observations are ignored.
pub fn resample_interpolated(merged: &MergedSeries, step: Duration) -> MergedSeries {
    let (Some(first), Some(last)) = (merged.timestamps.first(), merged.timestamps.last()) else {
        return MergedSeries { columns: merged.columns.clone(), values: vec![Vec::new(); merged.columns.len()], ..Default::default() };
    };

    let mut start = first.duration_trunc(step).unwrap_or(*first);
    let earliest = *last - Duration::days(MAX_GRID_SPAN_DAYS);
    if start < earliest {
        warn!(
            "Merged series spans {} days ({} .. {}), keeping the last {} days",
            (*last - start).num_days(),
            first,
            last,
            MAX_GRID_SPAN_DAYS
        );
        start = earliest.duration_trunc(step).unwrap_or(earliest);
    }
    let mut grid = Vec::new();
    let mut tick = start;
    while tick <= *last {
        grid.push(tick);
        tick += step;
    }

    let values = merged.values.iter()
        .map(|column| {
            let observations: Vec<(i64, f64)> = merged.timestamps.iter()
                .zip(column)
                .filter(|(ts, _)| **ts >= start)
                .filter_map(|(ts, v)| v.map(|v| (ts.timestamp_millis(), v)))
                .collect();
            grid.iter()
                .map(|t| interpolate_at(&observations, t.timestamp_millis()))
                .collect()
        })
        .collect();

    MergedSeries { timestamps: grid, columns: merged.columns.clone(), values }
}

fn interpolate_at(observations: &[(i64, f64)], t: i64) -> Option<f64> {
    let (first, last) = (observations.first()?, observations.last()?);
    let right = observations.partition_point(|o| o.0 < t);

    if right < observations.len() && observations[right].0 == t {
        return Some(observations[right].1);
    }
    if right == 0 {
        return Some(first.1);
    }
    if right == observations.len() {
        return Some(last.1);
    }

    let (t0, v0) = observations[right - 1];
    let (t1, v1) = observations[right];
    let frac = (t - t0) as f64 / (t1 - t0) as f64;
    Some(v0 + (v1 - v0) * frac)
}

/// Forward-fill a sparse series onto a regular grid starting at the first
/// point floored to `step`. A tick takes the latest value at or before it.
pub fn resample_forward_fill(points: &[(DateTime<Utc>, f64)], step: Duration) -> Vec<(DateTime<Utc>, f64)> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.0);

    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };

    let mut result = Vec::new();
    let mut current: Option<f64> = None;
    let mut iter = sorted.iter().peekable();
    let mut tick = first.0.duration_trunc(step).unwrap_or(first.0);

    while tick <= last.0 {
        while let Some((ts, v)) = iter.peek() {
            if *ts <= tick {
                current = Some(*v);
                iter.next();
            } else {
                break;
            }
        }
        if let Some(v) = current {
            result.push((tick, v));
        }
        tick += step;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_normalize_plasma_feed() {
        let payload = FeedPayload::new(vec![
            vec![json!("time_tag"), json!("density"), json!("speed"), json!("temperature")],
            vec![json!("2024-05-10 00:00:00.000"), json!("4.9"), json!("402.5"), json!("81000")],
            vec![json!("2024-05-10 00:01:00.000"), json!(null), json!("bad"), json!("81000")],
        ]);

        let series = normalize_feed(&payload, "time_tag", &["density", "speed"]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.records[0].timestamp, Some(ts(0, 0)));
        assert_eq!(series.records[0].values, vec![Some(4.9), Some(402.5)]);
        // malformed cells become None, the row survives
        assert_eq!(series.records[1].values, vec![None, None]);
        assert_eq!(series.records[1].timestamp, Some(ts(0, 1)));
    }

    #[test]
    fn test_bad_timestamp_is_null_not_error() {
        let payload = FeedPayload::new(vec![
            vec![json!("time_tag"), json!("Kp")],
            vec![json!("yesterday"), json!("3.33")],
        ]);
        let series = normalize_feed(&payload, "time_tag", &["Kp"]);
        assert_eq!(series.records[0].timestamp, None);
        assert_eq!(series.records[0].values, vec![Some(3.33)]);
    }

    #[test]
    fn test_header_only_payload_is_empty() {
        let payload = FeedPayload::new(vec![vec![json!("time_tag"), json!("Kp")]]);
        assert!(normalize_feed(&payload, "time_tag", &["Kp"]).is_empty());
        assert!(normalize_feed(&FeedPayload::default(), "time_tag", &["Kp"]).is_empty());
    }

    #[test]
    fn test_missing_header_field_gives_null_column() {
        let payload = FeedPayload::new(vec![
            vec![json!("time_tag"), json!("bt")],
            vec![json!("2024-05-10 00:00:00.000"), json!("6.1")],
        ]);
        let series = normalize_feed(&payload, "time_tag", &["bz_gsm", "bt"]);
        assert_eq!(series.records[0].values, vec![None, Some(6.1)]);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("2024-05-10 00:15:00.000"), Some(ts(0, 15)));
        assert_eq!(parse_timestamp("2024-05-10T00:15:00Z"), Some(ts(0, 15)));
        assert_eq!(parse_timestamp("2024-05-10 00:15"), Some(ts(0, 15)));
        assert_eq!(parse_timestamp("n/a"), None);
    }

    #[test]
    fn test_outer_join_sorts_and_last_duplicate_wins() {
        let a = TimeSeries {
            fields: vec!["x".into()],
            records: vec![
                Record { timestamp: Some(ts(1, 0)), values: vec![Some(1.0)] },
                Record { timestamp: Some(ts(0, 0)), values: vec![Some(0.0)] },
                Record { timestamp: Some(ts(1, 0)), values: vec![Some(9.0)] },
                Record { timestamp: None, values: vec![Some(5.0)] },
            ],
        };
        let b = TimeSeries {
            fields: vec!["y".into()],
            records: vec![Record { timestamp: Some(ts(0, 30)), values: vec![Some(2.0)] }],
        };

        let merged = outer_join(&[&a, &b]);
        assert_eq!(merged.timestamps, vec![ts(0, 0), ts(0, 30), ts(1, 0)]);
        assert_eq!(merged.column("x").unwrap(), &[Some(0.0), None, Some(9.0)]);
        assert_eq!(merged.column("y").unwrap(), &[None, Some(2.0), None]);
    }

    #[test]
    fn test_resample_interpolates_and_fills_edges() {
        let merged = MergedSeries {
            timestamps: vec![ts(0, 7), ts(0, 30), ts(1, 0), ts(1, 20)],
            columns: vec!["x".into(), "y".into()],
            values: vec![
                vec![None, Some(10.0), Some(20.0), None],
                vec![None, None, None, None],
            ],
        };

        let grid = resample_interpolated(&merged, Duration::minutes(15));
        assert_eq!(grid.timestamps, vec![ts(0, 0), ts(0, 15), ts(0, 30), ts(0, 45), ts(1, 0), ts(1, 15)]);

        let x = grid.column("x").unwrap();
        assert_eq!(x[0], Some(10.0)); // backward fill
        assert_eq!(x[1], Some(10.0));
        assert_eq!(x[2], Some(10.0));
        assert_eq!(x[3], Some(15.0)); // interior interpolation
        assert_eq!(x[4], Some(20.0));
        assert_eq!(x[5], Some(20.0)); // forward fill
        assert!(grid.column("y").unwrap().iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_resample_ignores_stray_ancient_timestamp() {
        let stray = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        let merged = MergedSeries {
            timestamps: vec![stray, ts(0, 0), ts(1, 0)],
            columns: vec!["x".into()],
            values: vec![vec![Some(99.0), Some(1.0), Some(2.0)]],
        };

        let grid = resample_interpolated(&merged, Duration::minutes(15));
        assert_eq!(grid.len(), (MAX_GRID_SPAN_DAYS * 24 * 4 + 1) as usize);
        assert_eq!(grid.timestamps[0], ts(1, 0) - Duration::days(MAX_GRID_SPAN_DAYS));
        assert_eq!(grid.timestamps.last(), Some(&ts(1, 0)));

        let x = grid.column("x").unwrap();
        assert_eq!(x[0], Some(1.0)); // backfilled from the first in-window value
        assert_eq!(x[x.len() - 1], Some(2.0));
    }

    #[test]
    fn test_resample_forward_fill_hourly() {
        let points = vec![(ts(0, 0), 2.0), (ts(3, 0), 4.0)];
        let hourly = resample_forward_fill(&points, Duration::hours(1));
        let values: Vec<f64> = hourly.iter().map(|p| p.1).collect();
        assert_eq!(values, vec![2.0, 2.0, 2.0, 4.0]);
        assert_eq!(hourly[3].0, ts(3, 0));
    }
}
