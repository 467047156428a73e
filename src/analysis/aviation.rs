use crate::analysis::geo::{aurora_oval, is_on_night_side, COUNTRIES};
use crate::analysis::scale::{geomagnetic_latitude, official_kp_string};
use crate::core::timeseries::{normalize_feed, TimeSeries};
use crate::error::PipelineError;
use crate::fetcher::{fetch_with_timeout, FeedKind, FeedSource};
use crate::models::{AviationReport, ImpactBlock};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::time::Duration as StdDuration;
use tracing::info;

/// Official forecast blocks are 3 hours long; 8 of them cover the next day.
const BLOCK_HOURS: i64 = 3;
const BLOCKS_PER_DAY: usize = 8;

/// Blocks below this Kp have no operational impact worth reporting.
pub const SIGNIFICANT_KP: f64 = 4.0;

pub const NO_IMPACT_REPORT: &str = "### No Significant Impact Expected\n\
* **Forecast:** Geomagnetic activity is predicted to remain below Kp 4 for the next 24 hours.\n\
* **Recommendation:** Standard flight operations, including polar routes, are cleared. No space weather-related rerouting is anticipated.";

/// Fetch NOAA's official 3-day Kp forecast and turn the next 24 h into a briefing.
pub async fn aviation_forecast(
    source: &dyn FeedSource,
    timeout: StdDuration,
    now: DateTime<Utc>,
) -> Result<AviationReport, PipelineError> {
    let feed = FeedKind::KpForecast;
    let payload = fetch_with_timeout(source, feed, timeout)
        .await
        .ok_or_else(|| PipelineError::FeedUnavailable(feed.name().to_string()))?;

    let forecast = normalize_feed(&payload, feed.time_field(), feed.numeric_fields());
    if forecast.is_empty() {
        return Err(PipelineError::FeedUnavailable(format!("{} returned no data rows", feed.name())));
    }

    let blocks = impact_blocks(&forecast, now);
    info!("Aviation briefing: {} significant block(s) in the next 24h", blocks.len());
    Ok(build_report(blocks))
}

/// Blocks in the next 24 h with Kp at or above 4 that put the oval over
/// night-side airspace. Rows with a missing time or Kp are ignored.
pub fn impact_blocks(forecast: &TimeSeries, now: DateTime<Utc>) -> Vec<ImpactBlock> {
    let block = Duration::hours(BLOCK_HOURS);

    forecast.points("kp")
        .into_iter()
        .filter(|(start, _)| *start + block > now)
        .take(BLOCKS_PER_DAY)
        .filter(|(_, kp)| *kp >= SIGNIFICANT_KP)
        .filter_map(|(start, kp)| {
            let regions = affected_regions(kp, start);
            if regions.is_empty() {
                return None;
            }
            Some(ImpactBlock { start, end: start + block, kp_index: kp, regions })
        })
        .collect()
}

/// Countries with an oval point on the night side at `t`, sorted by name.
pub fn affected_regions(kp: f64, t: DateTime<Utc>) -> Vec<String> {
    let oval = aurora_oval(geomagnetic_latitude(kp));

    let names: BTreeSet<&str> = oval.iter()
        .filter(|p| is_on_night_side(p.lat, p.lng, t))
        .flat_map(|p| COUNTRIES.iter().filter(move |c| c.contains(p.lat, p.lng)))
        .map(|c| c.name)
        .collect();

    names.into_iter().map(String::from).collect()
}

pub fn build_report(blocks: Vec<ImpactBlock>) -> AviationReport {
    if blocks.is_empty() {
        return AviationReport { aviation_impact_report: NO_IMPACT_REPORT.to_string(), blocks };
    }

    let Some(peak) = blocks.iter().max_by(|a, b| a.kp_index.total_cmp(&b.kp_index)) else {
        return AviationReport { aviation_impact_report: NO_IMPACT_REPORT.to_string(), blocks };
    };

    let mut report = String::from("### Geomagnetic Storm Aviation Briefing (Next 24 Hours)\n\n");

    report.push_str(&format!(
        "**Executive Summary:** {} forecast window(s) reach Kp 4 or higher. Activity peaks at Kp {:.1} ({}) from {} UTC, \
         pushing the auroral oval down to {:.1}° geomagnetic latitude.\n\n",
        blocks.len(),
        peak.kp_index,
        official_kp_string(Some(peak.kp_index)),
        peak.start.format("%H:%M"),
        geomagnetic_latitude(peak.kp_index),
    ));

    report.push_str("#### High-Risk Windows\n");
    for block in &blocks {
        report.push_str(&format!(
            "- **Time Block:** {} - {} UTC\n  - **Predicted Kp-Index:** {:.1}\n  - **Affected Night-Side Regions:** {}\n",
            block.start.format("%H:%M"),
            block.end.format("%H:%M"),
            block.kp_index,
            block.regions.join(", "),
        ));
    }

    let (hf, gnss) = if peak.kp_index >= 7.0 {
        ("HF radio blackouts are likely on polar and high-latitude tracks", "GNSS accuracy may degrade by tens of metres")
    } else if peak.kp_index >= 5.0 {
        ("Significant HF radio degradation is expected on polar routes", "GNSS accuracy may degrade at high latitudes")
    } else {
        ("Intermittent HF radio degradation is possible on polar routes", "Minor GNSS degradation is possible at high latitudes")
    };

    report.push_str("\n#### Operational Impact\n");
    report.push_str(&format!("* **HF Communications:** {}.\n", hf));
    report.push_str(&format!("* **Navigation:** {}.\n", gnss));

    report.push_str("\n#### Recommendations\n");
    report.push_str("* Plan polar and high-latitude flights on lower-latitude tracks during the windows above.\n");
    report.push_str("* Allow for reroute delays and adjust fuel planning on affected corridors.\n");

    AviationReport { aviation_impact_report: report, blocks }
}
