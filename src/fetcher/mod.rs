use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;
use crate::models::FeedPayload;

pub mod swpc;

/// The SWPC products the forecaster consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Plasma,
    Magnetic,
    KpHistory,
    /// Official 3-day Kp forecast, only used by the aviation briefing.
    KpForecast,
}

impl FeedKind {
    pub fn name(&self) -> &'static str {
        match self {
            FeedKind::Plasma => "plasma",
            FeedKind::Magnetic => "magnetic",
            FeedKind::KpHistory => "kp_historical",
            FeedKind::KpForecast => "kp_forecast",
        }
    }

    /// Name of the timestamp column in the feed header.
    pub fn time_field(&self) -> &'static str {
        "time_tag"
    }

    /// Numeric columns parsed out of the feed, in the feed's own vocabulary.
    pub fn numeric_fields(&self) -> &'static [&'static str] {
        match self {
            FeedKind::Plasma => &["density", "speed"],
            FeedKind::Magnetic => &["bz_gsm", "bt"],
            FeedKind::KpHistory => &["Kp"],
            FeedKind::KpForecast => &["kp"],
        }
    }
}

/// A remote time-series provider. Implementations never fail past this
/// boundary: any network, status, or decoding problem yields `None`.
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_feed(&self, feed: FeedKind) -> Option<FeedPayload>;
}

/// Outcome of the fan-out over the three pipeline feeds.
#[derive(Debug, Clone, Default)]
pub struct PipelineFeeds {
    pub plasma: Option<FeedPayload>,
    pub magnetic: Option<FeedPayload>,
    pub kp_history: Option<FeedPayload>,
}

/// Fetch one feed under its own timeout. A timeout is just another `None`.
pub async fn fetch_with_timeout(source: &dyn FeedSource, feed: FeedKind, timeout: Duration) -> Option<FeedPayload> {
    match tokio::time::timeout(timeout, source.fetch_feed(feed)).await {
        Ok(payload) => payload,
        Err(_) => {
            warn!("{} feed '{}' timed out after {:?}", source.name(), feed.name(), timeout);
            None
        }
    }
}

/// Request plasma, magnetic field and Kp history concurrently. Each request
/// completes or times out on its own; one failure does not cancel the others.
pub async fn fetch_pipeline_feeds(source: &dyn FeedSource, timeout: Duration) -> PipelineFeeds {
    let (plasma, magnetic, kp_history) = tokio::join!(
        fetch_with_timeout(source, FeedKind::Plasma, timeout),
        fetch_with_timeout(source, FeedKind::Magnetic, timeout),
        fetch_with_timeout(source, FeedKind::KpHistory, timeout),
    );

    PipelineFeeds { plasma, magnetic, kp_history }
}
