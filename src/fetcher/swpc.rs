use async_trait::async_trait;
use crate::config::Settings;
use crate::models::FeedPayload;
use super::{FeedKind, FeedSource};
use anyhow::{Result, anyhow};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// NOAA Space Weather Prediction Center JSON products.
pub struct SwpcFetcher {
    client: Client,
    plasma_url: String,
    mag_url: String,
    kp_history_url: String,
    kp_forecast_url: String,
    timeout: Duration,
    forecast_timeout: Duration,
}

impl SwpcFetcher {
    pub fn new(settings: &Settings) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("KpForecaster/1.0"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            plasma_url: settings.plasma_url.clone(),
            mag_url: settings.mag_url.clone(),
            kp_history_url: settings.kp_history_url.clone(),
            kp_forecast_url: settings.kp_forecast_url.clone(),
            timeout: settings.fetch_timeout,
            forecast_timeout: settings.forecast_feed_timeout,
        }
    }

    fn endpoint(&self, feed: FeedKind) -> &str {
        match feed {
            FeedKind::Plasma => &self.plasma_url,
            FeedKind::Magnetic => &self.mag_url,
            FeedKind::KpHistory => &self.kp_history_url,
            FeedKind::KpForecast => &self.kp_forecast_url,
        }
    }

    async fn try_fetch(&self, feed: FeedKind) -> Result<FeedPayload> {
        let url = self.endpoint(feed);
        let timeout = match feed {
            FeedKind::KpForecast => self.forecast_timeout,
            _ => self.timeout,
        };

        debug!("Fetching SWPC {} feed: {}", feed.name(), url);

        let resp = self.client.get(url).timeout(timeout).send().await?;

        if !resp.status().is_success() {
            return Err(anyhow!("SWPC API Error: {} for {}", resp.status(), url));
        }

        let json: Value = resp.json().await?;
        Self::parse_payload(json)
    }

    fn parse_payload(json: Value) -> Result<FeedPayload> {
        FeedPayload::from_json(json)
            .ok_or_else(|| anyhow!("SWPC response is not a table of rows"))
    }
}

#[async_trait]
impl FeedSource for SwpcFetcher {
    fn name(&self) -> &str {
        "swpc"
    }

    async fn fetch_feed(&self, feed: FeedKind) -> Option<FeedPayload> {
        match self.try_fetch(feed).await {
            Ok(payload) => {
                debug!("SWPC {} feed: {} rows", feed.name(), payload.rows.len());
                Some(payload)
            }
            Err(e) => {
                warn!("Error fetching {} ({}): {}", feed.name(), self.endpoint(feed), e);
                None
            }
        }
    }
}
