//! Three-day forecast with a file cache and an hourly refresh, plus the
//! irrigation advice derived from it.

pub mod cache;
pub mod models;
pub mod recommendation;

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Serialize;
use thiserror::Error;
use tokio::{sync::RwLock, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::notify::Notifier;

use self::{
    cache::WeatherCache,
    models::WeatherData,
    recommendation::{recommend, Recommendation},
};

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Weather API key is not configured")]
    MissingApiKey,

    #[error("Weather API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Weather request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid weather URL: {0}")]
    Url(String),
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            inner: Arc::new(Inner { http, base_url: base_url.trim_end_matches('/').to_owned() }),
        }
    }

    pub async fn forecast(&self, api_key: &str, location: &str) -> Result<WeatherData, WeatherError> {
        if api_key.is_empty() {
            return Err(WeatherError::MissingApiKey);
        }
        let endpoint = format!("{}/v1/forecast.json", self.inner.base_url);
        let url = Url::parse_with_params(
            &endpoint,
            [("key", api_key), ("q", location), ("days", "3"), ("aqi", "no"), ("alerts", "no")],
        )
        .map_err(|e| WeatherError::Url(e.to_string()))?;
        debug!(location = %location, "Fetching weather forecast");

        let response = self.inner.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::Api { status: status.as_u16(), body });
        }
        Ok(response.json().await?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeatherReport {
    pub location: String,
    pub last_update: DateTime<Utc>,
    pub weather: WeatherData,
    pub recommendation: Option<Recommendation>,
}

impl From<&WeatherCache> for WeatherReport {
    fn from(cache: &WeatherCache) -> Self {
        Self {
            location: cache.location.clone(),
            last_update: cache.last_update,
            recommendation: recommend(&cache.forecast.forecast.days),
            weather: cache.forecast.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherService {
    client: WeatherClient,
    api_key: String,
    location: String,
    cache_path: PathBuf,
    current: Arc<RwLock<Option<WeatherCache>>>,
    notifier: Notifier,
}

impl WeatherService {
    pub fn new(
        client: WeatherClient,
        api_key: &str,
        location: &str,
        cache_path: PathBuf,
        notifier: Notifier,
    ) -> Self {
        Self {
            client,
            api_key: api_key.to_owned(),
            location: location.to_owned(),
            cache_path,
            current: Arc::new(RwLock::new(None)),
            notifier,
        }
    }

    /// Latest known forecast, if any.
    pub async fn report(&self) -> Option<WeatherReport> {
        self.current.read().await.as_ref().map(WeatherReport::from)
    }

    /// Adopts the on-disk cache when it belongs to the configured key and
    /// location.
    pub async fn load_cache(&self) {
        if let Some(cached) = cache::load(&self.cache_path).await {
            if cached.matches(&self.api_key, &self.location) {
                info!(last_update = %cached.last_update, "Loaded cached weather forecast");
                *self.current.write().await = Some(cached);
            } else {
                debug!("Ignoring weather cache for a different key or location");
            }
        }
    }

    /// Fetches a fresh forecast and persists it.
    pub async fn refresh(&self) -> Result<WeatherReport, WeatherError> {
        let forecast = match self.client.forecast(&self.api_key, &self.location).await {
            Ok(forecast) => forecast,
            Err(e) => {
                self.notifier
                    .error("Failed to fetch weather data. Please check your API key and location.")
                    .await;
                return Err(e);
            }
        };

        let entry = WeatherCache {
            api_key: self.api_key.clone(),
            location: self.location.clone(),
            last_update: Utc::now(),
            forecast,
        };
        cache::save(&self.cache_path, &entry).await;
        let report = WeatherReport::from(&entry);
        *self.current.write().await = Some(entry);

        info!(location = %self.location, "Weather forecast updated");
        self.notifier.success("Weather data updated").await;
        Ok(report)
    }

    /// Refreshes only when nothing is cached or the cache is older than an
    /// hour. Returns whether a fetch happened.
    pub async fn refresh_if_stale(&self) -> Result<bool, WeatherError> {
        let stale = match self.current.read().await.as_ref() {
            Some(cached) => cached.is_stale(Utc::now()),
            None => true,
        };
        if !stale {
            debug!("Weather data is recent, skipping auto-fetch");
            return Ok(false);
        }
        self.refresh().await.map(|_| true)
    }

    /// Loads the cache, refreshes it if stale, then refreshes hourly until
    /// `cancel` fires. Spawn this via `tokio::spawn`.
    pub async fn run(self, cancel: CancellationToken) {
        if self.api_key.is_empty() {
            info!("WEATHER_API_KEY not set; weather refresh disabled");
            return;
        }

        self.load_cache().await;
        if let Err(e) = self.refresh_if_stale().await {
            warn!(error = %e, "Initial weather refresh failed");
        }

        let mut ticker = time::interval_at(time::Instant::now() + REFRESH_INTERVAL, REFRESH_INTERVAL);
        info!(interval_secs = REFRESH_INTERVAL.as_secs(), "Weather refresh loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!(error = %e, "Scheduled weather refresh failed");
                    }
                }
            }
        }
        info!("Weather refresh loop stopped");
    }
}
