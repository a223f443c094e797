//! Last forecast persisted as a JSON file so restarts do not hit the API.
//!
//! Reads and writes are best-effort: failures are logged and treated as an
//! empty cache.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use super::models::WeatherData;

/// A cached forecast older than this is refreshed automatically.
pub const MAX_AGE_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherCache {
    pub api_key: String,
    pub location: String,
    pub last_update: DateTime<Utc>,
    pub forecast: WeatherData,
}

impl WeatherCache {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.last_update > Duration::minutes(MAX_AGE_MINUTES)
    }

    /// Whether this entry answers a request for `location` with `api_key`.
    pub fn matches(&self, api_key: &str, location: &str) -> bool {
        self.api_key == api_key && self.location.eq_ignore_ascii_case(location)
    }
}

pub async fn load(path: &Path) -> Option<WeatherCache> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "weather cache: failed to read");
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "weather cache: ignoring unreadable file");
            None
        }
    }
}

pub async fn save(path: &Path, cache: &WeatherCache) {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            warn!(path = %path.display(), error = %e, "weather cache: failed to create directory");
            return;
        }
    }

    let content = match serde_json::to_vec_pretty(cache) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, "weather cache: failed to serialize");
            return;
        }
    };

    if let Err(e) = fs::write(path, &content).await {
        warn!(path = %path.display(), error = %e, "weather cache: failed to write");
    } else {
        debug!(path = %path.display(), bytes = content.len(), "weather cache: saved");
    }
}
