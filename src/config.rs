use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Key for the hosted inference API; analysis fails while empty.
    pub inference_api_key: String,
    pub ripeness_inference_url: String,
    pub leaf_inference_url: String,
    /// `host` or `host:port` of the field camera, if one is installed.
    pub camera_ip: Option<String>,
    pub weather_api_key: String,
    pub weather_location: String,
    pub weather_base_url: String,
    pub weather_cache_path: PathBuf,
    /// Reconciliation periods of the view hooks.
    pub live_refresh: Duration,
    pub energy_refresh: Duration,
    pub history_refresh: Duration,
    pub activity_refresh: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            server_host: env.optional("SERVER_HOST", "0.0.0.0"),
            server_port: env.parsed("SERVER_PORT", "8080")?,
            inference_api_key: env.optional("INFERENCE_API_KEY", ""),
            ripeness_inference_url: env.optional("RIPENESS_INFERENCE_URL", "https://serverless.roboflow.com"),
            leaf_inference_url: env.optional("LEAF_INFERENCE_URL", "https://detect.roboflow.com"),
            camera_ip: Some(env.optional("CAMERA_IP", "")).filter(|ip| !ip.trim().is_empty()),
            weather_api_key: env.optional("WEATHER_API_KEY", ""),
            weather_location: env.optional("WEATHER_LOCATION", "Jakarta"),
            weather_base_url: env.optional("WEATHER_BASE_URL", "https://api.weatherapi.com"),
            weather_cache_path: PathBuf::from(env.optional("WEATHER_CACHE_PATH", "cache/weather.json")),
            live_refresh: env.seconds("LIVE_REFRESH_SECS", "30")?,
            energy_refresh: env.seconds("ENERGY_REFRESH_SECS", "60")?,
            history_refresh: env.seconds("HISTORY_REFRESH_SECS", "300")?,
            activity_refresh: env.seconds("ACTIVITY_REFRESH_SECS", "120")?,
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn required(&self, key: &str) -> Result<String> {
        (self.0)(key).with_context(|| format!("missing required env var: {key}"))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_owned())
    }

    fn parsed<T>(&self, key: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.optional(key, default)
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number"))
    }

    fn seconds(&self, key: &str, default: &str) -> Result<Duration> {
        let secs: u64 = self.parsed(key, default)?;
        anyhow::ensure!(secs > 0, "{key} must be a positive integer");
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[("DATABASE_URL", "postgres://localhost/irrigation")]).unwrap();
        assert_eq!(c.server_host, "0.0.0.0");
        assert_eq!(c.server_port, 8080);
        assert_eq!(c.ripeness_inference_url, "https://serverless.roboflow.com");
        assert_eq!(c.leaf_inference_url, "https://detect.roboflow.com");
        assert_eq!(c.weather_location, "Jakarta");
        assert_eq!(c.weather_cache_path, PathBuf::from("cache/weather.json"));
        assert_eq!(c.camera_ip, None);
        assert_eq!(c.live_refresh, Duration::from_secs(30));
        assert_eq!(c.energy_refresh, Duration::from_secs(60));
        assert_eq!(c.history_refresh, Duration::from_secs(300));
        assert_eq!(c.activity_refresh, Duration::from_secs(120));
    }

    #[test]
    fn database_url_is_required() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn overrides() {
        let c = config(&[
            ("DATABASE_URL", "postgres://db"),
            ("SERVER_PORT", "9000"),
            ("CAMERA_IP", "192.168.1.100"),
            ("LIVE_REFRESH_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(c.server_port, 9000);
        assert_eq!(c.camera_ip.as_deref(), Some("192.168.1.100"));
        assert_eq!(c.live_refresh, Duration::from_secs(5));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config(&[("DATABASE_URL", "x"), ("SERVER_PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));

        let err = config(&[("DATABASE_URL", "x"), ("ENERGY_REFRESH_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("ENERGY_REFRESH_SECS"));
    }
}
