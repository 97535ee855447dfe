use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

const POLL_INTERVAL_ENV: &str = "ODONET_POLL_INTERVAL_MS";

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_backoff_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root server base URL, e.g. `http://192.168.1.10:5000`.
    pub base_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Ceiling for the retry delay when polls keep failing.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let mut cfg: Config = serde_json::from_str(&raw).context("parsing JSON")?;

        if let Some(ms) = std::env::var(POLL_INTERVAL_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            cfg.poll_interval_ms = ms;
        }

        cfg.base_url = cfg.base_url.trim_end_matches('/').to_string();
        if cfg.base_url.is_empty() {
            bail!("base_url is required");
        }

        Ok(cfg)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parsing() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "base_url": "http://192.168.1.10:5000",
                "poll_interval_ms": 250,
                "request_timeout_secs": 5,
                "max_backoff_secs": 60
            }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.base_url, "http://192.168.1.10:5000");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_backoff(), Duration::from_secs(60));
    }

    #[test]
    fn test_config_defaults() {
        std::env::remove_var(POLL_INTERVAL_ENV);

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"base_url": "http://root.local:5000/"}}"#).unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        // Trailing slash stripped, defaults filled in
        assert_eq!(config.base_url, "http://root.local:5000");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_backoff(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_missing_file() {
        let result = Config::from_file("/nonexistent/path/config.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{invalid json").unwrap();

        let result = Config::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_empty_base_url() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"base_url": ""}}"#).unwrap();

        let result = Config::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }
}
