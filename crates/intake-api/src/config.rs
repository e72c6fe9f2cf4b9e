//! Server configuration from the environment.

use std::time::Duration;

use axum::http::HeaderValue;
use tracing::warn;

use intake_core::defaults::{
    APP_URL, MAX_UPLOAD_BYTES, STALE_ANALYSIS_AGE_SECS, STALE_SWEEP_INTERVAL_SECS,
};

/// Default CORS origin when `ALLOWED_ORIGINS` is unset or empty.
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

/// Default blob root when `BLOB_STORAGE_PATH` is unset.
pub const DEFAULT_BLOB_STORAGE_PATH: &str = "/var/lib/intake/blobs";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs on in-memory stores.
    pub database_url: Option<String>,
    pub blob_storage_path: String,
    pub app_url: String,
    pub max_upload_bytes: usize,
    pub allowed_origins: Vec<HeaderValue>,
    /// Interval between stale-analysis sweeps; 0 disables the sweep.
    pub stale_sweep_secs: u64,
    pub stale_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            blob_storage_path: DEFAULT_BLOB_STORAGE_PATH.to_string(),
            app_url: APP_URL.to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            allowed_origins: parse_allowed_origins(DEFAULT_ALLOWED_ORIGINS),
            stale_sweep_secs: STALE_SWEEP_INTERVAL_SECS,
            stale_age_secs: STALE_ANALYSIS_AGE_SECS,
        }
    }
}

impl ApiConfig {
    /// Read configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `3000` |
    /// | `DATABASE_URL` | (none; in-memory stores) |
    /// | `BLOB_STORAGE_PATH` | `/var/lib/intake/blobs` |
    /// | `APP_URL` | `http://localhost:3000` |
    /// | `MAX_UPLOAD_BYTES` | `26214400` |
    /// | `ALLOWED_ORIGINS` | `http://localhost:3000` |
    /// | `STALE_SWEEP_SECS` | `120` |
    /// | `STALE_ANALYSIS_AGE_SECS` | `120` |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults.port);
        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_upload_bytes);
        let stale_sweep_secs = std::env::var("STALE_SWEEP_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.stale_sweep_secs);
        let stale_age_secs = std::env::var("STALE_ANALYSIS_AGE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.stale_age_secs);

        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port,
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            blob_storage_path: std::env::var("BLOB_STORAGE_PATH")
                .unwrap_or(defaults.blob_storage_path),
            app_url: std::env::var("APP_URL").unwrap_or(defaults.app_url),
            max_upload_bytes,
            allowed_origins: parse_allowed_origins(
                &std::env::var("ALLOWED_ORIGINS").unwrap_or_default(),
            ),
            stale_sweep_secs,
            stale_age_secs,
        }
    }

    pub fn stale_sweep_interval(&self) -> Option<Duration> {
        (self.stale_sweep_secs > 0).then(|| Duration::from_secs(self.stale_sweep_secs))
    }

    pub fn stale_age(&self) -> Duration {
        Duration::from_secs(self.stale_age_secs)
    }

    /// Stale age actually used by the sweep: never less than twice the run budget,
    /// so a run still inside its timeout is never failed underneath itself.
    pub fn stale_age_for(&self, run_timeout: Duration) -> Duration {
        let floor = run_timeout.saturating_mul(2);
        let configured = self.stale_age();
        if configured < floor {
            warn!(
                stale_age_secs = configured.as_secs(),
                run_timeout_secs = run_timeout.as_secs(),
                effective_secs = floor.as_secs(),
                "STALE_ANALYSIS_AGE_SECS is below twice the run timeout; raising it"
            );
            return floor;
        }
        configured
    }
}

/// Parse a comma-separated origin list, dropping entries that are not valid header values.
pub fn parse_allowed_origins(origins: &str) -> Vec<HeaderValue> {
    if origins.trim().is_empty() {
        return vec![HeaderValue::from_static(DEFAULT_ALLOWED_ORIGINS)];
    }

    origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allowed_origins() {
        let origins = parse_allowed_origins("https://portal.example, http://localhost:5173 ,");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "https://portal.example");
        assert_eq!(origins[1], "http://localhost:5173");
    }

    #[test]
    fn test_empty_origins_use_default() {
        let origins = parse_allowed_origins("  ");
        assert_eq!(origins, vec![HeaderValue::from_static(DEFAULT_ALLOWED_ORIGINS)]);
    }

    #[test]
    fn test_sweep_can_be_disabled() {
        let config = ApiConfig {
            stale_sweep_secs: 0,
            ..Default::default()
        };
        assert!(config.stale_sweep_interval().is_none());
        assert!(ApiConfig::default().stale_sweep_interval().is_some());
    }

    #[test]
    fn test_stale_age_never_undercuts_run_timeout() {
        let config = ApiConfig {
            stale_age_secs: 120,
            ..Default::default()
        };
        assert_eq!(
            config.stale_age_for(Duration::from_secs(60)),
            Duration::from_secs(120)
        );
        assert_eq!(
            config.stale_age_for(Duration::from_secs(300)),
            Duration::from_secs(600)
        );
        assert_eq!(
            config.stale_age_for(Duration::from_secs(10)),
            Duration::from_secs(120)
        );
    }
}
