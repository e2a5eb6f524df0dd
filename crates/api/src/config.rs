//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::RetryPolicy;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `APPOINTMENT_SERVICE_URL`, `MEDICINE_SERVICE_URL`, `BILLING_SERVICE_URL`:
///   remote service base URLs; in-memory fakes when unset
/// - `REMOTE_TIMEOUT_SECS`: per-request timeout of remote calls (default: `10`)
/// - `SAGA_RETRY_MAX_ATTEMPTS`: compensation attempts per action (default: `3`)
/// - `SAGA_RETRY_BASE_DELAY_MS`: first compensation backoff (default: `1000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub appointment_service_url: Option<String>,
    pub medicine_service_url: Option<String>,
    pub billing_service_url: Option<String>,
    pub remote_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT", defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            database_url: var("DATABASE_URL"),
            appointment_service_url: var("APPOINTMENT_SERVICE_URL"),
            medicine_service_url: var("MEDICINE_SERVICE_URL"),
            billing_service_url: var("BILLING_SERVICE_URL"),
            remote_timeout_secs: parsed("REMOTE_TIMEOUT_SECS", defaults.remote_timeout_secs),
            retry_max_attempts: parsed("SAGA_RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts),
            retry_base_delay_ms: parsed("SAGA_RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timeout applied to every remote request.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    /// Retry policy for compensations.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            appointment_service_url: None,
            medicine_service_url: None,
            billing_service_url: None,
            remote_timeout_secs: 10,
            retry_max_attempts: 3,
            retry_base_delay_ms: 1000,
        }
    }
}
