use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::marketplace::tracking::DEFAULT_TRACKING_BASE_URL;

/// Longest accepted submission-to-approval delay (30 days).
pub const MAX_APPROVAL_DELAY_SECS: u64 = 30 * 24 * 60 * 60;
/// Longest accepted worker poll interval (1 day).
pub const MAX_APPROVAL_POLL_SECS: u64 = 24 * 60 * 60;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub approvals: ApprovalConfig,
    pub tracking: TrackingConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let approvals = ApprovalConfig {
            delay: Duration::from_secs(bounded_number_var(
                "APP_APPROVAL_DELAY_SECS",
                7 * 60,
                MAX_APPROVAL_DELAY_SECS,
            )?),
            poll_interval: Duration::from_secs(
                bounded_number_var("APP_APPROVAL_POLL_SECS", 5, MAX_APPROVAL_POLL_SECS)?.max(1),
            ),
            batch_size: number_var("APP_APPROVAL_BATCH_SIZE", 50)?.max(1) as usize,
            max_job_attempts: number_var("APP_APPROVAL_MAX_ATTEMPTS", 5)?.max(1) as u32,
            max_code_attempts: number_var("APP_TRACKING_CODE_ATTEMPTS", 5)?.max(1) as u32,
        };

        let base_url = env::var("APP_TRACKING_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_TRACKING_BASE_URL.to_string());
        let tracking = TrackingConfig::new(base_url)?;

        let data_file = env::var("APP_DATA_FILE")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let seed_demo = env::var("APP_SEED_DEMO")
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            approvals,
            tracking,
            storage: StorageConfig {
                data_file,
                seed_demo,
            },
        })
    }
}

fn number_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { name }),
        Err(_) => Ok(default),
    }
}

fn bounded_number_var(name: &'static str, default: u64, max: u64) -> Result<u64, ConfigError> {
    let value = number_var(name, default)?;
    if value > max {
        return Err(ConfigError::NumberOutOfRange { name, max });
    }
    Ok(value)
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Timing and retry dials for the deferred approval worker.
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    /// Delay between submission and automatic approval.
    pub delay: Duration,
    pub poll_interval: Duration,
    pub batch_size: usize,
    /// Worker passes a failing job gets before it is abandoned.
    pub max_job_attempts: u32,
    /// Fresh codes drawn when the store reports a tracking-code collision.
    pub max_code_attempts: u32,
}

impl ApprovalConfig {
    /// Approval delay as a calendar offset, refusing delays past
    /// [`MAX_APPROVAL_DELAY_SECS`].
    pub fn approval_delay(&self) -> Result<chrono::Duration, ConfigError> {
        let out_of_range = ConfigError::NumberOutOfRange {
            name: "APP_APPROVAL_DELAY_SECS",
            max: MAX_APPROVAL_DELAY_SECS,
        };
        if self.delay.as_secs() > MAX_APPROVAL_DELAY_SECS {
            return Err(out_of_range);
        }
        chrono::Duration::from_std(self.delay).map_err(|_| out_of_range)
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(7 * 60),
            poll_interval: Duration::from_secs(5),
            batch_size: 50,
            max_job_attempts: 5,
            max_code_attempts: 5,
        }
    }
}

/// Base URL that short codes are appended to. Always ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    base_url: String,
}

impl TrackingConfig {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        let parsed = Url::parse(&base_url).map_err(|_| ConfigError::InvalidBaseUrl {
            value: base_url.clone(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl { value: base_url });
        }

        let base_url = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{base_url}/")
        };

        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TRACKING_BASE_URL.to_string(),
        }
    }
}

/// Where marketplace state lives between restarts.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub data_file: Option<PathBuf>,
    pub seed_demo: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str },
    NumberOutOfRange { name: &'static str, max: u64 },
    InvalidBaseUrl { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name } => {
                write!(f, "{name} must be a non-negative integer")
            }
            ConfigError::NumberOutOfRange { name, max } => {
                write!(f, "{name} must not exceed {max}")
            }
            ConfigError::InvalidBaseUrl { value } => {
                write!(
                    f,
                    "APP_TRACKING_BASE_URL must be an absolute http(s) URL, got '{value}'"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::NumberOutOfRange { .. }
            | ConfigError::InvalidBaseUrl { .. } => None,
        }
    }
}
