use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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
    pub import: ImportConfig,
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

        let batch_limit = env::var("IMPORT_BATCH_LIMIT")
            .unwrap_or_else(|_| "400".to_string())
            .parse::<usize>()
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or(ConfigError::InvalidBatchLimit)?;
        let default_country_code =
            env::var("DEFAULT_COUNTRY_CODE").unwrap_or_else(|_| "371".to_string());
        let sample_count = env::var("IMPORT_SAMPLE_COUNT")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidSampleCount)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            import: ImportConfig {
                batch_limit,
                default_country_code,
                sample_count,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .host
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Settings controlling log output.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Settings for the legacy import pipeline.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Maximum operations per atomic store batch.
    pub batch_limit: usize,
    /// Country code prepended to bare local phone numbers.
    pub default_country_code: String,
    /// Number of sample documents echoed by a dry run.
    pub sample_count: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_limit: 400,
            default_country_code: "371".to_string(),
            sample_count: 2,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost(String),
    InvalidBatchLimit,
    InvalidSampleCount,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost(host) => write!(f, "APP_HOST '{host}' is not an IP address"),
            ConfigError::InvalidBatchLimit => {
                write!(f, "IMPORT_BATCH_LIMIT must be a positive integer")
            }
            ConfigError::InvalidSampleCount => {
                write!(f, "IMPORT_SAMPLE_COUNT must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
