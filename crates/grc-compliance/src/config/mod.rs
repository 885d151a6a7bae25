use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_REPORT_PAGE_SIZE: u32 = 20;
const MAX_REPORT_PAGE_SIZE: u32 = 100;

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

/// Top-level configuration for the compliance service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub reporting: ReportingConfig,
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
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat(raw))?,
            Err(_) => LogFormat::Compact,
        };

        let default_page_size = match env::var("APP_REPORT_DEFAULT_PAGE_SIZE") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidPageSize(raw))?,
            Err(_) => DEFAULT_REPORT_PAGE_SIZE,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            reporting: ReportingConfig::new(default_page_size),
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

/// Output layout for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Defaults applied to the cross-asset compliance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingConfig {
    pub default_page_size: u32,
}

impl ReportingConfig {
    pub fn new(default_page_size: u32) -> Self {
        Self {
            default_page_size: default_page_size.clamp(1, MAX_REPORT_PAGE_SIZE),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_PAGE_SIZE)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    InvalidPageSize(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'pretty', got '{value}'")
            }
            ConfigError::InvalidPageSize(value) => {
                write!(
                    f,
                    "APP_REPORT_DEFAULT_PAGE_SIZE must be a positive integer, got '{value}'"
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
            | ConfigError::InvalidLogFormat(_)
            | ConfigError::InvalidPageSize(_) => None,
        }
    }
}
