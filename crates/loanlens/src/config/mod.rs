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
    pub notifier: NotifierConfig,
    pub analysis: AnalysisConfig,
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

        let notifier = NotifierConfig::from_env()?;
        let analysis = AnalysisConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            notifier,
            analysis,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Outbound decision-notification settings (SMTP-shaped; the transport itself
/// lives behind the `NotificationPublisher` seam).
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_name: String,
    pub from_email: String,
    pub enabled: bool,
}

impl NotifierConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let smtp_host = env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidSmtpPort)?;
        let from_email = env::var("SMTP_FROM_EMAIL").unwrap_or_default();
        let from_name = env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "LoanLens".to_string());

        Ok(Self {
            smtp_host,
            smtp_port,
            from_name,
            enabled: !from_email.is_empty(),
            from_email,
        })
    }
}

/// Knobs for the analysis pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// When set, an unavailable or failing analyst marks the application
    /// `Failed` instead of degrading to the deterministic fallback scorer.
    pub analyst_only: bool,
    pub max_analyst_attempts: u32,
    pub retry_backoff_secs: u64,
}

impl AnalysisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let analyst_only = env::var("ANALYSIS_ANALYST_ONLY")
            .map(|raw| matches!(raw.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let max_analyst_attempts = env::var("ANALYSIS_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidRetrySetting)?;
        let retry_backoff_secs = env::var("ANALYSIS_RETRY_BACKOFF_SECS")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidRetrySetting)?;

        Ok(Self {
            analyst_only,
            max_analyst_attempts: max_analyst_attempts.max(1),
            retry_backoff_secs,
        })
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analyst_only: false,
            max_analyst_attempts: 3,
            retry_backoff_secs: 2,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidSmtpPort,
    InvalidRetrySetting,
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidSmtpPort => write!(f, "SMTP_PORT must be a valid u16"),
            ConfigError::InvalidRetrySetting => write!(
                f,
                "ANALYSIS_MAX_ATTEMPTS and ANALYSIS_RETRY_BACKOFF_SECS must be valid integers"
            ),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidSmtpPort
            | ConfigError::InvalidRetrySetting => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
