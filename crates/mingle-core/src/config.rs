//! Configuration management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Token and credential settings
    pub auth: AuthConfig,

    /// Outbound email delivery
    pub email: EmailConfig,

    /// Facebook identity provider
    pub facebook: FacebookConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "API_PORT".to_string(),
                value: port,
            })?;
        }
        if let Ok(origin) = std::env::var("CLIENT_ORIGIN") {
            config.server.client_origin = origin;
        }

        // CORS origins from environment variable (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Auth
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Ok(issuer) = std::env::var("JWT_ISSUER") {
            config.auth.jwt_issuer = issuer;
        }
        if let Ok(secs) = std::env::var("JWT_ACCESS_EXPIRATION_SECS") {
            config.auth.access_expiration_secs =
                secs.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "JWT_ACCESS_EXPIRATION_SECS".to_string(),
                    value: secs,
                })?;
        }
        if let Ok(days) = std::env::var("REFRESH_EXPIRATION_DAYS") {
            config.auth.refresh_expiration_days =
                days.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "REFRESH_EXPIRATION_DAYS".to_string(),
                    value: days,
                })?;
        }
        if let Ok(hours) = std::env::var("CONFIRMATION_EXPIRATION_HOURS") {
            config.auth.confirmation_expiration_hours =
                hours.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "CONFIRMATION_EXPIRATION_HOURS".to_string(),
                    value: hours,
                })?;
        }
        if let Ok(trust) = std::env::var("TRUST_PROVIDER_EMAIL") {
            config.auth.trust_provider_email =
                trust.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "TRUST_PROVIDER_EMAIL".to_string(),
                    value: trust,
                })?;
        }

        // Email
        if let Ok(key) = std::env::var("SENDGRID_KEY") {
            config.email.api_key = Some(key);
        }
        if let Ok(from) = std::env::var("EMAIL_FROM") {
            config.email.from_address = from;
        }
        if let Ok(name) = std::env::var("EMAIL_FROM_NAME") {
            config.email.from_name = name;
        }
        if let Ok(url) = std::env::var("EMAIL_BASE_URL") {
            config.email.base_url = url;
        }

        // Facebook
        if let Ok(id) = std::env::var("FACEBOOK_APP_ID") {
            config.facebook.app_id = id;
        }
        if let Ok(secret) = std::env::var("FACEBOOK_APP_SECRET") {
            config.facebook.app_secret = secret;
        }
        if let Ok(url) = std::env::var("FACEBOOK_GRAPH_URL") {
            config.facebook.graph_base_url = url;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Allowed CORS origins (credentials are allowed, so origins are explicit)
    pub cors_origins: Vec<String>,
    /// Fallback origin used in verification links when the request carries none
    pub client_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "https://localhost:3000".to_string(),
            ],
            client_origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Token and credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for HMAC signing of access tokens
    pub jwt_secret: String,
    /// Access token issuer identifier
    pub jwt_issuer: String,
    /// Access token lifetime in seconds
    pub access_expiration_secs: u64,
    /// Refresh token lifetime in days
    pub refresh_expiration_days: i64,
    /// Email confirmation secret lifetime in hours
    pub confirmation_expiration_hours: i64,
    /// Whether a provider-verified email counts as confirmed on federated login
    pub trust_provider_email: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "development-secret-key-change-in-production".to_string(),
            jwt_issuer: "mingle-api".to_string(),
            access_expiration_secs: 600,
            refresh_expiration_days: 7,
            confirmation_expiration_hours: 24,
            trust_provider_email: true,
        }
    }
}

/// Outbound email delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Delivery API key; delivery is disabled when absent
    pub api_key: Option<String>,
    /// Sender address
    pub from_address: String,
    /// Sender display name
    pub from_name: String,
    /// Delivery API base URL
    pub base_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from_address: "no-reply@mingle.local".to_string(),
            from_name: "Mingle".to_string(),
            base_url: "https://api.sendgrid.com".to_string(),
        }
    }
}

/// Facebook identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    /// App identifier used for token introspection
    pub app_id: String,
    /// App secret paired with the identifier
    pub app_secret: String,
    /// Graph API base URL (overridable for tests)
    pub graph_base_url: String,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            graph_base_url: "https://graph.facebook.com".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level filter
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to read config file {path}")]
    FileReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },
}
