//! Mingle Core - shared configuration and error types
//!
//! This crate holds the pieces shared by the mingle services:
//! - Configuration management (environment + TOML file)
//! - Configuration error types

pub mod config;

pub use config::{
    AppConfig, AuthConfig, ConfigError, EmailConfig, FacebookConfig, LoggingConfig, ServerConfig,
};
