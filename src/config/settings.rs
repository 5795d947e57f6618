//! Service settings loaded from `config.toml` with environment overrides.
//!
//! Every table and field has a default, so a missing file is not an error. Values that
//! differ per deployment (`DATABASE_URL`, `BIND_ADDR`, `JWT_SECRET`) are read from the
//! environment after the file, which lets `.env` files loaded by `dotenvy` win.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Flat federal rate used by the tax estimate
pub const DEFAULT_FEDERAL_TAX_RATE: f64 = 0.21;
/// Flat state rate used by the tax estimate
pub const DEFAULT_STATE_TAX_RATE: f64 = 0.05;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Tax estimate rates
    pub tax: TaxConfig,
    /// Token verification settings
    pub auth: AuthConfig,
}

/// `[server]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the API listens on
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// `[database]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SeaORM` connection URL
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/eventledger.sqlite?mode=rwc".to_string(),
        }
    }
}

/// `[tax]` table
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TaxConfig {
    /// Flat federal rate applied to taxable income
    pub federal_rate: f64,
    /// Flat state rate applied to taxable income
    pub state_rate: f64,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            federal_rate: DEFAULT_FEDERAL_TAX_RATE,
            state_rate: DEFAULT_STATE_TAX_RATE,
        }
    }
}

/// `[auth]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret for bearer tokens
    pub jwt_secret: String,
    /// Lifetime of tokens minted by `api::auth::issue_token`
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: 24,
        }
    }
}

impl AppConfig {
    /// Checks values that have no usable default.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the JWT secret is empty or a tax rate is outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(Error::Config {
                message: "JWT secret is empty; set JWT_SECRET or [auth].jwt_secret".to_string(),
            });
        }
        for (name, rate) in [
            ("tax.federal_rate", self.tax.federal_rate),
            ("tax.state_rate", self.tax.state_rate),
        ] {
            if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
                return Err(Error::Config {
                    message: format!("{name} must be between 0 and 1, got {rate}"),
                });
            }
        }
        Ok(())
    }

    /// Applies `DATABASE_URL`, `BIND_ADDR` and `JWT_SECRET` over the file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(addr) = std::env::var("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
    }
}

/// Parses configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the service configuration.
///
/// Reads `CONFIG_PATH` (default `./config.toml`) if it exists, falls back to defaults
/// otherwise, then applies environment overrides and validates the result.
///
/// # Errors
/// Returns an error if an existing file is malformed or validation fails.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    let mut config = if Path::new(&path).exists() {
        tracing::debug!(path = %path, "loading configuration file");
        load_config(&path)?
    } else {
        tracing::info!(path = %path, "no configuration file found, using defaults");
        AppConfig::default()
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [server]
            bind_addr = "127.0.0.1:9000"

            [database]
            url = "sqlite::memory:"

            [tax]
            federal_rate = 0.19
            state_rate = 0.04

            [auth]
            jwt_secret = "s3cret"
            token_ttl_hours = 2
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.tax.federal_rate, 0.19);
        assert_eq!(config.tax.state_rate, 0.04);
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.token_ttl_hours, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_tables_use_defaults() {
        let config: AppConfig = toml::from_str("[auth]\njwt_secret = \"x\"\n").unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.tax.federal_rate, DEFAULT_FEDERAL_TAX_RATE);
        assert_eq!(config.tax.state_rate, DEFAULT_STATE_TAX_RATE);
        assert_eq!(config.auth.token_ttl_hours, 24);
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_out_of_range_rate() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "x".to_string();
        config.tax.state_rate = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("does/not/exist.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
