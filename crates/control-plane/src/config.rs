//! Configuration management for the control plane
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;

use crate::service::DEFAULT_MAINTENANCE_MESSAGE;

/// Longest accepted elevated grant lifetime: one day
pub const MAX_GRANT_TTL_SECS: i64 = 86_400;

/// Which store backs the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Redis,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("Unknown STORAGE_BACKEND: {}", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    pub storage_backend: StorageBackend,

    pub redis_url: String,

    /// Honour `x-forwarded-for` when resolving the client IP
    pub trust_proxy: bool,

    pub admin_username: Option<String>,

    pub admin_password: Option<String>,

    /// Lifetime of an elevated grant, in seconds
    pub grant_ttl_secs: i64,

    /// Message returned while a project is in maintenance mode
    pub maintenance_message: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "8090".to_string())
                .parse()
                .context("Invalid API_PORT")?,

            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "redis".to_string())
                .parse()?,

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),

            trust_proxy: env::var("TRUST_PROXY")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),

            admin_username: env::var("ADMIN_USERNAME").ok().filter(|v| !v.is_empty()),

            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),

            grant_ttl_secs: env::var("GRANT_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid GRANT_TTL_SECS")?,

            maintenance_message: env::var("MAINTENANCE_MESSAGE")
                .unwrap_or_else(|_| DEFAULT_MAINTENANCE_MESSAGE.to_string()),
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.grant_ttl_secs <= 0 {
            anyhow::bail!("GRANT_TTL_SECS must be greater than 0");
        }

        if self.grant_ttl_secs > MAX_GRANT_TTL_SECS {
            anyhow::bail!("GRANT_TTL_SECS must be at most {}", MAX_GRANT_TTL_SECS);
        }

        if self.admin_username.is_some() && self.admin_password.is_none() {
            anyhow::bail!("ADMIN_PASSWORD is required when ADMIN_USERNAME is set");
        }

        Ok(())
    }

    /// Elevated grant lifetime as a duration
    pub fn grant_ttl(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_seconds(self.grant_ttl_secs).context("GRANT_TTL_SECS out of range")
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            api_host: "127.0.0.1".to_string(),
            api_port: 9000,
            storage_backend: StorageBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            trust_proxy: false,
            admin_username: None,
            admin_password: None,
            grant_ttl_secs: 300,
            maintenance_message: DEFAULT_MAINTENANCE_MESSAGE.to_string(),
        }
    }

    #[test]
    fn test_api_address() {
        assert_eq!(sample().api_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = Config {
            api_port: 0,
            ..sample()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("API_PORT must be greater than 0"));
    }

    #[test]
    fn test_validate_grant_ttl() {
        let config = Config {
            grant_ttl_secs: 0,
            ..sample()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_grant_ttl_upper_bound() {
        let config = Config {
            grant_ttl_secs: i64::MAX,
            ..sample()
        };
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("GRANT_TTL_SECS must be at most"));
        assert!(config.grant_ttl().is_err());

        let config = Config {
            grant_ttl_secs: MAX_GRANT_TTL_SECS,
            ..sample()
        };
        assert!(config.validate().is_ok());
        assert_eq!(
            config.grant_ttl().unwrap(),
            chrono::Duration::seconds(MAX_GRANT_TTL_SECS)
        );
    }

    #[test]
    fn test_admin_username_requires_password() {
        let config = Config {
            admin_username: Some("ops".to_string()),
            ..sample()
        };
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("ADMIN_PASSWORD"));

        let config = Config {
            admin_username: Some("ops".to_string()),
            admin_password: Some("hunter2".to_string()),
            ..sample()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!("redis".parse::<StorageBackend>().unwrap(), StorageBackend::Redis);
        assert_eq!("Memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }
}
