//! Server configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use safe_route_database::DEFAULT_DB_PATH;
use safe_route_database_models::MAX_NEARBY_DISTANCE_M;
use thiserror::Error;

/// Errors from reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Transactional email provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    /// Send endpoint.
    pub api_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// Sender address.
    pub from: String,
}

/// Everything the server needs at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Listen address.
    pub bind_addr: String,
    /// Listen port.
    pub port: u16,
    /// `SQLite` document store file.
    pub database_path: PathBuf,
    /// Routing provider API key.
    pub routing_api_key: Option<String>,
    /// Override of the routing provider URL.
    pub routing_base_url: Option<String>,
    /// Override of the routing call timeout.
    pub routing_timeout: Option<Duration>,
    /// Email provider, when fully configured.
    pub email: Option<EmailConfig>,
    /// Largest accepted nearby radius, in metres.
    pub max_nearby_distance_m: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 5000,
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            routing_api_key: None,
            routing_base_url: None,
            routing_timeout: None,
            email: None,
            max_nearby_distance_m: MAX_NEARBY_DISTANCE_M,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable cannot be
    /// parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Blank values count as
    /// unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable cannot be
    /// parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match var("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => defaults.port,
        };

        let routing_timeout = match var("ROUTING_TIMEOUT_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "ROUTING_TIMEOUT_SECS",
                        value,
                    });
                }
            },
            None => None,
        };

        let max_nearby_distance_m = match var("MAX_NEARBY_DISTANCE") {
            Some(value) => match value.parse::<f64>() {
                Ok(m) if m.is_finite() && m > 0.0 => m,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "MAX_NEARBY_DISTANCE",
                        value,
                    });
                }
            },
            None => defaults.max_nearby_distance_m,
        };

        let email = match (var("EMAIL_API_URL"), var("EMAIL_API_KEY"), var("EMAIL_FROM")) {
            (Some(api_url), Some(api_key), Some(from)) => Some(EmailConfig {
                api_url,
                api_key,
                from,
            }),
            (None, None, None) => None,
            _ => {
                log::warn!(
                    "EMAIL_API_URL, EMAIL_API_KEY and EMAIL_FROM must all be set; SOS alerts are disabled"
                );
                None
            }
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            database_path: var("DATABASE_PATH").map_or(defaults.database_path, PathBuf::from),
            routing_api_key: var("GRAPHHOPPER_API_KEY"),
            routing_base_url: var("ROUTING_BASE_URL"),
            routing_timeout,
            email,
            max_nearby_distance_m,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 5000);
        assert!((config.max_nearby_distance_m - 50_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BIND_ADDR", "0.0.0.0"),
            ("PORT", "8080"),
            ("DATABASE_PATH", "/tmp/reviews.db"),
            ("GRAPHHOPPER_API_KEY", "gh-key"),
            ("ROUTING_TIMEOUT_SECS", "3"),
            ("MAX_NEARBY_DISTANCE", "1000"),
            ("EMAIL_API_URL", "https://mail.test/emails"),
            ("EMAIL_API_KEY", "mail-key"),
            ("EMAIL_FROM", "sos@saferoute.test"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, PathBuf::from("/tmp/reviews.db"));
        assert_eq!(config.routing_api_key.as_deref(), Some("gh-key"));
        assert_eq!(config.routing_timeout, Some(Duration::from_secs(3)));
        assert!((config.max_nearby_distance_m - 1000.0).abs() < f64::EPSILON);
        assert_eq!(
            config.email.unwrap().from,
            "sos@saferoute.test".to_string()
        );
    }

    #[test]
    fn blank_key_counts_as_unset() {
        let config = ServerConfig::from_lookup(lookup(&[("GRAPHHOPPER_API_KEY", "  ")])).unwrap();
        assert!(config.routing_api_key.is_none());
    }

    #[test]
    fn partial_email_settings_disable_alerts() {
        let config =
            ServerConfig::from_lookup(lookup(&[("EMAIL_API_URL", "https://mail.test")])).unwrap();
        assert!(config.email.is_none());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("PORT", "http")])),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        assert!(ServerConfig::from_lookup(lookup(&[("ROUTING_TIMEOUT_SECS", "0")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("MAX_NEARBY_DISTANCE", "-5")])).is_err());
    }
}
