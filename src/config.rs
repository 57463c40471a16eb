// src/config.rs
use std::str::FromStr;

use crate::errors::{HaulwayError, HaulwayResult};

pub const MAX_WEBHOOK_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub fcm_server_key: Option<String>,
    pub currency: String,
    pub admin_token: Option<String>,
    pub require_driver_subscription: bool,
    pub match_radius_km: f64,
    pub webhook_timeout_secs: u64,
    pub webhook_max_attempts: u32,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            redis_url: None,
            fcm_server_key: None,
            currency: "GHS".to_string(),
            admin_token: None,
            require_driver_subscription: false,
            match_radius_km: 10.0,
            webhook_timeout_secs: 10,
            webhook_max_attempts: 3,
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first when present.
    pub fn from_env() -> HaulwayResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(HaulwayError::ConfigurationError(format!("failed to read .env: {}", e)));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Unset or blank keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> HaulwayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let log_format = match get("HAULWAY_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(HaulwayError::InvalidConfiguration(format!(
                    "HAULWAY_LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                    other
                )));
            }
        };

        let config = Self {
            bind_addr: get("HAULWAY_BIND_ADDR").unwrap_or(defaults.bind_addr),
            redis_url: get("REDIS_URL"),
            fcm_server_key: get("FCM_SERVER_KEY"),
            currency: get("HAULWAY_CURRENCY").unwrap_or(defaults.currency),
            admin_token: get("HAULWAY_ADMIN_TOKEN"),
            require_driver_subscription: parse_or(
                "HAULWAY_REQUIRE_DRIVER_SUBSCRIPTION",
                get("HAULWAY_REQUIRE_DRIVER_SUBSCRIPTION"),
                defaults.require_driver_subscription,
            )?,
            match_radius_km: parse_or(
                "HAULWAY_MATCH_RADIUS_KM",
                get("HAULWAY_MATCH_RADIUS_KM"),
                defaults.match_radius_km,
            )?,
            webhook_timeout_secs: parse_or(
                "HAULWAY_WEBHOOK_TIMEOUT_SECS",
                get("HAULWAY_WEBHOOK_TIMEOUT_SECS"),
                defaults.webhook_timeout_secs,
            )?,
            webhook_max_attempts: parse_or(
                "HAULWAY_WEBHOOK_MAX_ATTEMPTS",
                get("HAULWAY_WEBHOOK_MAX_ATTEMPTS"),
                defaults.webhook_max_attempts,
            )?,
            log_format,
        };

        if !config.match_radius_km.is_finite() || config.match_radius_km <= 0.0 {
            return Err(HaulwayError::InvalidConfiguration(
                "HAULWAY_MATCH_RADIUS_KM must be a positive number".to_string(),
            ));
        }
        if !(1..=MAX_WEBHOOK_ATTEMPTS).contains(&config.webhook_max_attempts) {
            return Err(HaulwayError::InvalidConfiguration(format!(
                "HAULWAY_WEBHOOK_MAX_ATTEMPTS must be between 1 and {}",
                MAX_WEBHOOK_ATTEMPTS
            )));
        }

        Ok(config)
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> HaulwayResult<T> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| {
            HaulwayError::InvalidConfiguration(format!("{} has invalid value '{}'", key, value))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.currency, "GHS");
        assert!(config.redis_url.is_none());
        assert!(!config.require_driver_subscription);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("REDIS_URL", "redis://cache:6379/"),
            ("HAULWAY_REQUIRE_DRIVER_SUBSCRIPTION", "true"),
            ("HAULWAY_MATCH_RADIUS_KM", "4.5"),
            ("HAULWAY_LOG_FORMAT", "json"),
            ("FCM_SERVER_KEY", "   "),
        ]))
        .unwrap();
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379/"));
        assert!(config.require_driver_subscription);
        assert_eq!(config.match_radius_km, 4.5);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.fcm_server_key.is_none());
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("HAULWAY_MATCH_RADIUS_KM", "far")])),
            Err(HaulwayError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("HAULWAY_WEBHOOK_MAX_ATTEMPTS", "0")])),
            Err(HaulwayError::InvalidConfiguration(_))
        ));
        assert!(AppConfig::from_lookup(lookup(&[("HAULWAY_LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn test_out_of_range_numbers_are_rejected() {
        for radius in ["NaN", "inf", "-2"] {
            assert!(
                AppConfig::from_lookup(lookup(&[("HAULWAY_MATCH_RADIUS_KM", radius)])).is_err(),
                "radius {} accepted",
                radius
            );
        }
        assert!(AppConfig::from_lookup(lookup(&[("HAULWAY_WEBHOOK_MAX_ATTEMPTS", "33")])).is_err());

        let config = AppConfig::from_lookup(lookup(&[("HAULWAY_WEBHOOK_MAX_ATTEMPTS", "10")])).unwrap();
        assert_eq!(config.webhook_max_attempts, MAX_WEBHOOK_ATTEMPTS);
    }
}
