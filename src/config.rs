//! Service configuration.
//!
//! Values come from the process environment (after `.env` is loaded by
//! `dotenvy`); CLI flags override them in `app`. Resolution goes through a
//! lookup function so tests never touch the real environment.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::domain::YearBounds;
use crate::error::AppError;

pub const DEFAULT_MODEL_DIR: &str = "models";
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:8080";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub model_dir: PathBuf,
    pub cors_origins: Vec<String>,
    pub host: IpAddr,
    pub port: u16,
    pub years: YearBounds,
    pub log_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            cors_origins: split_origins(DEFAULT_CORS_ORIGINS),
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            years: YearBounds::default(),
            log_json: false,
        }
    }
}

impl ServiceConfig {
    /// Load `.env` (if any) and resolve from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let model_dir = get("MODEL_DIR").map(PathBuf::from).unwrap_or(defaults.model_dir);

        let cors_origins = get("CORS_ORIGINS")
            .map(|v| split_origins(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.cors_origins);

        let host = match get("HOST") {
            Some(v) => v
                .parse()
                .map_err(|_| AppError::new(2, format!("HOST is not a valid IP address: '{v}'")))?,
            None => defaults.host,
        };

        let port = match get("PORT") {
            Some(v) => v
                .parse()
                .map_err(|_| AppError::new(2, format!("PORT is not a valid port number: '{v}'")))?,
            None => defaults.port,
        };

        let year_min = parse_year(get("ASYLUM_YEAR_MIN"), "ASYLUM_YEAR_MIN", defaults.years.min)?;
        let year_max = parse_year(get("ASYLUM_YEAR_MAX"), "ASYLUM_YEAR_MAX", defaults.years.max)?;
        if year_min > year_max {
            return Err(AppError::new(
                2,
                format!("ASYLUM_YEAR_MIN ({year_min}) must not exceed ASYLUM_YEAR_MAX ({year_max})"),
            ));
        }

        let log_json = get("ASYLUM_LOG_JSON")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.log_json);

        Ok(Self {
            model_dir,
            cors_origins,
            host,
            port,
            years: YearBounds {
                min: year_min,
                max: year_max,
            },
            log_json,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_year(raw: Option<String>, key: &str, default: i32) -> Result<i32, AppError> {
    match raw {
        Some(v) => v
            .parse()
            .map_err(|_| AppError::new(2, format!("{key} is not a valid year: '{v}'"))),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServiceConfig, AppError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg, ServiceConfig::default());
        assert_eq!(cfg.cors_origins, vec!["http://localhost:5173", "http://localhost:8080"]);
        assert_eq!(cfg.socket_addr().to_string(), "0.0.0.0:8000");
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = config_from(&[
            ("MODEL_DIR", "/srv/models"),
            ("CORS_ORIGINS", " https://a.example , https://b.example,"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("ASYLUM_YEAR_MIN", "1990"),
            ("ASYLUM_YEAR_MAX", "2020"),
            ("ASYLUM_LOG_JSON", "TRUE"),
        ])
        .unwrap();

        assert_eq!(cfg.model_dir, PathBuf::from("/srv/models"));
        assert_eq!(cfg.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(cfg.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.years, YearBounds { min: 1990, max: 2020 });
        assert!(cfg.log_json);
    }

    #[test]
    fn blank_cors_origins_fall_back_to_default() {
        let cfg = config_from(&[("CORS_ORIGINS", " , ")]).unwrap();
        assert_eq!(cfg.cors_origins, ServiceConfig::default().cors_origins);
    }

    #[test]
    fn host_must_be_an_ip_address() {
        let err = config_from(&[("HOST", "localhost")]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("valid IP address"));

        let cfg = config_from(&[("HOST", "::1")]).unwrap();
        assert_eq!(cfg.socket_addr().to_string(), "[::1]:8000");
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for pairs in [
            vec![("PORT", "eighty")],
            vec![("PORT", "70000")],
            vec![("HOST", "localhost:1")],
            vec![("ASYLUM_YEAR_MIN", "2020"), ("ASYLUM_YEAR_MAX", "2000")],
        ] {
            let err = config_from(&pairs).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{pairs:?}");
        }
    }
}
