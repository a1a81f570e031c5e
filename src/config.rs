// src/config.rs
use std::{env, fmt::Display, str::FromStr};

use tracing::info;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub frontend_url: String,
    pub max_connections: u32,
    pub cookie_secure: bool,
}

impl Config {
    /// Read configuration from the environment. Call `dotenvy::dotenv()` first
    /// if a `.env` file should be honoured.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let frontend_url: String = try_load(&lookup, "FRONTEND_URL", "http://localhost:3000")?;

        Ok(Self {
            database_url,
            port: try_load(&lookup, "PORT", "5000")?,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "10")?,
            cookie_secure: try_load(&lookup, "COOKIE_SECURE", "false")?,
        })
    }

    pub fn share_url(&self, poll_id: impl Display) -> String {
        format!("{}/poll/{}", self.frontend_url, poll_id)
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/polls")]))
            .unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.max_connections, 10);
        assert!(!config.cookie_secure);
        assert_eq!(config.frontend_url, "http://localhost:3000");
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = Config::from_lookup(lookup(&[("PORT", "8080")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn invalid_port_names_the_variable() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/polls"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn share_url_strips_trailing_slash() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/polls"),
            ("FRONTEND_URL", "https://polls.example.com/"),
        ]))
        .unwrap();

        assert_eq!(config.share_url("abc"), "https://polls.example.com/poll/abc");
    }
}
