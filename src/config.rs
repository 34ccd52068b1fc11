use chrono::Duration;
use envconfig::Envconfig;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set")]
    MissingSecret,
    #[error("DATABASE_URL must be set when STORAGE_BACKEND is postgres")]
    MissingDatabaseUrl,
    #[error("Unknown STORAGE_BACKEND {0:?}, expected postgres or memory")]
    UnknownBackend(String),
    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Memory,
}

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[envconfig(from = "JWT_SECRET", default = "")]
    pub jwt_secret: String,

    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,

    #[envconfig(from = "STORAGE_BACKEND", default = "postgres")]
    pub storage_backend: String,

    #[envconfig(from = "TOKEN_TTL_HOURS", default = "24")]
    pub token_ttl_hours: i64,

    #[envconfig(from = "SECURE_COOKIES", default = "false")]
    pub secure_cookies: bool,

    #[envconfig(from = "CORS_ORIGIN", default = "http://localhost:3000")]
    pub cors_origin: String,

    #[envconfig(from = "LOW_STOCK_THRESHOLD", default = "10")]
    pub low_stock_threshold: i32,

    #[envconfig(from = "EXPIRY_WINDOW_DAYS", default = "180")]
    pub expiry_window_days: i64,

    #[envconfig(from = "ALERT_SCHEDULE", default = "0 0 8 * * *")]
    pub alert_schedule: String,
}

impl Config {
    pub fn backend(&self) -> Result<Backend, ConfigError> {
        match self.storage_backend.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Backend::Postgres),
            "memory" => Ok(Backend::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }

    /// Checks the requirements envconfig cannot express on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.backend()? == Backend::Postgres
            && self.database_url.as_deref().map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        if self.token_ttl_hours <= 0 {
            return Err(ConfigError::NotPositive("TOKEN_TTL_HOURS"));
        }
        if self.expiry_window_days <= 0 {
            return Err(ConfigError::NotPositive("EXPIRY_WINDOW_DAYS"));
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::hours(self.token_ttl_hours)
    }

    pub fn expiry_window(&self) -> Duration {
        Duration::days(self.expiry_window_days)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::init_from_hashmap(&map).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("JWT_SECRET", "s"), ("DATABASE_URL", "postgres://x/db")]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.token_ttl_hours, 24);
        assert_eq!(config.low_stock_threshold, 10);
        assert_eq!(config.backend(), Ok(Backend::Postgres));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn secret_is_required() {
        let config = config(&[("DATABASE_URL", "postgres://x/db")]);
        assert_eq!(config.validate(), Err(ConfigError::MissingSecret));
    }

    #[test]
    fn memory_backend_needs_no_database() {
        let config = config(&[("JWT_SECRET", "s"), ("STORAGE_BACKEND", "Memory")]);
        assert_eq!(config.backend(), Ok(Backend::Memory));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn postgres_backend_needs_a_database() {
        let config = config(&[("JWT_SECRET", "s")]);
        assert_eq!(config.validate(), Err(ConfigError::MissingDatabaseUrl));
    }

    #[test]
    fn unknown_backend_is_reported() {
        let config = config(&[("JWT_SECRET", "s"), ("STORAGE_BACKEND", "sqlite")]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownBackend("sqlite".to_string()))
        );
    }
}
