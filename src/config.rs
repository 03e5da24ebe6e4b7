// src/config.rs

use std::env;

use dotenvy::dotenv;

use crate::services::scoring::{DEFAULT_MANUAL_PASS_PERCENTAGE, GradingPolicy, MarksPolicy};

/// Seven days, matching the auth service's token lifetime.
const DEFAULT_JWT_EXPIRATION: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL, or `memory` for the process-local store.
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub app_env: String,
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    pub grading: GradingPolicy,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = parsed("JWT_EXPIRATION", DEFAULT_JWT_EXPIRATION)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let manual_pass_percentage =
            parsed("MANUAL_PASS_PERCENTAGE", DEFAULT_MANUAL_PASS_PERCENTAGE)?;
        if !(0.0..=100.0).contains(&manual_pass_percentage) {
            return Err(ConfigError::Invalid {
                key: "MANUAL_PASS_PERCENTAGE",
                value: manual_pass_percentage.to_string(),
            });
        }
        let marks = parsed("MARKS_POLICY", MarksPolicy::Reject)?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            app_env,
            bind_addr,
            cors_origins,
            grading: GradingPolicy {
                manual_pass_percentage,
                marks,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == "memory"
    }
}
