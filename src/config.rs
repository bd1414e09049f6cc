// src/config.rs

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    /// Time budget of every exam session.
    pub exam_time_limit: Duration,
    /// Questions drawn per session when the client does not ask for a count.
    pub default_question_count: Option<usize>,
    /// Cadence of the session ticker.
    pub tick_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = parsed("BIND_ADDR")?.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let exam_time_limit = Duration::from_secs(parsed("EXAM_TIME_LIMIT_SECS")?.unwrap_or(1800));
        if exam_time_limit.is_zero() {
            return Err(ConfigError::Invalid {
                name: "EXAM_TIME_LIMIT_SECS",
                value: "0".to_string(),
            });
        }

        let default_question_count = parsed("EXAM_QUESTION_COUNT")?;

        let tick_interval = Duration::from_millis(parsed("TICK_INTERVAL_MS")?.unwrap_or(1000));
        if tick_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "TICK_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            exam_time_limit,
            default_question_count,
            tick_interval,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(None),
    }
}
