use crate::pool::{BackoffConfig, CoordinatorConfig};

/// Runtime configuration, loaded once from environment variables and
/// handed to the components that need it. The coordinator never reads
/// the environment itself; tests construct [`CoordinatorConfig`] directly.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_pool_size: u32,
    pub db_pool_pre_ping: bool,

    pub api_addr: String,
    pub migrate_on_startup: bool,
    pub allowed_origins: Vec<String>,

    pub default_max_retries: i32,
    pub max_retry_wait_seconds: i64,
    pub min_backoff_seconds: f64,
    pub max_backoff_seconds: f64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let db_pool_size = env_or_fallback("POOL_DB_POOL_SIZE", "DB_POOL_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let db_pool_pre_ping = env_bool("POOL_DB_PRE_PING").unwrap_or(true);

        let api_addr = env_or_fallback("POOL_API_ADDR", "API_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8000".to_string());

        let migrate_on_startup = env_bool("POOL_MIGRATE_ON_STARTUP").unwrap_or(false);

        let allowed_origins = env_or_fallback("POOL_ALLOWED_ORIGINS", "ALLOWED_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or_else(|| vec!["*".to_string()]);

        let default_max_retries: i32 =
            env_or_fallback("POOL_DEFAULT_MAX_RETRIES", "DEFAULT_MAX_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(10)
                .clamp(1, 50);

        let max_retry_wait_seconds: i64 =
            env_or_fallback("POOL_MAX_RETRY_WAIT_SECONDS", "MAX_RETRY_WAIT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(10)
                .max(1);

        let min_backoff_seconds: f64 =
            env_or_fallback("POOL_MIN_BACKOFF_SECONDS", "MIN_BACKOFF_SECONDS")
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.5);

        let max_backoff_seconds: f64 =
            env_or_fallback("POOL_MAX_BACKOFF_SECONDS", "MAX_BACKOFF_SECONDS")
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(15.0)
                .max(min_backoff_seconds);

        Ok(Self {
            database_url,
            db_pool_size,
            db_pool_pre_ping,
            api_addr,
            migrate_on_startup,
            allowed_origins,
            default_max_retries,
            max_retry_wait_seconds,
            min_backoff_seconds,
            max_backoff_seconds,
        })
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            default_max_retries: self.default_max_retries,
            backoff: BackoffConfig {
                max_retry_wait_seconds: self.max_retry_wait_seconds,
                min_backoff_seconds: self.min_backoff_seconds,
                max_backoff_seconds: self.max_backoff_seconds,
            },
        }
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn parse_origins(value: &str) -> Vec<String> {
    if value.trim() == "*" {
        return vec!["*".to_string()];
    }
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
