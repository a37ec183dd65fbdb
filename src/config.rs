//! Runtime configuration loaded from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads a `.env` file (if present) and then builds `AppConfig` once.
//! The config is cloned into `AppState` so handlers and background tasks
//! read the same values.

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_ORDER_FLUSH_INTERVAL_MS: u64 = 250;
const DEFAULT_DEMO_SIM_INTERVAL_SECS: u64 = 15;
const DEFAULT_ORDER_HISTORY_DAYS: i64 = 30;
const DEFAULT_STALL_IDLE_SECS: u64 = 900;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Origin used when building storefront links for QR codes.
    pub public_base_url: String,
    pub cookie_secure: bool,
    pub order_flush_interval_ms: u64,
    /// Demo simulator tick. Zero disables the simulator.
    pub demo_sim_interval_secs: u64,
    /// Days of order history hydrated into memory per stall.
    pub order_history_days: i64,
    /// Seconds without a request before a stall with no watchers is dropped
    /// from memory. Zero keeps stalls loaded forever.
    pub stall_idle_secs: u64,
}

impl AppConfig {
    /// Build config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or `PORT` is not a valid port.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_owned())
            .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_owned());
        let cookie_secure = env_bool("COOKIE_SECURE").unwrap_or_else(|| public_base_url.starts_with("https://"));

        Ok(Self {
            database_url,
            port,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            public_base_url,
            cookie_secure,
            order_flush_interval_ms: env_parse("ORDER_FLUSH_INTERVAL_MS", DEFAULT_ORDER_FLUSH_INTERVAL_MS),
            demo_sim_interval_secs: env_parse("DEMO_SIM_INTERVAL_SECS", DEFAULT_DEMO_SIM_INTERVAL_SECS),
            order_history_days: env_parse("ORDER_HISTORY_DAYS", DEFAULT_ORDER_HISTORY_DAYS).max(1),
            stall_idle_secs: env_parse("STALL_IDLE_SECS", DEFAULT_STALL_IDLE_SECS),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_owned(),
            cookie_secure: false,
            order_flush_interval_ms: DEFAULT_ORDER_FLUSH_INTERVAL_MS,
            demo_sim_interval_secs: DEFAULT_DEMO_SIM_INTERVAL_SECS,
            order_history_days: DEFAULT_ORDER_HISTORY_DAYS,
            stall_idle_secs: DEFAULT_STALL_IDLE_SECS,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
