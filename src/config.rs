use dotenv::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::fmt;
use std::str::FromStr;

pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub jwt_secret: String,
    pub request_timeout_secs: u64,
    pub store_timeout_ms: u64,
    pub store_max_retries: u32,
    pub store_retry_base_ms: u64,
    pub watch_interval_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("jwt_secret", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("store_max_retries", &self.store_max_retries)
            .field("store_retry_base_ms", &self.store_retry_base_ms)
            .field("watch_interval_secs", &self.watch_interval_secs)
            .finish()
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    fn from_env() -> Self {
        dotenv().ok();

        Self {
            port: parsed("PORT", 3000),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()), // set a real secret outside development
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", 30),
            store_timeout_ms: parsed("STORE_TIMEOUT_MS", 2000),
            store_max_retries: parsed("STORE_MAX_RETRIES", 3),
            store_retry_base_ms: parsed("STORE_RETRY_BASE_MS", 50),
            watch_interval_secs: parsed("WATCH_INTERVAL_SECS", 30),
        }
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);
