use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub session_ttl_secs: u64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("FOODAID_PORT", "8000"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            session_ttl_secs: try_load("FOODAID_SESSION_TTL", "43200"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
