use std::{env, fmt::Display, str::FromStr};

use services::DEFAULT_MAX_WRITE_ATTEMPTS;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub const DEFAULT_DB_URL: &str = "sqlite://study.sqlite3";
const DEFAULT_LOG_FILTER: &str = "info";

/// Settings read from the environment; command-line flags override them.
pub struct Config {
    pub db_url: String,
    pub max_write_attempts: u32,
}

impl Config {
    pub fn load() -> Self {
        Self {
            db_url: try_load("STUDY_DB_URL", DEFAULT_DB_URL.to_string()),
            max_write_attempts: try_load("STUDY_MAX_WRITE_ATTEMPTS", DEFAULT_MAX_WRITE_ATTEMPTS),
        }
    }
}

/// Install the stderr subscriber. `STUDY_LOG` wins over `RUST_LOG`.
pub fn init_tracing() {
    let filter = env::var("STUDY_LOG")
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}
