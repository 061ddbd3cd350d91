use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::http_client::DEFAULT_TIMEOUT_SECS;

pub const API_BASE_KEYS: [&str; 2] = ["SCOUTLAY_API_BASE", "VITE_API_BASE"];

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_base: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub stats_parallelism: usize,
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let opt = |key: &str| {
            lookup(key).and_then(|val| {
                let val = val.trim().to_string();
                if val.is_empty() { None } else { Some(val) }
            })
        };

        let api_base = API_BASE_KEYS
            .iter()
            .find_map(|key| opt(*key))
            .map(|base| base.trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty());
        let poll_secs = opt("SCOUTLAY_POLL_SECS")
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(60)
            .max(5);
        let timeout_secs = opt("SCOUTLAY_TIMEOUT_SECS")
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, 120);
        let stats_parallelism = opt("SCOUTLAY_STATS_PARALLELISM")
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(4)
            .clamp(1, 16);

        Self {
            api_base,
            poll_interval: Duration::from_secs(poll_secs),
            request_timeout: Duration::from_secs(timeout_secs),
            stats_parallelism,
            log_file: opt("SCOUTLAY_LOG_FILE").map(PathBuf::from),
        }
    }
}

pub fn missing_base_warning() -> String {
    format!(
        "API base not configured: set {} (or {}) to the backend URL",
        API_BASE_KEYS[0], API_BASE_KEYS[1]
    )
}
