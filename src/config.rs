use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

#[derive(Clone, Debug)]
pub struct Config {
    /// Backend origin; API paths such as `/api/vessels/` are joined onto it.
    pub api_base: Url,
    pub sqlite_path: String,
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let base = std::env::var("VESSELHIRE_API_BASE")
            .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
        Ok(Self {
            api_base: Url::parse(&base).with_context(|| format!("invalid VESSELHIRE_API_BASE {}", base))?,
            sqlite_path: std::env::var("VESSELHIRE_DB").unwrap_or_else(|_| "./vesselhire.sqlite".to_string()),
            request_timeout: std::env::var("VESSELHIRE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
        })
    }
}
