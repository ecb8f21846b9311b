use std::env;
use std::path::PathBuf;

use reqwest::Url;

#[derive(Debug, Clone)]
pub struct Config {
    // Backend
    pub api_base_url: Url,
    pub request_timeout_seconds: Option<u64>,

    // Exports
    pub download_dir: PathBuf,

    // Presentation
    pub summary_precision: usize,

    // Caching
    pub end_date_cache_ttl_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default base URL is valid"),
            request_timeout_seconds: None,
            download_dir: PathBuf::from("downloads"),
            summary_precision: 2,
            end_date_cache_ttl_seconds: 600,
        }
    }
}

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unset or unparsable numeric values fall
    /// back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `BIOCHAR_API_BASE_URL` is not a valid URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let base = env::var("BIOCHAR_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            // Backend
            api_base_url: Self::parse_base_url(&base)?,
            request_timeout_seconds: env::var("BIOCHAR_REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0),

            // Exports
            download_dir: env::var("BIOCHAR_DOWNLOAD_DIR")
                .map_or_else(|_| PathBuf::from("downloads"), PathBuf::from),

            // Presentation
            summary_precision: env::var("BIOCHAR_SUMMARY_PRECISION")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),

            // Caching
            end_date_cache_ttl_seconds: env::var("BIOCHAR_END_DATE_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .unwrap_or(600),
        })
    }

    /// Parse a backend root URL, normalizing it to end with `/` so that
    /// endpoint paths join underneath it instead of replacing its last segment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the string is not an absolute URL.
    pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
        let trimmed = raw.trim();
        let with_slash = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        Url::parse(&with_slash)
            .map_err(|e| ConfigError::Invalid("BIOCHAR_API_BASE_URL", format!("{raw}: {e}")))
    }

    #[must_use]
    pub fn with_base_url(mut self, url: Url) -> Self {
        self.api_base_url = url;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    Invalid(&'static str, String),
}
