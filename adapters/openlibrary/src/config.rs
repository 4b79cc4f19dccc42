use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default search backend
pub const DEFAULT_BASE_URL: &str = "https://openlibrary.org";

/// Connection settings for the Open Library search API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenLibraryConfig {
    /// Base URL of the Open Library instance
    /// Default: "https://openlibrary.org"
    pub base_url: String,

    /// Timeout for a whole search request
    /// Default: 10s
    pub timeout: Duration,

    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for OpenLibraryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: format!("thingpreview/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl OpenLibraryConfig {
    /// Read configuration from environment variables
    ///
    /// - `THINGPREVIEW_BASE_URL`
    /// - `THINGPREVIEW_HTTP_TIMEOUT_SECS`
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("THINGPREVIEW_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }

        if let Some(secs) = env::var("THINGPREVIEW_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        config
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenLibraryConfig::default();
        assert_eq!(config.base_url, "https://openlibrary.org");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("thingpreview/"));
    }

    #[test]
    fn test_with_base_url() {
        let config = OpenLibraryConfig::default().with_base_url("http://localhost:8080");
        assert_eq!(config.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_serialization() {
        let config = OpenLibraryConfig::default().with_base_url("http://mirror.example");

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: OpenLibraryConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }
}
