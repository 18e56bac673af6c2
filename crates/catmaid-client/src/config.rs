//! Client configuration

use crate::error::{ClientError, Result};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the CATMAID instance (e.g. "https://catmaid.example.org")
    pub base_url: String,
    /// Optional API token, sent as `X-Authorization: Token <token>`
    pub api_token: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Number of commands kept for undo (default: 50)
    pub history_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_token: None,
            timeout_secs: 30,
            history_capacity: 50,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ClientError::Config("timeout_secs must be positive".into()));
        }
        if self.history_capacity == 0 {
            return Err(ClientError::Config("history_capacity must be positive".into()));
        }
        if matches!(self.api_token.as_deref(), Some("")) {
            return Err(ClientError::Config("api_token must not be empty".into()));
        }
        Ok(())
    }

    /// Absolute URL for a path relative to the instance root
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(ClientConfig::new("ftp://catmaid").validate().is_err());
        assert!(ClientConfig::default().with_timeout_secs(0).validate().is_err());
        assert!(ClientConfig::default().with_history_capacity(0).validate().is_err());
        assert!(ClientConfig::default().with_api_token("").validate().is_err());
    }

    #[test]
    fn test_url_joins_single_slash() {
        let config = ClientConfig::new("https://catmaid.example.org/");
        assert_eq!(
            config.url("/1/connector/create"),
            "https://catmaid.example.org/1/connector/create"
        );
    }
}
