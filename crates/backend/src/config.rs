//! # Backend Configuration
//!
//! - `BACKEND_URL`: base URL of the booking backend. When unset, the client
//!   runs against a seeded in-memory backend.
//! - `BACKEND_REQUEST_TIMEOUT_SECONDS`: per-request timeout (default: 30)

use std::env;

use eyre::{Result, WrapErr};

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the remote backend, if any
    pub url: Option<String>,

    /// Request timeout in seconds
    pub request_timeout: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout: 30,
        }
    }
}

impl BackendConfig {
    /// Loads the backend configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Fails if `BACKEND_REQUEST_TIMEOUT_SECONDS` is set but is not a number.
    pub fn from_env() -> Result<Self> {
        let url = env::var("BACKEND_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let request_timeout = env::var("BACKEND_REQUEST_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .wrap_err("Invalid BACKEND_REQUEST_TIMEOUT_SECONDS value")?;

        Ok(Self {
            url,
            request_timeout,
        })
    }

    pub fn is_remote(&self) -> bool {
        self.url.is_some()
    }
}
