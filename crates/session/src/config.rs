//! # Session Configuration
//!
//! - `LOG_LEVEL`: logging level (default: "info")
//! - `CODE_COOLDOWN_SECONDS`: seconds before another code may be requested
//!   (default: 180)
//! - `VERIFICATION_CODE`: fixed verification code for testing. When unset a
//!   random six digit code is issued.

use std::env;

use eyre::{Result, WrapErr};
use tracing::Level;

use crate::verification::{CodeSource, CODE_COOLDOWN_SECS};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Log level for the application
    pub log_level: Level,

    /// Countdown before a code may be re-issued
    pub code_cooldown_secs: u32,

    /// Fixed code issued instead of a random one
    pub fixed_code: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            code_cooldown_secs: CODE_COOLDOWN_SECS,
            fixed_code: None,
        }
    }
}

impl SessionConfig {
    /// Loads the session configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Fails if `CODE_COOLDOWN_SECONDS` is set but is not a number.
    pub fn from_env() -> Result<Self> {
        let log_level = match env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()).as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };

        let code_cooldown_secs = env::var("CODE_COOLDOWN_SECONDS")
            .unwrap_or_else(|_| CODE_COOLDOWN_SECS.to_string())
            .parse()
            .wrap_err("Invalid CODE_COOLDOWN_SECONDS value")?;

        let fixed_code = env::var("VERIFICATION_CODE")
            .ok()
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty());

        Ok(Self {
            log_level,
            code_cooldown_secs,
            fixed_code,
        })
    }

    pub fn code_source(&self) -> CodeSource {
        match &self.fixed_code {
            Some(code) => CodeSource::Fixed(code.clone()),
            None => CodeSource::Random,
        }
    }
}
