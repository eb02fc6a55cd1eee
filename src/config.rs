//! Runtime configuration, read once from the environment at startup.
//!
//! | Variable | Default |
//! |---|---|
//! | `ANTHROPIC_API_KEY` | unset: checks and hints fail with a configuration error |
//! | `MATHPAD_MODEL` | [`DEFAULT_MODEL`] |
//! | `MATHPAD_API_URL` | [`DEFAULT_API_URL`] |
//! | `MATHPAD_BIND` | [`DEFAULT_BIND`] |
//! | `MATHPAD_DB` | [`DEFAULT_DB_PATH`] |
//! | `MATHPAD_DEMO` | off; `1` or `true` disables persistence |

use crate::url_validator::{validate_api_url, UrlValidationError};
use std::env;
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_DB_PATH: &str = ".mathpad_db";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: Url,
    pub bind: String,
    pub db_path: PathBuf,
    pub demo_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, UrlValidationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, UrlValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = non_empty("MATHPAD_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            api_key: non_empty("ANTHROPIC_API_KEY"),
            model: non_empty("MATHPAD_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_url: validate_api_url(&api_url)?,
            bind: non_empty("MATHPAD_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            db_path: PathBuf::from(
                non_empty("MATHPAD_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            ),
            demo_mode: non_empty("MATHPAD_DEMO")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}
