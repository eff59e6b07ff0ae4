#![forbid(unsafe_code)]

//! Client configuration.
//!
//! Loaded from an optional JSON file, then overridden by `CALLSTREAM_*`
//! environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `CALLSTREAM_LIVEKIT_SERVICE_URL` | `livekit.livekit_service_url` |
//! | `CALLSTREAM_E2EE` | `e2ee.enabled` |
//! | `CALLSTREAM_ANALYTICS` | `analytics.enabled` |
//!
//! ```json
//! {
//!   "livekit": { "livekit_service_url": "https://sfu.example.org" },
//!   "e2ee": { "enabled": true },
//!   "analytics": { "enabled": false }
//! }
//! ```

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CallError, Result};

pub const ENV_LIVEKIT_SERVICE_URL: &str = "CALLSTREAM_LIVEKIT_SERVICE_URL";
pub const ENV_E2EE: &str = "CALLSTREAM_E2EE";
pub const ENV_ANALYTICS: &str = "CALLSTREAM_ANALYTICS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    pub livekit: Option<LivekitConfig>,
    pub e2ee: E2eeConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivekitConfig {
    /// Fallback SFU service URL for calls that do not advertise their own.
    pub livekit_service_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct E2eeConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enabled: bool,
}

impl CallConfig {
    /// Parse a JSON config document. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CallError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        tracing::debug!(message = "config.load", path = %path.display());
        Ok(config)
    }

    /// Defaults or `path`, then process environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `CALLSTREAM_*` overrides read through `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_LIVEKIT_SERVICE_URL)
            && !url.is_empty()
        {
            self.livekit = Some(LivekitConfig {
                livekit_service_url: url,
            });
        }
        if let Some(val) = lookup(ENV_E2EE) {
            self.e2ee.enabled = parse_flag(ENV_E2EE, &val)?;
        }
        if let Some(val) = lookup(ENV_ANALYTICS) {
            self.analytics.enabled = parse_flag(ENV_ANALYTICS, &val)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn livekit_service_url(&self) -> Option<&str> {
        self.livekit
            .as_ref()
            .map(|lk| lk.livekit_service_url.as_str())
            .filter(|url| !url.is_empty())
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(CallError::InvalidEnv {
            var,
            value: value.to_string(),
        }),
    }
}
