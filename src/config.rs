// SPDX-License-Identifier: MIT

//! Environment configuration
//!
//! Values come from the process environment; the CLI loads a `.env` file
//! first with `dotenv`.

use crate::error::{FunnelError, Result};

pub const DEFAULT_FUNNEL_ID: &str = "funnel";
pub const DEFAULT_BASE_URL: &str = "http://localhost/";

/// Engine and binding settings
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelConfig {
    /// Identifier used for the URL query parameter
    pub funnel_id: String,
    /// Drop fields of later steps when navigating back
    pub cleanup_on_back: bool,
    /// Base URL the query binding writes into
    pub base_url: String,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            funnel_id: DEFAULT_FUNNEL_ID.to_string(),
            cleanup_on_back: true,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl FunnelConfig {
    /// Read `FUNNEL_ID`, `FUNNEL_CLEANUP_ON_BACK` and `FUNNEL_BASE_URL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(id) = lookup("FUNNEL_ID") {
            if id.trim().is_empty() {
                return Err(FunnelError::config("FUNNEL_ID must not be empty"));
            }
            config.funnel_id = id.trim().to_string();
        }

        if let Some(raw) = lookup("FUNNEL_CLEANUP_ON_BACK") {
            config.cleanup_on_back = parse_bool(&raw).ok_or_else(|| {
                FunnelError::config(format!(
                    "FUNNEL_CLEANUP_ON_BACK must be a boolean, got '{}'",
                    raw
                ))
            })?;
        }

        if let Some(url) = lookup("FUNNEL_BASE_URL") {
            url::Url::parse(&url)?;
            config.base_url = url;
        } else {
            log::debug!("FUNNEL_BASE_URL not set, using {}", DEFAULT_BASE_URL);
        }

        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
