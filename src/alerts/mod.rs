//! Alert checks
//!
//! An alert check declares the configuration keys it needs as
//! `{{section/property}}` tokens. The caller resolves them from the cluster
//! configuration and hands the values to [`AlertCheck::execute`], which
//! always answers with a tri-state [`AlertOutcome`] instead of failing.

pub mod oozie;

use crate::config::{ClusterConfig, scalar_text};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Resolved token values keyed by `section/property`
pub type Configurations = BTreeMap<String, String>;

/// Script parameters supplied with the alert definition
pub type Parameters = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Ok,
    Critical,
    Unknown,
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ok => "OK",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertOutcome {
    pub status: AlertStatus,
    pub messages: Vec<String>,
}

impl AlertOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(AlertStatus::Ok, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(AlertStatus::Critical, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(AlertStatus::Unknown, message)
    }

    fn new(status: AlertStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            messages: vec![message.into()],
        }
    }
}

pub trait AlertCheck {
    /// Tokens in `{{section/property}}` form
    fn tokens(&self) -> Vec<&'static str>;

    /// Run the check
    ///
    /// `configurations` is `None` when the orchestrator supplied nothing at all.
    fn execute(
        &self,
        configurations: Option<&Configurations>,
        parameters: &Parameters,
        host_name: &str,
    ) -> AlertOutcome;
}

/// Strip the braces from a `{{section/property}}` token
pub fn token_key(token: &str) -> &str {
    token
        .trim()
        .strip_prefix("{{")
        .and_then(|t| t.strip_suffix("}}"))
        .unwrap_or(token)
        .trim()
}

/// Fetch the values of a check's tokens; absent keys are left out
pub fn resolve_tokens(check: &dyn AlertCheck, config: &ClusterConfig) -> Configurations {
    check
        .tokens()
        .into_iter()
        .map(token_key)
        .filter_map(|key| {
            let value = config.get(key)?;
            if value.is_null() {
                return None;
            }
            Some((key.to_string(), scalar_text(value)))
        })
        .collect()
}
