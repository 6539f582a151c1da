//! Usage Records
//!
//! Immutable log entries for attempts to call a premium service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::service::PremiumService;
use crate::error::ParseError;

/// How much deliberation the discussion requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    Quick,
    #[default]
    Balanced,
    Deep,
}

impl ThinkingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingMode::Quick => "quick",
            ThinkingMode::Balanced => "balanced",
            ThinkingMode::Deep => "deep",
        }
    }
}

impl fmt::Display for ThinkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThinkingMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(ThinkingMode::Quick),
            "balanced" => Ok(ThinkingMode::Balanced),
            "deep" => Ok(ThinkingMode::Deep),
            _ => Err(ParseError::UnknownThinkingMode(s.to_string())),
        }
    }
}

/// A single attempt to use a premium service
///
/// Serialized with camelCase keys and an ISO-8601 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// When the call completed (UTC)
    pub timestamp: DateTime<Utc>,

    /// Service that was called
    pub service: PremiumService,

    /// Board member the call was made for (e.g. "CFO")
    pub agent: String,

    /// Discussion topic
    pub topic: String,

    /// Thinking mode requested
    pub thinking_mode: ThinkingMode,

    /// Whether the call succeeded
    pub success: bool,

    /// Response latency in milliseconds
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,

    /// Error reported by the service, if the call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Input to [`UsageTracker::record`](super::UsageTracker::record)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageAttempt {
    pub service: PremiumService,
    pub agent: String,
    pub topic: String,
    #[serde(default)]
    pub thinking_mode: ThinkingMode,
    pub success: bool,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl UsageAttempt {
    /// A successful call
    pub fn succeeded(
        service: PremiumService,
        agent: impl Into<String>,
        topic: impl Into<String>,
        thinking_mode: ThinkingMode,
        response_time_ms: u64,
    ) -> Self {
        Self {
            service,
            agent: agent.into(),
            topic: topic.into(),
            thinking_mode,
            success: true,
            response_time_ms,
            error_message: None,
        }
    }

    /// A failed call with the service's error message
    pub fn failed(
        service: PremiumService,
        agent: impl Into<String>,
        topic: impl Into<String>,
        thinking_mode: ThinkingMode,
        response_time_ms: u64,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            service,
            agent: agent.into(),
            topic: topic.into(),
            thinking_mode,
            success: false,
            response_time_ms,
            error_message: Some(error_message.into()),
        }
    }

    /// Stamp the attempt into an immutable record
    pub fn into_record(self, timestamp: DateTime<Utc>) -> UsageRecord {
        UsageRecord {
            timestamp,
            service: self.service,
            agent: self.agent,
            topic: self.topic,
            thinking_mode: self.thinking_mode,
            success: self.success,
            response_time_ms: self.response_time_ms,
            error_message: self.error_message,
        }
    }
}
