//! Premium Services and Static Limits
//!
//! The quota-limited LLM subscriptions the discussion engine can draw on,
//! in fixed priority order, with the caps each one is tracked against.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Days per month used to derive the daily cap
const DAYS_PER_MONTH: u32 = 30;

/// Weeks per month used to derive the weekly cap
const WEEKS_PER_MONTH: f64 = 4.3;

/// A quota-limited premium LLM service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PremiumService {
    /// Anthropic Claude Pro
    #[serde(rename = "claude_pro")]
    ClaudePro,
    /// OpenAI ChatGPT Plus
    #[serde(rename = "chatgpt_plus")]
    ChatGptPlus,
    /// Google Gemini Advanced
    #[serde(rename = "gemini_advanced")]
    GeminiAdvanced,
}

impl PremiumService {
    /// All services, highest perceived quality first
    pub const PRIORITY: [PremiumService; 3] = [
        PremiumService::ClaudePro,
        PremiumService::ChatGptPlus,
        PremiumService::GeminiAdvanced,
    ];

    /// Stable label used in storage, CSV and URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            PremiumService::ClaudePro => "claude_pro",
            PremiumService::ChatGptPlus => "chatgpt_plus",
            PremiumService::GeminiAdvanced => "gemini_advanced",
        }
    }

    /// Human-readable product name
    pub fn display_name(&self) -> &'static str {
        match self {
            PremiumService::ClaudePro => "Claude Pro",
            PremiumService::ChatGptPlus => "ChatGPT Plus",
            PremiumService::GeminiAdvanced => "Gemini Advanced",
        }
    }

    /// Monthly request cap
    pub fn monthly_limit(&self) -> u32 {
        match self {
            PremiumService::ClaudePro => 2000,
            PremiumService::ChatGptPlus => 1200,
            PremiumService::GeminiAdvanced => 1500,
        }
    }

    /// Static limits derived from the monthly cap
    pub fn limits(&self) -> ServiceLimits {
        ServiceLimits::from_monthly(self.monthly_limit())
    }
}

impl fmt::Display for PremiumService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PremiumService {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude_pro" | "claude" => Ok(PremiumService::ClaudePro),
            "chatgpt_plus" | "chatgpt" | "openai" => Ok(PremiumService::ChatGptPlus),
            "gemini_advanced" | "gemini" => Ok(PremiumService::GeminiAdvanced),
            _ => Err(ParseError::UnknownService(s.to_string())),
        }
    }
}

/// Daily, weekly and monthly caps for one service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLimits {
    pub daily: u32,
    pub weekly: u32,
    pub monthly: u32,
}

impl ServiceLimits {
    /// `daily = monthly / 30`, `weekly = monthly / 4.3`, both floored.
    ///
    /// An approximation, not a calendar computation.
    pub fn from_monthly(monthly: u32) -> Self {
        Self {
            daily: monthly / DAYS_PER_MONTH,
            weekly: (f64::from(monthly) / WEEKS_PER_MONTH).floor() as u32,
            monthly,
        }
    }
}
