//! Boardroom Limits Library
//!
//! This library provides the quota machinery behind the AI board-meeting
//! service: per-caller request rate limiting for the HTTP API and usage
//! tracking for the premium LLM services that power the simulated
//! executive discussions.

pub mod config;
pub mod error;
pub mod logging;
pub mod maintenance;
pub mod metrics;
pub mod rate_limit;
pub mod server;
pub mod usage;
