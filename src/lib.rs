//! # Polaris Digest
//!
//! Polls the Polaris SAST API, normalizes its JSON:API issue payloads into
//! flat per-project summaries and publishes them to Slack or Google Chat.

pub mod config;
pub mod digest;
pub mod error;
pub mod models;
pub mod normalization;
pub mod notifiers;
pub mod polaris;
pub mod telemetry;
