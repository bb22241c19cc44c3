//! Common utilities and shared types for mailspool.
//!
//! This crate provides foundational components used across all mailspool
//! crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]

pub mod config;
pub mod error;
pub mod id;

pub use config::{CampaignConfig, Config, EmailConfig, IngestConfig, SmtpConfig};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
