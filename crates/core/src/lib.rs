//! Core business logic for mailspool.

pub mod services;

pub use services::*;
