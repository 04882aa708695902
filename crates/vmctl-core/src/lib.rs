//! # vmctl-core
//!
//! Core types and utilities shared by the vmctl provider crates.
//!
//! This crate provides the common error taxonomy, HTTP client configuration,
//! the JSON response envelope printed by every command, and small helpers for
//! building provider requests.
//!
//! ## Modules
//!
//! - [`error`] - Error types and provider status-code mapping
//! - [`client`] - HTTP client configuration and polling constants
//! - [`query`] - URL query parameter helper
//! - [`response`] - The command response envelope

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod query;
pub mod response;

// Re-export commonly used types
pub use error::{Error, Result};
pub use response::CommandResponse;
