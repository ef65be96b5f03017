//! Shared wire types for the CIRIS client workspace.
//!
//! Keep DTOs consumed by both the client library and the CLI here to avoid duplication.

#![warn(missing_docs)]

/// API request/response DTOs.
pub mod api;
/// Tagged configuration values and their wire wrapper.
pub mod config_value;
