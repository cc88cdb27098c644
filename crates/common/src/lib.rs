//! Common utilities and types shared across the cloudcheck crates.

#![warn(clippy::pedantic)]

/// Module for the shared error taxonomy
pub mod error;

/// Module for common data types
pub mod types;

/// Module for common configuration
pub mod config;

/// Module for tracing subscriber setup
pub mod logging;

/// Module for secret types that prevent accidental logging
pub mod secret;
