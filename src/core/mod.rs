//! # Core Module
//!
//! Configuration, error types, the clock seam and reply utilities shared by
//! every other layer.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.7.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Add clock and error modules, env + JSON file configuration
//! - 1.1.0: Add response module with Discord message chunking utilities
//! - 1.0.0: Initial creation with config module

pub mod clock;
pub mod config;
pub mod error;
pub mod response;

pub use clock::{Clock, SystemClock};
pub use config::{Config, StoreBackend};
pub use error::{ConfigError, StoreError, TransportError};
pub use response::{chunk_for_message, chunk_text, truncate_for_message, MESSAGE_LIMIT};
