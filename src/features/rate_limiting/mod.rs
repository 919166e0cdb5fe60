//! # Rate Limiting Feature
//!
//! Keeps a single user from flooding the channel with commands.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod limiter;

pub use limiter::{Admission, RateLimiter};
