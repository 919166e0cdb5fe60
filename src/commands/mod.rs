//! # Command System
//!
//! Prefix (`.`) commands typed into the target channel.
//!
//! - **Version**: 3.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 3.0.0: Prefix commands for deadlines and pin baskets, dispatcher renders
//!   errors as replies
//! - 2.1.0: Add modular handler infrastructure (handler trait, context, registry)
//! - 1.0.0: Initial reorganization with modular command structure

pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod handlers;
pub mod registry;

pub use context::CommandContext;
pub use dispatcher::CommandDispatcher;
pub use handler::{Args, CommandError, CommandHandler, CommandResult};
pub use registry::CommandRegistry;
