//! Per-command handler implementations
//!
//! - **Version**: 3.0.0
//! - **Since**: 3.38.0
//!
//! ## Changelog
//! - 3.0.0: Prefix commands: help, deadlines, pin baskets
//! - 1.0.0: Initial extraction from monolithic command_handler.rs

pub mod deadline;
pub mod help;
pub mod pins;

use std::sync::Arc;

use super::handler::CommandHandler;

/// Create all registered command handlers
pub fn create_all_handlers() -> Vec<Arc<dyn CommandHandler>> {
    vec![
        Arc::new(help::HelpHandler),
        Arc::new(deadline::DeadlineHandler),
        Arc::new(pins::PinHandler),
    ]
}
