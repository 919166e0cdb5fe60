//! Command handler registry
//!
//! - **Version**: 1.1.0
//! - **Since**: 3.38.0
//!
//! ## Changelog
//! - 1.1.0: Case-insensitive lookup for prefix commands
//! - 1.0.0: Initial implementation for handler dispatch

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::CommandHandler;

/// Registry mapping command words to handlers
///
/// Multiple words can map to the same handler if they share logic.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under every word returned by `command_names()`
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        for name in handler.command_names() {
            self.handlers.insert(name, Arc::clone(&handler));
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name.to_lowercase().as_str()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of registered command words
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::CommandContext;
    use crate::commands::handler::{Args, CommandResult};
    use async_trait::async_trait;

    struct MockHandler {
        names: &'static [&'static str],
    }

    #[async_trait]
    impl CommandHandler for MockHandler {
        fn command_names(&self) -> &'static [&'static str] {
            self.names
        }

        async fn handle(&self, _ctx: &CommandContext, command: &str, _args: Args<'_>) -> CommandResult {
            Ok(command.to_string())
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = CommandRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_register_multiple_names() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(MockHandler { names: &["h", "help"] }));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("h"));
        assert!(registry.contains("HELP"));
        assert!(!registry.contains("d"));
        assert!(registry.get("missing").is_none());
    }
}
