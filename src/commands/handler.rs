//! Command handler trait and argument plumbing
//!
//! - **Version**: 2.0.0
//! - **Since**: 3.38.0
//!
//! ## Changelog
//! - 2.0.0: Prefix commands over plain text, handlers return the reply text
//! - 1.0.0: Initial implementation for modular command handling

use async_trait::async_trait;

use super::context::CommandContext;
use crate::core::error::StoreError;

/// Why a command produced no result
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Malformed invocation; carries the expected form
    #[error("usage: {0}")]
    Usage(String),

    /// Well-formed but unacceptable input
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CommandResult = Result<String, CommandError>;

/// Whitespace-separated arguments following the command word.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    rest: &'a str,
}

impl<'a> Args<'a> {
    pub fn new(rest: &'a str) -> Self {
        Self { rest: rest.trim() }
    }

    /// Take the next word
    pub fn next_word(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        match self.rest.split_once(char::is_whitespace) {
            Some((word, rest)) => {
                self.rest = rest.trim_start();
                Some(word)
            }
            None => {
                let word = self.rest;
                self.rest = "";
                Some(word)
            }
        }
    }

    /// Everything not consumed yet, surrounding whitespace removed
    pub fn remainder(&self) -> &'a str {
        self.rest.trim_end()
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }
}

/// Trait for prefix command handlers
///
/// Each handler serves one or more command words and turns the remaining
/// arguments into reply text. Handlers are registered with a
/// [`super::CommandRegistry`] and looked up by the command word.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Command word(s) this handler processes, without the prefix
    fn command_names(&self) -> &'static [&'static str];

    async fn handle(&self, ctx: &CommandContext, command: &str, args: Args<'_>) -> CommandResult;
}
