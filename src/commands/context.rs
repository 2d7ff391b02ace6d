//! Per-dispatch command context.

use super::{CommandRegistry, Source};
use crate::error::CommandError;
use crate::identity::{Identity, Level};
use crate::bot::BotState;

/// Everything a handler may touch during one dispatch.
pub struct CommandContext<'a> {
    pub state: &'a BotState,
    pub registry: &'a CommandRegistry,
    /// Resolved issuer, `None` for anonymous issuers.
    pub issuer: Option<&'a Identity>,
    /// Raw issuer name as seen on the transport.
    pub issuer_name: &'a str,
    pub level: Level,
    pub source: Source,
}

impl<'a> CommandContext<'a> {
    /// The resolved issuer, or a privilege error for anonymous issuers.
    pub fn require_issuer(&self) -> Result<&'a Identity, CommandError> {
        self.issuer.ok_or(CommandError::Privilege)
    }

    /// Language text for `key`.
    pub fn text(&self, key: &str, default: &str) -> String {
        self.state.text(key, default)
    }

    /// Language text for `key` with each `{}` replaced by the next argument.
    pub fn text_with(&self, key: &str, default: &str, args: &[&str]) -> String {
        self.state.text_with(key, default, args)
    }
}
