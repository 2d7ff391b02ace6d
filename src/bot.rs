//! Shared bot state.
//!
//! [`BotState`] is built once by the composition root and handed to the
//! dispatcher, the commands and the bridge. It owns the stores and the
//! outbound sinks; there is no process-wide singleton.

use crate::bridge::Direction;
use crate::bridge::format::{game_lines, truncate_for_chat};
use crate::error::{CommandError, TransportError};
use crate::events::LogEventPipeline;
use crate::identity::IdentityRegistry;
use crate::store::{Settings, StoreError};
use crate::transport::{ChatNetwork, GameConsole};
use crate::world::WorldData;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Runtime settings keys.
pub mod keys {
    pub const MAX_LEN: &str = "chatbot.maxlen";
    pub const MAX_LINES: &str = "chatbot.maxlines";
    pub const CAPTURE_DELAY: &str = "chatbot.capturedelay";
    pub const MIRROR_GAME_TO_CHAT: &str = "chatbot.mirror.gametochat";
    pub const MIRROR_CHAT_TO_GAME: &str = "chatbot.mirror.chattogame";
}

pub const DEFAULT_MAX_LEN: i64 = 1024;
pub const DEFAULT_MAX_LINES: i64 = 16;
pub const DEFAULT_CAPTURE_DELAY_MS: i64 = 1000;

/// The most recent internal command failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub command: String,
    pub code: &'static str,
    pub message: String,
    pub at: DateTime<Utc>,
}

pub struct BotState {
    pub identities: IdentityRegistry,
    pub settings: Settings,
    pub language: Settings,
    pub console: Arc<dyn GameConsole>,
    pub chat: Arc<dyn ChatNetwork>,
    pub pipeline: Arc<LogEventPipeline>,
    pub world: Option<Arc<dyn WorldData>>,
    last_error: Mutex<Option<LastError>>,
}

impl BotState {
    pub fn new(
        identities: IdentityRegistry,
        settings: Settings,
        language: Settings,
        console: Arc<dyn GameConsole>,
        chat: Arc<dyn ChatNetwork>,
        pipeline: Arc<LogEventPipeline>,
    ) -> Self {
        let state = Self {
            identities,
            settings,
            language,
            console,
            chat,
            pipeline,
            world: None,
            last_error: Mutex::new(None),
        };
        state.seed_defaults();
        state
    }

    pub fn with_world(mut self, world: Arc<dyn WorldData>) -> Self {
        self.world = Some(world);
        self
    }

    /// Insert missing runtime settings with their defaults.
    fn seed_defaults(&self) {
        self.settings.get_or_insert(keys::MAX_LEN, DEFAULT_MAX_LEN);
        self.settings.get_or_insert(keys::MAX_LINES, DEFAULT_MAX_LINES);
        self.settings.get_or_insert(keys::CAPTURE_DELAY, DEFAULT_CAPTURE_DELAY_MS);
        self.settings.get_or_insert(keys::MIRROR_GAME_TO_CHAT, false);
        self.settings.get_or_insert(keys::MIRROR_CHAT_TO_GAME, false);
    }

    // ========================================================================
    // Settings and language
    // ========================================================================

    pub fn max_len(&self) -> usize {
        positive(self.settings.get_i64(keys::MAX_LEN), DEFAULT_MAX_LEN)
    }

    pub fn max_lines(&self) -> usize {
        positive(self.settings.get_i64(keys::MAX_LINES), DEFAULT_MAX_LINES)
    }

    pub fn capture_delay(&self) -> Duration {
        let ms = positive(self.settings.get_i64(keys::CAPTURE_DELAY), DEFAULT_CAPTURE_DELAY_MS);
        Duration::from_millis(ms as u64)
    }

    pub fn mirror_enabled(&self, direction: Direction) -> bool {
        self.settings
            .get_bool(direction.settings_key())
            .unwrap_or(false)
    }

    /// Turn mirroring for `direction` on or off and persist the settings.
    pub fn set_mirror(&self, direction: Direction, enabled: bool) -> Result<(), StoreError> {
        self.settings.put(direction.settings_key(), enabled);
        info!(direction = direction.as_str(), enabled, "Mirroring changed");
        self.settings.save()
    }

    /// Language text for `key`; a missing key is added with `default`.
    pub fn text(&self, key: &str, default: &str) -> String {
        self.language.string_or(key, default)
    }

    /// Language text with each `{}` replaced by the next of `args`.
    pub fn text_with(&self, key: &str, default: &str, args: &[&str]) -> String {
        fill(&self.text(key, default), args)
    }

    /// Save settings, identities and language, stopping at the first failure.
    pub fn save_all(&self) -> Result<(), StoreError> {
        self.settings.save()?;
        self.identities.save()?;
        self.language.save()
    }

    // ========================================================================
    // Outbound helpers
    // ========================================================================

    /// Run a console command.
    pub async fn game_command(&self, command: &str) -> Result<(), TransportError> {
        debug!(%command, "Console command");
        self.console.send_line(command).await
    }

    /// Run a console command and return the log lines printed during the
    /// capture delay.
    pub async fn game_command_captured(&self, command: &str) -> Result<Vec<String>, TransportError> {
        let ticket = self.pipeline.begin_capture(self.capture_delay());
        self.game_command(command).await?;
        Ok(self.pipeline.end_capture(ticket).await)
    }

    /// Broadcast `text` in game, one `say` per non-empty line.
    pub async fn say(&self, text: &str) -> Result<(), TransportError> {
        for line in game_lines(text) {
            self.game_command(&format!("say {line}")).await?;
        }
        Ok(())
    }

    /// Whisper `text` to one player, one `tell` per non-empty line.
    pub async fn tell(&self, player: &str, text: &str) -> Result<(), TransportError> {
        for line in game_lines(text) {
            self.game_command(&format!("tell {player} {line}")).await?;
        }
        Ok(())
    }

    fn shorten(&self, text: &str) -> String {
        let marker = self.text("error.maxlen", "... (message too long, cut)");
        truncate_for_chat(text, self.max_len(), &marker)
    }

    /// Send `text` to the chat room, cut to the configured maximum length.
    pub async fn room(&self, text: &str) -> Result<(), TransportError> {
        self.chat.send_room(&self.shorten(text)).await
    }

    pub async fn direct(&self, address: &str, text: &str) -> Result<(), TransportError> {
        self.chat.send_direct(address, &self.shorten(text)).await
    }

    // ========================================================================
    // Last error bookkeeping
    // ========================================================================

    pub fn record_error(&self, command: &str, error: &CommandError) {
        let message = match error {
            CommandError::Internal {
                message,
                source: Some(source),
                ..
            } => format!("{message}: {source:#}"),
            other => other.to_string(),
        };
        *self.last_error.lock() = Some(LastError {
            command: command.to_string(),
            code: error.error_code(),
            message,
            at: Utc::now(),
        });
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.last_error.lock().clone()
    }

    pub fn take_last_error(&self) -> Option<LastError> {
        self.last_error.lock().take()
    }
}

impl std::fmt::Debug for BotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotState")
            .field("identities", &self.identities)
            .field("settings", &self.settings)
            .field("language", &self.language)
            .field("world", &self.world.is_some())
            .finish()
    }
}

fn positive(value: Option<i64>, default: i64) -> usize {
    value.filter(|v| *v > 0).unwrap_or(default) as usize
}

/// Replace each `{}` in `template` with the next argument.
pub fn fill(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(at) = rest.find("{}") {
        out.push_str(&rest[..at]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("{}"),
        }
        rest = &rest[at + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_replaces_in_order() {
        assert_eq!(fill("{} joined ({})", &["Steve", "steve_x"]), "Steve joined (steve_x)");
        assert_eq!(fill("{} and {}", &["one"]), "one and {}");
        assert_eq!(fill("no holes", &["x"]), "no holes");
    }

    #[test]
    fn positive_falls_back() {
        assert_eq!(positive(Some(0), 16), 16);
        assert_eq!(positive(Some(-3), 16), 16);
        assert_eq!(positive(None, 16), 16);
        assert_eq!(positive(Some(4), 16), 4);
    }
}
