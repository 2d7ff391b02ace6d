//! The bridge between the game console and the chat network.
//!
//! [`ChatBridge`] is the glue: it listens to classified game events and to
//! chat input, decides whether a message is a command, dispatches it and
//! hands the outcome to the [`MirrorRouter`].

pub mod format;
mod mirror;

pub use mirror::{Delivery, MirrorRouter, Origin};

use crate::bot::keys;
use crate::commands::{CommandDispatcher, Source};
use crate::events::{EventListener, GameEvent};
use crate::transport::ChatInbound;
use async_trait::async_trait;
use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

/// A direct-message lane closes after this long without input.
const LANE_IDLE: Duration = Duration::from_secs(300);

type Lanes = Arc<DashMap<String, mpsc::UnboundedSender<String>>>;

/// A mirroring direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    GameToChat,
    ChatToGame,
}

impl Direction {
    /// Runtime settings key holding the on/off switch.
    pub fn settings_key(self) -> &'static str {
        match self {
            Self::GameToChat => keys::MIRROR_GAME_TO_CHAT,
            Self::ChatToGame => keys::MIRROR_CHAT_TO_GAME,
        }
    }

    /// Metrics label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GameToChat => "game_to_chat",
            Self::ChatToGame => "chat_to_game",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::GameToChat => "Game to chat",
            Self::ChatToGame => "Chat to game",
        }
    }
}

/// Routes game events and chat input through the dispatcher and the
/// mirroring policy.
#[derive(Clone)]
pub struct ChatBridge {
    dispatcher: CommandDispatcher,
    router: MirrorRouter,
    nickname: String,
    command_pattern: Regex,
    uuid_pattern: Regex,
}

impl ChatBridge {
    /// `nickname` is the bot's own chat nickname; text addressed to it is a
    /// command.
    pub fn new(dispatcher: CommandDispatcher, nickname: &str) -> Result<Self, regex::Error> {
        let command_pattern =
            RegexBuilder::new(&format!(r"^{}(?:[,: ] ?)?(.+)$", regex::escape(nickname)))
                .case_insensitive(true)
                .build()?;
        let router = MirrorRouter::new(Arc::clone(dispatcher.state()));
        Ok(Self {
            dispatcher,
            router,
            nickname: nickname.to_string(),
            command_pattern,
            uuid_pattern: Regex::new(r"^UUID of player ([^ ]+) is (.+)$")?,
        })
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn router(&self) -> &MirrorRouter {
        &self.router
    }

    /// The command addressed to the bot in `text`, if any.
    pub fn command_in<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.command_pattern
            .captures(text.trim())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
    }

    /// Handle one message typed in game chat.
    pub async fn on_game_chat(&self, player: &str, text: &str) {
        self.handle(Origin::new(Source::Game, player), text).await;
    }

    /// Handle one message posted in the chat room.
    pub async fn on_group_message(&self, nickname: &str, text: &str) {
        if nickname.eq_ignore_ascii_case(&self.nickname) {
            return;
        }
        self.handle(Origin::new(Source::GroupChat, nickname), text)
            .await;
    }

    /// Handle one direct message. Every direct message is a command; the
    /// bot's name in front of it is optional.
    pub async fn on_direct_message(&self, address: &str, text: &str) {
        let command = self.command_in(text).unwrap_or(text.trim());
        let origin = Origin::new(Source::DirectMessage, address);
        let response = self
            .dispatcher
            .dispatch(command, address, Source::DirectMessage)
            .await;
        let deliveries = self.router.outcome(origin, text, &response);
        self.router.deliver(deliveries).await;
    }

    /// Serve chat input until the gateway drops its sender.
    ///
    /// Group messages are handled in order on one lane. Each direct-message
    /// sender gets a lane of its own, so a slow command only holds up the
    /// conversation it came from.
    pub fn serve_chat(&self, mut inbound: mpsc::UnboundedReceiver<ChatInbound>) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            let (group_tx, group_rx) = mpsc::unbounded_channel();
            let group = tokio::spawn(bridge.clone().group_lane(group_rx));
            let lanes: Lanes = Arc::new(DashMap::new());

            while let Some(message) = inbound.recv().await {
                match message {
                    ChatInbound::Group { nickname, text } => {
                        if group_tx.send((nickname, text)).is_err() {
                            error!("Group chat lane ended");
                            break;
                        }
                    }
                    ChatInbound::Direct { address, text } => {
                        bridge.route_direct(&lanes, address, text)
                    }
                }
            }

            drop(group_tx);
            if let Err(e) = group.await {
                error!(error = %e, "Group chat lane ended abnormally");
            }
            debug!("Chat input closed");
        })
    }

    async fn group_lane(self, mut rx: mpsc::UnboundedReceiver<(String, String)>) {
        while let Some((nickname, text)) = rx.recv().await {
            self.on_group_message(&nickname, &text).await;
        }
    }

    fn route_direct(&self, lanes: &Lanes, address: String, text: String) {
        let key = address.to_lowercase();
        let text = match lanes.get(&key) {
            Some(lane) => match lane.send(text) {
                Ok(()) => return,
                Err(closed) => closed.0,
            },
            None => text,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(text).is_err() {
            return;
        }
        lanes.insert(key.clone(), tx);
        let span = tracing::debug_span!("direct_lane", %address);
        tokio::spawn(
            self.clone()
                .direct_lane(Arc::clone(lanes), key, address, rx)
                .instrument(span),
        );
    }

    async fn direct_lane(
        self,
        lanes: Lanes,
        key: String,
        address: String,
        mut rx: mpsc::UnboundedReceiver<String>,
    ) {
        loop {
            match tokio::time::timeout(LANE_IDLE, rx.recv()).await {
                Ok(Some(text)) => self.on_direct_message(&address, &text).await,
                Ok(None) => break,
                Err(_) => {
                    // Closing first makes the router open a fresh lane for new input.
                    rx.close();
                    lanes.remove_if(&key, |_, lane| lane.is_closed());
                    while let Ok(text) = rx.try_recv() {
                        self.on_direct_message(&address, &text).await;
                    }
                    break;
                }
            }
        }
        debug!("Direct message lane closed");
    }

    async fn handle(&self, origin: Origin<'_>, text: &str) {
        let deliveries = match self.command_in(text) {
            Some(command) => {
                let response = self
                    .dispatcher
                    .dispatch(command, origin.sender, origin.source)
                    .await;
                self.router.outcome(origin, text, &response)
            }
            None => self.router.plain(origin, text),
        };
        self.router.deliver(deliveries).await;
    }

    async fn on_raw_log(&self, text: &str) {
        let state = self.dispatcher.state();
        if let Some(caps) = self.uuid_pattern.captures(text) {
            let (Some(player), Some(uuid)) = (caps.get(1), caps.get(2)) else {
                return;
            };
            if let Err(e) = state
                .identities
                .register_from_game(player.as_str(), Some(uuid.as_str().trim()))
            {
                warn!(player = player.as_str(), error = %e, "Auto-registration failed");
            }
        } else if text.starts_with("Done") {
            let notice = state.text("general.started", "And we're online.");
            if let Err(e) = state.room(&notice).await {
                warn!(error = %e, "Failed to announce start-up");
            }
        }
    }

    async fn on_stopping(&self) {
        let state = self.dispatcher.state();
        info!("Game server is stopping");
        let notice = state.text("general.leaving", "Server going down.");
        if let Err(e) = state.room(&notice).await {
            warn!(error = %e, "Failed to announce shutdown");
        }
        if let Err(e) = state.save_all() {
            error!(error = %e, "Failed to save on server stop");
        }
    }
}

#[async_trait]
impl EventListener for ChatBridge {
    async fn on_event(&self, event: &GameEvent) {
        match event {
            GameEvent::ChatMessage { actor, text } => {
                if self.command_in(text).is_some() {
                    // A command may wait on console output the worker has yet to classify.
                    let bridge = self.clone();
                    let (actor, text) = (actor.clone(), text.clone());
                    let span = tracing::debug_span!("game_command", player = %actor);
                    tokio::spawn(
                        async move { bridge.on_game_chat(&actor, &text).await }.instrument(span),
                    );
                } else {
                    self.on_game_chat(actor, text).await;
                }
            }
            GameEvent::RawLog { text } => self.on_raw_log(text).await,
            GameEvent::ServerStopping => self.on_stopping().await,
            other => {
                let deliveries = self.router.event(other);
                if deliveries.is_empty() {
                    debug!(kind = other.kind(), "Event not mirrored");
                }
                self.router.deliver(deliveries).await;
            }
        }
    }
}

impl std::fmt::Debug for ChatBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatBridge")
            .field("nickname", &self.nickname)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_keys_are_distinct() {
        assert_ne!(
            Direction::GameToChat.settings_key(),
            Direction::ChatToGame.settings_key()
        );
        assert_eq!(Direction::GameToChat.as_str(), "game_to_chat");
    }
}
