//! Mirroring policy.
//!
//! [`MirrorRouter`] decides what is replayed where. It only produces
//! [`Delivery`] values; [`MirrorRouter::deliver`] sends them.

use super::Direction;
use super::format::labelled;
use crate::bot::BotState;
use crate::commands::{CommandResponse, Source};
use crate::events::GameEvent;
use crate::identity::Namespace;
use std::sync::Arc;
use tracing::{debug, warn};

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    ChatRoom(String),
    ChatDirect { address: String, text: String },
    GameSay(String),
    GameTell { player: String, text: String },
}

/// Where a message came from: the transport and the sender's raw name
/// (game name, nickname or address).
#[derive(Debug, Clone, Copy)]
pub struct Origin<'a> {
    pub source: Source,
    pub sender: &'a str,
}

impl<'a> Origin<'a> {
    pub fn new(source: Source, sender: &'a str) -> Self {
        Self { source, sender }
    }

    /// Mirroring direction of messages from this origin. Direct messages
    /// are never mirrored.
    fn direction(self) -> Option<Direction> {
        match self.source {
            Source::Game => Some(Direction::GameToChat),
            Source::GroupChat => Some(Direction::ChatToGame),
            Source::DirectMessage => None,
        }
    }
}

#[derive(Clone)]
pub struct MirrorRouter {
    state: Arc<BotState>,
}

impl MirrorRouter {
    pub fn new(state: Arc<BotState>) -> Self {
        Self { state }
    }

    /// A message that matched no command.
    pub fn plain(&self, origin: Origin<'_>, text: &str) -> Vec<Delivery> {
        let mut out = Vec::new();
        self.forward(origin, text, &mut out);
        out
    }

    /// The outcome of dispatching `text`.
    pub fn outcome(
        &self,
        origin: Origin<'_>,
        text: &str,
        response: &CommandResponse,
    ) -> Vec<Delivery> {
        let mut out = Vec::new();
        if response.resume_transmission {
            self.forward(origin, text, &mut out);
        }
        let Some(reply) = response.text.as_deref() else {
            return out;
        };

        if let Some(target) = &response.target {
            out.push(match origin.source {
                Source::Game => match &target.game_name {
                    Some(player) => Delivery::GameTell {
                        player: player.clone(),
                        text: reply.to_string(),
                    },
                    None => Delivery::GameSay(reply.to_string()),
                },
                Source::GroupChat => match (&target.address, &target.nickname) {
                    (Some(address), _) => Delivery::ChatDirect {
                        address: address.clone(),
                        text: reply.to_string(),
                    },
                    (None, Some(nickname)) => Delivery::ChatRoom(format!("{nickname}: {reply}")),
                    (None, None) => Delivery::ChatRoom(reply.to_string()),
                },
                Source::DirectMessage => Delivery::ChatDirect {
                    address: origin.sender.to_string(),
                    text: reply.to_string(),
                },
            });
            return out;
        }

        let reply = reply.to_string();
        match origin.source {
            Source::Game => {
                out.push(Delivery::GameSay(reply.clone()));
                if response.echo_both_sides {
                    out.push(Delivery::ChatRoom(reply));
                }
            }
            Source::GroupChat => {
                out.push(Delivery::ChatRoom(reply.clone()));
                if response.echo_both_sides {
                    out.push(Delivery::GameSay(reply));
                }
            }
            Source::DirectMessage => out.push(Delivery::ChatDirect {
                address: origin.sender.to_string(),
                text: reply,
            }),
        }
        out
    }

    /// Game events announced in the chat room.
    pub fn event(&self, event: &GameEvent) -> Vec<Delivery> {
        if !self.state.mirror_enabled(Direction::GameToChat) {
            return Vec::new();
        }
        let state = &self.state;
        let text = match event {
            GameEvent::PlayerJoined { actor } => {
                state.text_with("game.joined", "{} joined.", &[&self.presence_label(actor)])
            }
            GameEvent::PlayerLeft { actor } => {
                state.text_with("game.left", "{} left.", &[&self.presence_label(actor)])
            }
            GameEvent::Achievement { actor, label } => state.text_with(
                "game.achievement",
                "{} just achieved [{}].",
                &[&self.chat_label(actor), label],
            ),
            GameEvent::Death { actor, text } => {
                state.text_with("game.death", "{} {}.", &[actor, text])
            }
            _ => return Vec::new(),
        };
        crate::metrics::record_mirrored(Direction::GameToChat.as_str());
        vec![Delivery::ChatRoom(text)]
    }

    /// Send `deliveries` in order. Failures are logged and skipped.
    pub async fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            debug!(?delivery, "Delivering");
            let result = match &delivery {
                Delivery::ChatRoom(text) => self.state.room(text).await,
                Delivery::ChatDirect { address, text } => self.state.direct(address, text).await,
                Delivery::GameSay(text) => self.state.say(text).await,
                Delivery::GameTell { player, text } => self.state.tell(player, text).await,
            };
            if let Err(e) = result {
                warn!(error = %e, ?delivery, "Delivery failed");
            }
        }
    }

    /// Append the labelled copy of `text` if mirroring is on for `origin`.
    fn forward(&self, origin: Origin<'_>, text: &str, out: &mut Vec<Delivery>) {
        let Some(direction) = origin.direction() else {
            return;
        };
        if !self.state.mirror_enabled(direction) {
            return;
        }
        crate::metrics::record_mirrored(direction.as_str());
        out.push(match direction {
            Direction::GameToChat => {
                Delivery::ChatRoom(labelled(&self.chat_label(origin.sender), text))
            }
            Direction::ChatToGame => Delivery::GameSay(labelled(&self.game_label(origin.sender), text)),
        });
    }

    /// Chat-side name of a game player: the linked nickname, else the game name.
    fn chat_label(&self, game_name: &str) -> String {
        self.state
            .identities
            .resolve(game_name, Namespace::GameName)
            .and_then(|identity| identity.nickname)
            .unwrap_or_else(|| game_name.to_string())
    }

    /// Game-side name of a chat user: the linked game name, else the nickname.
    fn game_label(&self, nickname: &str) -> String {
        self.state
            .identities
            .resolve(nickname, Namespace::Nickname)
            .and_then(|identity| identity.game_name)
            .unwrap_or_else(|| nickname.to_string())
    }

    /// `Game (nick)` when linked, else the game name.
    fn presence_label(&self, game_name: &str) -> String {
        match self
            .state
            .identities
            .resolve(game_name, Namespace::GameName)
            .and_then(|identity| identity.nickname)
        {
            Some(nickname) => format!("{game_name} ({nickname})"),
            None => game_name.to_string(),
        }
    }
}

impl std::fmt::Debug for MirrorRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorRouter").finish_non_exhaustive()
    }
}
