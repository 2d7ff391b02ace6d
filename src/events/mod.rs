//! Game console events.
//!
//! Raw console lines are turned into [`GameEvent`]s by [`classify`] and fanned
//! out to [`EventListener`]s by the [`LogEventPipeline`].

mod classify;
mod pipeline;

pub use classify::classify;
pub use pipeline::{CaptureTicket, ListenerId, LogEventPipeline, stopped};

use async_trait::async_trait;
use tracing::{debug, info, trace};

/// One classified console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    PlayerJoined { actor: String },
    PlayerLeft { actor: String },
    ChatMessage { actor: String, text: String },
    Achievement { actor: String, label: String },
    Death { actor: String, text: String },
    ServerStopping,
    /// A log line no specific shape matched; `text` excludes the log prefix.
    RawLog { text: String },
}

impl GameEvent {
    /// Static kind name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayerJoined { .. } => "join",
            Self::PlayerLeft { .. } => "leave",
            Self::ChatMessage { .. } => "chat",
            Self::Achievement { .. } => "achievement",
            Self::Death { .. } => "death",
            Self::ServerStopping => "stopping",
            Self::RawLog { .. } => "log",
        }
    }

    pub fn actor(&self) -> Option<&str> {
        match self {
            Self::PlayerJoined { actor }
            | Self::PlayerLeft { actor }
            | Self::ChatMessage { actor, .. }
            | Self::Achievement { actor, .. }
            | Self::Death { actor, .. } => Some(actor),
            Self::ServerStopping | Self::RawLog { .. } => None,
        }
    }
}

/// Receives every classified event, in submission order.
///
/// Listeners run one after the other on the pipeline worker. A listener
/// that needs to wait for further console output must hand its work to a
/// separate task, or the worker cannot classify that output.
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &GameEvent);
}

/// Writes every event to the log.
#[derive(Debug, Default)]
pub struct LoggingListener;

#[async_trait]
impl EventListener for LoggingListener {
    async fn on_event(&self, event: &GameEvent) {
        match event {
            GameEvent::PlayerJoined { actor } => info!(player = %actor, "Player joined"),
            GameEvent::PlayerLeft { actor } => info!(player = %actor, "Player left"),
            GameEvent::ChatMessage { actor, text } => debug!(player = %actor, %text, "Game chat"),
            GameEvent::Achievement { actor, label } => {
                info!(player = %actor, achievement = %label, "Achievement earned")
            }
            GameEvent::Death { actor, text } => info!(player = %actor, cause = %text, "Player died"),
            GameEvent::ServerStopping => info!("Game server stopping"),
            GameEvent::RawLog { text } => {
                if text.starts_with("UUID of player ") {
                    info!(%text, "Player identified");
                } else {
                    trace!(%text, "Game log");
                }
            }
        }
    }
}
