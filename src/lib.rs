//! craftrelay - a relay bot between a game server console and a group chat.
//!
//! Console output is classified into [`events::GameEvent`]s, chat input
//! addressed to the bot is dispatched as [`commands`], and the
//! [`bridge`] mirrors ordinary chatter between both sides.

pub mod bot;
pub mod bridge;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod identity;
pub mod metrics;
pub mod store;
pub mod telemetry;
pub mod transport;
pub mod world;
