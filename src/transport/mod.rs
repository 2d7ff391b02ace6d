//! Outbound sinks of the two bridged transports.
//!
//! The core only sees these traits; [`ChildConsole`] and [`ChatGateway`] are
//! the implementations shipped with the binary.

mod console;
mod gateway;

pub use console::ChildConsole;
pub use gateway::{ChatGateway, ChatInbound};

use crate::error::TransportError;
use async_trait::async_trait;

/// Game console input.
#[async_trait]
pub trait GameConsole: Send + Sync {
    /// Run one console command (no trailing newline).
    async fn send_line(&self, line: &str) -> Result<(), TransportError>;
}

/// Availability of a chat address in the live roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Not in the roster.
    Unknown,
    Available,
    Unavailable,
}

/// Group/direct chat network output plus roster queries.
#[async_trait]
pub trait ChatNetwork: Send + Sync {
    /// Broadcast to the shared room.
    async fn send_room(&self, text: &str) -> Result<(), TransportError>;

    /// Deliver privately to `address`.
    async fn send_direct(&self, address: &str, text: &str) -> Result<(), TransportError>;

    fn presence(&self, address: &str) -> Presence;
}
