//! Telemetry utilities for command timing and tracing spans.

use std::time::Instant;

/// Guard for timing command execution and recording metrics.
///
/// Records command latency when dropped.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(&self.command, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for one command execution.
    pub fn command(name: &str, source: &str, issuer: &str) -> Span {
        info_span!("command", name = %name, source = %source, issuer = %issuer)
    }

    /// Span for one chat gateway connection.
    pub fn chat_session(peer: &str) -> Span {
        info_span!("chat_session", peer = %peer)
    }
}
