//! Recording transports.

use async_trait::async_trait;
use craftrelay::error::TransportError;
use craftrelay::events::LogEventPipeline;
use craftrelay::transport::{ChatNetwork, GameConsole, Presence};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// A console line the way the game server prints it.
pub fn log_line(text: &str) -> String {
    format!("[12:00:00] [Server thread/INFO]: {text}")
}

/// Records console commands. Scripted commands print their output into
/// the attached pipeline.
#[derive(Default)]
pub struct RecordingConsole {
    lines: Mutex<Vec<String>>,
    scripts: Mutex<HashMap<String, Vec<String>>>,
    pipeline: Mutex<Weak<LogEventPipeline>>,
}

#[allow(dead_code)]
impl RecordingConsole {
    pub fn attach(&self, pipeline: &Arc<LogEventPipeline>) {
        *self.pipeline.lock() = Arc::downgrade(pipeline);
    }

    /// Print `output` as log lines whenever `command` is sent.
    pub fn script(&self, command: &str, output: &[&str]) {
        self.scripts.lock().insert(
            command.to_string(),
            output.iter().map(|line| log_line(line)).collect(),
        );
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

#[async_trait]
impl GameConsole for RecordingConsole {
    async fn send_line(&self, line: &str) -> Result<(), TransportError> {
        self.lines.lock().push(line.to_string());
        let output = self.scripts.lock().get(line).cloned();
        let pipeline = self.pipeline.lock().upgrade();
        if let (Some(output), Some(pipeline)) = (output, pipeline) {
            for line in output {
                pipeline.submit(line);
            }
        }
        Ok(())
    }
}

/// Records chat output and answers presence queries from a table.
#[derive(Default)]
pub struct RecordingChat {
    room: Mutex<Vec<String>>,
    direct: Mutex<Vec<(String, String)>>,
    presence: Mutex<HashMap<String, Presence>>,
}

#[allow(dead_code)]
impl RecordingChat {
    pub fn set_presence(&self, address: &str, presence: Presence) {
        self.presence
            .lock()
            .insert(address.to_lowercase(), presence);
    }

    pub fn room(&self) -> Vec<String> {
        self.room.lock().clone()
    }

    pub fn direct(&self) -> Vec<(String, String)> {
        self.direct.lock().clone()
    }

    pub fn clear(&self) {
        self.room.lock().clear();
        self.direct.lock().clear();
    }
}

#[async_trait]
impl ChatNetwork for RecordingChat {
    async fn send_room(&self, text: &str) -> Result<(), TransportError> {
        self.room.lock().push(text.to_string());
        Ok(())
    }

    async fn send_direct(&self, address: &str, text: &str) -> Result<(), TransportError> {
        self.direct
            .lock()
            .push((address.to_string(), text.to_string()));
        Ok(())
    }

    fn presence(&self, address: &str) -> Presence {
        self.presence
            .lock()
            .get(&address.to_lowercase())
            .copied()
            .unwrap_or(Presence::Unknown)
    }
}
