//! Game server child process.

use super::GameConsole;
use crate::error::TransportError;
use crate::events::{LogEventPipeline, stopped};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type ConsoleInput = Box<dyn AsyncWrite + Send + Unpin>;

/// Console input of the game server: one line per command.
pub struct ChildConsole {
    input: Mutex<Option<ConsoleInput>>,
}

impl ChildConsole {
    /// Console writing into any byte sink.
    pub fn from_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            input: Mutex::new(Some(Box::new(writer))),
        }
    }

    /// Start the game server from `argv` and feed its output to `pipeline`.
    ///
    /// Returns the console and the child process; the caller owns the
    /// child's lifetime.
    pub fn spawn(
        argv: &[String],
        working_dir: Option<&Path>,
        pipeline: &Arc<LogEventPipeline>,
        echo: bool,
    ) -> Result<(Arc<Self>, Child), TransportError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(TransportError::NotConnected("empty game command".into()));
        };
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::NotConnected("game stdin not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::NotConnected("game stdout not piped".into()))?;

        pipeline.spawn_reader(stdout, echo);
        info!(program = %program, pid = ?child.id(), "Game server started");
        Ok((Arc::new(Self::from_writer(stdin)), child))
    }

    /// Copy operator stdin into the console until EOF or shutdown.
    pub fn forward_stdin(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let console = Arc::clone(self);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                let line = tokio::select! {
                    line = lines.next_line() => line,
                    _ = stopped(&mut shutdown) => break,
                };
                match line {
                    Ok(Some(line)) => {
                        if let Err(e) = console.send_line(&line).await {
                            warn!(error = %e, "Failed to forward operator input");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Operator stdin failed");
                        break;
                    }
                }
            }
            debug!("Operator input forwarding stopped");
        })
    }

    /// Close the console input. Later sends fail with `Closed`.
    pub async fn close(&self) {
        if let Some(mut input) = self.input.lock().await.take()
            && let Err(e) = input.shutdown().await
        {
            debug!(error = %e, "Closing console input failed");
        }
    }
}

#[async_trait]
impl GameConsole for ChildConsole {
    async fn send_line(&self, line: &str) -> Result<(), TransportError> {
        let mut guard = self.input.lock().await;
        let input = guard.as_mut().ok_or(TransportError::Closed)?;
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.trim_end_matches(['\r', '\n']).as_bytes());
        bytes.push(b'\n');
        input.write_all(&bytes).await?;
        input.flush().await?;
        Ok(())
    }
}

impl std::fmt::Debug for ChildConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildConsole").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn writes_one_line_per_command() {
        let (writer, mut reader) = tokio::io::duplex(256);
        let console = ChildConsole::from_writer(writer);
        console.send_line("say hi").await.unwrap();
        console.send_line("list\n").await.unwrap();
        console.close().await;

        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "say hi\nlist\n");
    }

    #[tokio::test]
    async fn closed_console_refuses_lines() {
        let (writer, _reader) = tokio::io::duplex(16);
        let console = ChildConsole::from_writer(writer);
        console.close().await;
        assert!(matches!(
            console.send_line("stop").await,
            Err(TransportError::Closed)
        ));
    }
}
