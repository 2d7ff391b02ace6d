//! Line-oriented TCP chat gateway.
//!
//! Clients speak a small text protocol, one command per line:
//!
//! ```text
//! HELLO <address> <nickname>   first line of every session
//! SAY <text>                   post in the room
//! MSG <text>                   direct message to the bot
//! AWAY | BACK                  availability
//! QUIT
//! ```
//!
//! The gateway answers with `ROOM <nickname> <text>`, `MSG <text>` and
//! `ERR <text>` lines. Every connected client is in the room.

use super::{ChatNetwork, Presence};
use crate::error::TransportError;
use crate::events::stopped;
use crate::identity::Namespace;
use crate::telemetry::spans;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{Instrument, debug, error, info, warn};

/// Chat input for the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInbound {
    Group { nickname: String, text: String },
    Direct { address: String, text: String },
}

struct Member {
    session: u64,
    nickname: String,
    available: bool,
    outbound: mpsc::UnboundedSender<String>,
}

/// Client line, parsed.
#[derive(Debug, PartialEq, Eq)]
enum ClientLine<'a> {
    Hello { address: &'a str, nickname: &'a str },
    Say(&'a str),
    Msg(&'a str),
    Away,
    Back,
    Quit,
}

impl<'a> ClientLine<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim_end_matches('\r');
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        match verb.to_ascii_uppercase().as_str() {
            "HELLO" => {
                let mut words = rest.split_whitespace();
                let (address, nickname) = (words.next()?, words.next()?);
                words.next().is_none().then_some(Self::Hello { address, nickname })
            }
            "SAY" if !rest.trim().is_empty() => Some(Self::Say(rest)),
            "MSG" if !rest.trim().is_empty() => Some(Self::Msg(rest)),
            "AWAY" => Some(Self::Away),
            "BACK" => Some(Self::Back),
            "QUIT" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Bare, lowercase form of an address, used as roster key.
fn roster_key(address: &str) -> String {
    Namespace::Address.normalize(address).to_lowercase()
}

/// The chat network as seen by the bot: a room of TCP clients.
pub struct ChatGateway {
    nickname: String,
    max_line_len: usize,
    members: DashMap<String, Member>,
    next_session: AtomicU64,
    inbound: mpsc::UnboundedSender<ChatInbound>,
}

impl ChatGateway {
    /// Create the gateway. Chat input arrives on the returned receiver.
    pub fn new(
        nickname: &str,
        max_line_len: usize,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ChatInbound>) {
        let (inbound, rx) = mpsc::unbounded_channel();
        let gateway = Arc::new(Self {
            nickname: nickname.to_string(),
            max_line_len,
            members: DashMap::new(),
            next_session: AtomicU64::new(1),
            inbound,
        });
        (gateway, rx)
    }

    /// Connected members as (address, nickname).
    pub fn roster(&self) -> Vec<(String, String)> {
        self.members
            .iter()
            .map(|entry| (entry.key().clone(), entry.nickname.clone()))
            .collect()
    }

    /// Accept clients until shutdown.
    pub async fn run(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "Chat gateway listening");
        }
        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = stopped(&mut shutdown) => break,
            };
            match accepted {
                Ok((stream, addr)) => {
                    debug!(%addr, "Chat connection accepted");
                    let gateway = Arc::clone(&self);
                    let span = spans::chat_session(&addr.to_string());
                    tokio::spawn(
                        async move {
                            if let Err(e) = gateway.serve(stream, addr).await {
                                warn!(error = %e, "Chat session failed");
                            }
                            debug!("Chat session closed");
                        }
                        .instrument(span),
                    );
                }
                Err(e) => error!(error = %e, "Failed to accept chat connection"),
            }
        }
        info!("Chat gateway stopped");
    }

    async fn serve(&self, stream: TcpStream, addr: SocketAddr) -> Result<(), TransportError> {
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(self.max_line_len));

        let (key, nickname) = match framed.next().await {
            Some(Ok(line)) => match ClientLine::parse(&line) {
                Some(ClientLine::Hello { address, nickname }) => {
                    (roster_key(address), nickname.to_string())
                }
                _ => {
                    send(&mut framed, "ERR expected HELLO <address> <nickname>").await?;
                    return Ok(());
                }
            },
            Some(Err(e)) => return Err(codec_error(e)),
            None => return Ok(()),
        };

        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (outbound, mut rx) = mpsc::unbounded_channel();
        let joined = match self.members.entry(key.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Member {
                    session,
                    nickname: nickname.clone(),
                    available: true,
                    outbound,
                });
                true
            }
        };
        if !joined {
            send(&mut framed, "ERR address already connected").await?;
            return Ok(());
        }
        info!(%addr, address = %key, %nickname, "Chat client joined");

        let result = loop {
            tokio::select! {
                line = rx.recv() => match line {
                    Some(line) => {
                        if let Err(e) = send(&mut framed, &line).await {
                            break Err(e);
                        }
                    }
                    None => break Ok(()),
                },
                line = framed.next() => match line {
                    Some(Ok(line)) => {
                        if !self.handle_line(&key, &nickname, &line) {
                            break Ok(());
                        }
                    }
                    Some(Err(e)) => break Err(codec_error(e)),
                    None => break Ok(()),
                },
            }
        };

        self.members
            .remove_if(&key, |_, member| member.session == session);
        info!(address = %key, %nickname, "Chat client left");
        result
    }

    /// Returns false when the client quits.
    fn handle_line(&self, key: &str, nickname: &str, line: &str) -> bool {
        match ClientLine::parse(line) {
            Some(ClientLine::Say(text)) => {
                self.broadcast(&format!("ROOM {nickname} {text}"), Some(key));
                self.emit(ChatInbound::Group {
                    nickname: nickname.to_string(),
                    text: text.to_string(),
                });
            }
            Some(ClientLine::Msg(text)) => self.emit(ChatInbound::Direct {
                address: key.to_string(),
                text: text.to_string(),
            }),
            Some(ClientLine::Away) => self.set_available(key, false),
            Some(ClientLine::Back) => self.set_available(key, true),
            Some(ClientLine::Quit) => return false,
            Some(ClientLine::Hello { .. }) => self.reply(key, "ERR already greeted"),
            None => self.reply(key, "ERR unknown command"),
        }
        true
    }

    fn emit(&self, inbound: ChatInbound) {
        if self.inbound.send(inbound).is_err() {
            debug!("Chat input receiver gone");
        }
    }

    fn reply(&self, key: &str, line: &str) {
        if let Some(member) = self.members.get(key) {
            let _ = member.outbound.send(line.to_string());
        }
    }

    fn set_available(&self, key: &str, available: bool) {
        if let Some(mut member) = self.members.get_mut(key) {
            member.available = available;
            debug!(address = %key, available, "Presence changed");
        }
    }

    /// Send `line` to every member except `skip`.
    fn broadcast(&self, line: &str, skip: Option<&str>) {
        for member in self.members.iter() {
            if skip == Some(member.key().as_str()) {
                continue;
            }
            let _ = member.outbound.send(line.to_string());
        }
    }
}

async fn send(framed: &mut Framed<TcpStream, LinesCodec>, line: &str) -> Result<(), TransportError> {
    framed.send(line).await.map_err(codec_error)
}

fn codec_error(err: tokio_util::codec::LinesCodecError) -> TransportError {
    match err {
        tokio_util::codec::LinesCodecError::Io(e) => TransportError::Io(e),
        other => TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, other)),
    }
}

#[async_trait]
impl ChatNetwork for ChatGateway {
    async fn send_room(&self, text: &str) -> Result<(), TransportError> {
        for line in text.lines().filter(|line| !line.is_empty()) {
            self.broadcast(&format!("ROOM {} {line}", self.nickname), None);
        }
        Ok(())
    }

    async fn send_direct(&self, address: &str, text: &str) -> Result<(), TransportError> {
        let key = roster_key(address);
        let member = self
            .members
            .get(&key)
            .ok_or_else(|| TransportError::NotConnected(key.clone()))?;
        for line in text.lines().filter(|line| !line.is_empty()) {
            member
                .outbound
                .send(format!("MSG {line}"))
                .map_err(|_| TransportError::Closed)?;
        }
        Ok(())
    }

    fn presence(&self, address: &str) -> Presence {
        match self.members.get(&roster_key(address)) {
            Some(member) if member.available => Presence::Available,
            Some(_) => Presence::Unavailable,
            None => Presence::Unknown,
        }
    }
}

impl std::fmt::Debug for ChatGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatGateway")
            .field("nickname", &self.nickname)
            .field("members", &self.members.len())
            .finish()
    }
}
