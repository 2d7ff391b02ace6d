//! Integration test common infrastructure.
//!
//! Provides recording fakes for both transports and a harness wiring a
//! complete bot over in-memory stores.

pub mod fakes;
pub mod harness;

#[allow(unused_imports)]
pub use fakes::{RecordingChat, RecordingConsole, log_line};
#[allow(unused_imports)]
pub use harness::{BOT_NICK, Harness, eventually};
