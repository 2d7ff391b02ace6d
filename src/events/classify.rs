//! Console line classification.

use super::GameEvent;
use regex::Regex;
use std::sync::OnceLock;
use tracing::error;

const LOG_PREFIX: &str = r"\[.*\] \[.*/INFO\]: ";

struct Patterns {
    chat: Regex,
    join_leave: Regex,
    achievement: Regex,
    death: Regex,
    stopping: Regex,
    log: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| match build_patterns() {
            Ok(patterns) => Some(patterns),
            Err(e) => {
                error!(error = %e, "Invalid built-in log pattern, console lines are ignored");
                None
            }
        })
        .as_ref()
}

fn build_patterns() -> Result<Patterns, regex::Error> {
    let build = |body: &str| Regex::new(&format!("^{LOG_PREFIX}{body}$"));
    Ok(Patterns {
        chat: build("<(.+)> (.+)")?,
        join_leave: build("([^ ]+) (joined|left) the game")?,
        achievement: build(r"([^ ]+) has just earned the achievement \[(.+)\]")?,
        death: build(
            "([^ ]+) ((?:was|walked|drowned|blew|hit|fell|went|burned|got|tried|died|starved|suffocated|withered).+)",
        )?,
        stopping: build("Stopping the server")?,
        log: build("(.*)")?,
    })
}

/// Classify one console line.
///
/// Specific shapes are tried first, in order: chat, join/leave, achievement,
/// death, server stop. Any other log-shaped line becomes [`GameEvent::RawLog`]
/// carrying the text after the log prefix. Lines without the log prefix
/// yield `None`.
pub fn classify(line: &str) -> Option<GameEvent> {
    let p = patterns()?;

    if let Some(caps) = p.chat.captures(line) {
        return Some(GameEvent::ChatMessage {
            actor: caps[1].to_string(),
            text: caps[2].to_string(),
        });
    }
    if let Some(caps) = p.join_leave.captures(line) {
        let actor = caps[1].to_string();
        return Some(if &caps[2] == "joined" {
            GameEvent::PlayerJoined { actor }
        } else {
            GameEvent::PlayerLeft { actor }
        });
    }
    if let Some(caps) = p.achievement.captures(line) {
        return Some(GameEvent::Achievement {
            actor: caps[1].to_string(),
            label: caps[2].to_string(),
        });
    }
    if let Some(caps) = p.death.captures(line) {
        return Some(GameEvent::Death {
            actor: caps[1].to_string(),
            text: caps[2].to_string(),
        });
    }
    if p.stopping.is_match(line) {
        return Some(GameEvent::ServerStopping);
    }
    p.log.captures(line).map(|caps| GameEvent::RawLog {
        text: caps[1].to_string(),
    })
}
