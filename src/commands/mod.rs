//! Chat commands.
//!
//! A command is matched against the text addressed to the bot, authorized
//! by the issuer's level and executed with a [`CommandContext`]. The
//! [`CommandDispatcher`] turns every outcome into a [`CommandResponse`].

mod context;
mod core;
mod dispatch;
mod game;
mod registry;
mod user;
mod world;

pub use context::CommandContext;
pub use dispatch::CommandDispatcher;
pub use registry::{CommandRegistry, CommandStats, RegisteredCommand};

use crate::error::CommandResult;
use crate::identity::{Identity, Level, Namespace};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

/// Where a command was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Game,
    GroupChat,
    DirectMessage,
}

impl Source {
    /// Namespace the issuer name is resolved in.
    pub fn namespace(self) -> Namespace {
        match self {
            Self::Game => Namespace::GameName,
            Self::GroupChat => Namespace::Nickname,
            Self::DirectMessage => Namespace::Address,
        }
    }

    pub fn is_game(self) -> bool {
        matches!(self, Self::Game)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::GroupChat => "group",
            Self::DirectMessage => "direct",
        }
    }
}

/// Result of a successful match, handed to the handler of that one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub text: String,
    groups: Vec<Option<String>>,
}

impl Invocation {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            groups: Vec::new(),
        }
    }

    /// Capture group `index` of a pattern match (1-based).
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index.checked_sub(1)?)?.as_deref()
    }

    /// Whitespace-separated words after the command word.
    pub fn args(&self) -> Vec<&str> {
        self.text.split_whitespace().skip(1).collect()
    }

    /// Everything after the first space, or `""`.
    pub fn rest(&self) -> &str {
        self.text.split_once(' ').map(|(_, rest)| rest).unwrap_or("")
    }
}

/// How a command recognizes its input.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Case-insensitive leading word. A prefix ending in a letter or digit
    /// must be followed by whitespace or the end of input.
    Prefix(String),
    /// Any of several prefixes, same rules as `Prefix`.
    AnyPrefix(Vec<String>),
    /// Whole-input, case-insensitive regular expression.
    Pattern(Regex),
}

impl Matcher {
    pub fn prefix(prefix: &str) -> Self {
        Self::Prefix(prefix.to_lowercase())
    }

    pub fn any_prefix(prefixes: &[&str]) -> Self {
        Self::AnyPrefix(prefixes.iter().map(|p| p.to_lowercase()).collect())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()
            .map(Self::Pattern)
    }

    pub fn matches(&self, input: &str) -> Option<Invocation> {
        match self {
            Self::Prefix(prefix) => prefix_matches(prefix, input).then(|| Invocation::plain(input)),
            Self::AnyPrefix(prefixes) => prefixes
                .iter()
                .any(|prefix| prefix_matches(prefix, input))
                .then(|| Invocation::plain(input)),
            Self::Pattern(regex) => regex.captures(input).map(|caps| Invocation {
                text: input.to_string(),
                groups: caps
                    .iter()
                    .skip(1)
                    .map(|group| group.map(|m| m.as_str().to_string()))
                    .collect(),
            }),
        }
    }
}

fn prefix_matches(prefix: &str, input: &str) -> bool {
    let lowered = input.to_lowercase();
    let Some(rest) = lowered.strip_prefix(prefix) else {
        return false;
    };
    let open_ended = prefix
        .chars()
        .last()
        .is_none_or(|c| !c.is_alphanumeric());
    open_ended || rest.is_empty() || rest.starts_with(char::is_whitespace)
}

/// Static description of a command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub category: &'static str,
    pub level: Level,
    pub syntax: &'static str,
    pub help: Option<&'static str>,
    pub matcher: Matcher,
}

impl CommandSpec {
    pub fn new(
        category: &'static str,
        name: &'static str,
        level: Level,
        syntax: &'static str,
        matcher: Matcher,
    ) -> Self {
        Self {
            name,
            category,
            level,
            syntax,
            help: None,
            matcher,
        }
    }

    pub fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    /// `Category.name`, unique across the registry.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.category, self.name)
    }
}

/// A chat command.
#[async_trait]
pub trait Command: Send + Sync {
    fn spec(&self) -> &CommandSpec;

    async fn execute(&self, ctx: &CommandContext<'_>, invocation: &Invocation) -> CommandResult;
}

/// What a dispatch produced and how it is routed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub text: Option<String>,
    /// Private recipient; `None` replies publicly.
    pub target: Option<Identity>,
    /// Whether the triggering message is still mirrored.
    pub resume_transmission: bool,
    /// Whether a public reply also goes to the other transport.
    pub echo_both_sides: bool,
}

impl CommandResponse {
    /// No reply, and the triggering message is not mirrored.
    pub fn empty() -> Self {
        Self {
            text: None,
            target: None,
            resume_transmission: false,
            echo_both_sides: false,
        }
    }

    /// Public reply on both transports; the triggering message keeps being
    /// mirrored.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            target: None,
            resume_transmission: true,
            echo_both_sides: true,
        }
    }

    /// Private reply to `target`; the triggering message is not mirrored.
    pub fn private(text: impl Into<String>, target: Identity) -> Self {
        Self {
            text: Some(text.into()),
            target: Some(target),
            resume_transmission: false,
            echo_both_sides: true,
        }
    }

    /// Public reply on the originating transport only.
    pub fn local(text: impl Into<String>) -> Self {
        Self {
            echo_both_sides: false,
            ..Self::text(text)
        }
    }
}

/// Every built-in command, in registration order. World commands are only
/// included when world data is available.
pub fn builtin_commands(with_world: bool) -> Result<Vec<Box<dyn Command>>, regex::Error> {
    let mut commands = core::commands()?;
    commands.extend(user::commands()?);
    commands.extend(game::commands());
    if with_world {
        commands.extend(world::commands());
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_requires_word_boundary() {
        let m = Matcher::prefix("set");
        assert!(m.matches("set chatbot.maxlen 500").is_some());
        assert!(m.matches("SET x 1").is_some());
        assert!(m.matches("set").is_some());
        assert!(m.matches("settle down").is_none());

        let m = Matcher::prefix("$");
        assert!(m.matches("$list").is_some());
        let m = Matcher::prefix("save ");
        assert!(m.matches("save all").is_some());
        assert!(m.matches("save").is_none());
    }

    #[test]
    fn pattern_exposes_groups() {
        let m = Matcher::pattern(r"(\S+) is (\S+)").unwrap();
        let inv = m.matches("Steve IS steve_x").unwrap();
        assert_eq!(inv.group(1), Some("Steve"));
        assert_eq!(inv.group(2), Some("steve_x"));
        assert_eq!(inv.group(0), None);
        assert_eq!(inv.group(3), None);
        assert!(m.matches("Steve is").is_none());
    }

    #[test]
    fn pattern_is_anchored() {
        let m = Matcher::pattern(r"ping|\?|\s*").unwrap();
        assert!(m.matches("ping").is_some());
        assert!(m.matches("").is_some());
        assert!(m.matches("?").is_some());
        assert!(m.matches("ping me").is_none());
    }

    #[test]
    fn invocation_args() {
        let inv = Invocation::plain("set chatbot.maxlen  500");
        assert_eq!(inv.args(), vec!["chatbot.maxlen", "500"]);
        assert_eq!(inv.rest(), "chatbot.maxlen  500");
    }

    #[test]
    fn response_constructors() {
        let r = CommandResponse::text("hi");
        assert!(r.resume_transmission && r.echo_both_sides);
        let r = CommandResponse::local("hi");
        assert!(!r.echo_both_sides);
        let r = CommandResponse::empty();
        assert!(r.text.is_none());
        assert!(!r.resume_transmission && !r.echo_both_sides);
    }
}
