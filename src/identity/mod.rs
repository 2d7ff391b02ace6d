//! Identities shared by the game and chat sides.
//!
//! One person can be known by a game name, a chat nickname and a chat
//! address at once. The [`IdentityRegistry`] owns every [`Identity`];
//! everything else works on short-lived clones.

mod registry;

pub use registry::IdentityRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Privilege level. Higher is more trusted.
pub type Level = i32;

/// Level of issuers that resolve to no identity.
pub const ANONYMOUS: Level = -1;
/// Lowest registered level, given to auto-registered identities.
pub const USER: Level = 0;
pub const OPERATOR: Level = 3;
pub const ADMIN: Level = 5;

pub const RANK_NAMES: [&str; 6] = ["User", "User+", "User++", "Operator", "Operator+", "Admin"];

/// Display name of a level.
pub fn rank_name(level: Level) -> &'static str {
    if level < USER {
        return "Anon";
    }
    RANK_NAMES
        .get(level as usize)
        .copied()
        .unwrap_or(RANK_NAMES[RANK_NAMES.len() - 1])
}

/// Parse a level given as a single digit or a rank name.
pub fn parse_rank(input: &str) -> Option<Level> {
    let input = input.trim();
    if input.len() == 1 {
        return input
            .parse::<Level>()
            .ok()
            .filter(|l| (USER..=ADMIN).contains(l));
    }
    RANK_NAMES
        .iter()
        .position(|rank| rank.eq_ignore_ascii_case(input))
        .map(|i| i as Level)
}

/// Prefix marking a name as a game name in generic lookups.
pub const GAME_SIGIL: char = '#';
/// Prefix marking a name as a chat nickname in generic lookups.
pub const NICK_SIGIL: char = '§';

/// Namespace a name is resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    GameName,
    Nickname,
    Address,
}

impl Namespace {
    /// Normalize `name` for this namespace: strip the namespace sigil, or
    /// the `/resource` part of an address.
    pub fn normalize(self, name: &str) -> &str {
        let name = name.trim();
        match self {
            Self::GameName => name.strip_prefix(GAME_SIGIL).unwrap_or(name),
            Self::Nickname => name.strip_prefix(NICK_SIGIL).unwrap_or(name),
            Self::Address => name.split('/').next().unwrap_or(name),
        }
    }
}

/// Registry-assigned handle, stable for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IdentityId(pub(crate) u64);

/// A person known to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(skip)]
    pub id: IdentityId,
    #[serde(default, rename = "gamename", skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub level: Level,
}

impl Identity {
    pub(crate) fn blank(id: IdentityId) -> Self {
        Self {
            id,
            game_name: None,
            nickname: None,
            address: None,
            uuid: None,
            level: USER,
        }
    }

    /// The name a field holds in `namespace`.
    pub fn name_in(&self, namespace: Namespace) -> Option<&str> {
        match namespace {
            Namespace::GameName => self.game_name.as_deref(),
            Namespace::Nickname => self.nickname.as_deref(),
            Namespace::Address => self.address.as_deref(),
        }
    }

    pub fn matches(&self, namespace: Namespace, name: &str) -> bool {
        let name = namespace.normalize(name);
        self.name_in(namespace)
            .is_some_and(|own| own.eq_ignore_ascii_case(name))
    }

    /// Neither a game name nor a nickname: such an identity must not exist.
    pub fn is_hollow(&self) -> bool {
        self.game_name.is_none() && self.nickname.is_none()
    }

    /// Best label for chat-side output: nickname, else game name.
    pub fn chat_label(&self) -> Option<&str> {
        self.nickname.as_deref().or(self.game_name.as_deref())
    }

    /// Best label for game-side output: game name, else nickname.
    pub fn game_label(&self) -> Option<&str> {
        self.game_name.as_deref().or(self.nickname.as_deref())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<game:{},chat:{}>",
            self.game_name.as_deref().unwrap_or("null"),
            self.nickname.as_deref().unwrap_or("null")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_names_cover_levels() {
        assert_eq!(rank_name(ANONYMOUS), "Anon");
        assert_eq!(rank_name(USER), "User");
        assert_eq!(rank_name(OPERATOR), "Operator");
        assert_eq!(rank_name(ADMIN), "Admin");
        assert_eq!(rank_name(42), "Admin");
    }

    #[test]
    fn parse_rank_digits_and_names() {
        assert_eq!(parse_rank("3"), Some(3));
        assert_eq!(parse_rank("operator+"), Some(4));
        assert_eq!(parse_rank("Admin"), Some(ADMIN));
        assert_eq!(parse_rank("9"), None);
        assert_eq!(parse_rank("king"), None);
    }

    #[test]
    fn normalize_strips_sigils_and_resource() {
        assert_eq!(Namespace::GameName.normalize("#Steve"), "Steve");
        assert_eq!(Namespace::Nickname.normalize("§steve_x"), "steve_x");
        assert_eq!(Namespace::Address.normalize("steve@chat.example/laptop"), "steve@chat.example");
        assert_eq!(Namespace::Nickname.normalize("#Steve"), "#Steve");
    }

    #[test]
    fn identity_serializes_without_id() {
        let mut id = Identity::blank(IdentityId(7));
        id.game_name = Some("Steve".into());
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json["gamename"], "Steve");
        assert!(json.get("id").is_none());
        assert!(json.get("nickname").is_none());
        assert_eq!(json["level"], 0);
    }
}
