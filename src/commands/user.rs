//! User commands: identity administration and self-service linking.

use super::{Command, CommandContext, CommandResponse, CommandSpec, Invocation, Matcher, Source};
use crate::error::{CommandError, CommandResult};
use crate::identity::{Identity, Namespace, OPERATOR, USER, parse_rank};
use async_trait::async_trait;
use std::fmt::Write as _;

const USER_CATEGORY: &str = "User";

pub(super) fn commands() -> Result<Vec<Box<dyn Command>>, regex::Error> {
    let commands: Vec<Box<dyn Command>> = vec![
        Box::new(UserAdd::new()),
        Box::new(UserMod::new()),
        Box::new(UserDel::new()),
        Box::new(Lookup::new()),
        Box::new(Link::new()?),
    ];
    Ok(commands)
}

/// Find an identity by any of its names, or fail with `NotFound`.
fn find(ctx: &CommandContext<'_>, name: &str) -> Result<Identity, CommandError> {
    ctx.state
        .identities
        .lookup(name)
        .ok_or_else(|| CommandError::NotFound(format!("user '{name}'")))
}

fn describe(identity: Option<&Identity>) -> String {
    identity.map_or_else(|| "null".to_string(), Identity::to_string)
}

pub struct UserAdd {
    spec: CommandSpec,
}

impl UserAdd {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                USER_CATEGORY,
                "useradd",
                OPERATOR,
                "useradd <gamename|nickname> <name>",
                Matcher::prefix("useradd"),
            ),
        }
    }
}

#[async_trait]
impl Command for UserAdd {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let args = inv.args();
        let [kind, name] = args.as_slice() else {
            return Err(CommandError::syntax("expected a name kind and a name"));
        };
        let identity = match kind.to_ascii_lowercase().as_str() {
            "gamename" | "player" => ctx.state.identities.register_from_game(name, None)?,
            "nickname" | "username" => ctx.state.identities.register_from_chat(name)?,
            other => return Err(CommandError::syntax(format!("unknown name kind {other}"))),
        };
        Ok(CommandResponse::text(ctx.text_with(
            "user.useradd.success",
            "Successfully added {}",
            &[&identity.to_string()],
        )))
    }
}

pub struct UserMod {
    spec: CommandSpec,
}

impl UserMod {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                USER_CATEGORY,
                "usermod",
                OPERATOR,
                "usermod <name> <address|level> <value>",
                Matcher::prefix("usermod"),
            ),
        }
    }
}

#[async_trait]
impl Command for UserMod {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let args = inv.args();
        let [name, field, value] = args.as_slice() else {
            return Err(CommandError::syntax("expected a name, a field and a value"));
        };
        let identity = find(ctx, name)?;
        let identities = &ctx.state.identities;

        match field.to_ascii_lowercase().as_str() {
            "level" => {
                let level = parse_rank(value)
                    .ok_or_else(|| CommandError::syntax(format!("'{value}' is not a rank")))?;
                if level > ctx.level {
                    return Ok(CommandResponse::text(ctx.text(
                        "user.usermod.toohigh",
                        "Can't set level higher than yours",
                    )));
                }
                identities.set_level(identity.id, level)?;
                Ok(CommandResponse::text(ctx.text(
                    "user.usermod.level",
                    "Successfully changed user level",
                )))
            }
            "address" => {
                let address = match value.to_ascii_lowercase().as_str() {
                    "null" | "none" | "-" => None,
                    _ => Some(*value),
                };
                identities.set_address(identity.id, address)?;
                Ok(CommandResponse::text(ctx.text(
                    "user.usermod.address",
                    "Successfully changed user's address",
                )))
            }
            other => Err(CommandError::syntax(format!("unknown field {other}"))),
        }
    }
}

pub struct UserDel {
    spec: CommandSpec,
}

impl UserDel {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                USER_CATEGORY,
                "userdel",
                OPERATOR,
                "userdel <name>",
                Matcher::prefix("userdel"),
            ),
        }
    }
}

#[async_trait]
impl Command for UserDel {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let args = inv.args();
        let [name] = args.as_slice() else {
            return Err(CommandError::syntax("expected one name"));
        };
        let identity = find(ctx, name)?;
        ctx.state.identities.delete(identity.id)?;
        Ok(CommandResponse::text(
            ctx.text("user.userdel.success", "Successfully deleted"),
        ))
    }
}

pub struct Lookup {
    spec: CommandSpec,
}

impl Lookup {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                USER_CATEGORY,
                "lookup",
                OPERATOR,
                "lookup gamename|nickname|user <names...> | lookup everyone [level] [uuid] [address]",
                Matcher::prefix("lookup"),
            ),
        }
    }

    fn everyone(ctx: &CommandContext<'_>, flags: &[&str]) -> String {
        let flag = |wanted: &str| flags.iter().any(|f| f.eq_ignore_ascii_case(wanted));
        let (level, uuid, address) = (flag("level"), flag("uuid"), flag("address"));

        let all = ctx.state.identities.all();
        let mut out = ctx.text_with(
            "user.lookup.everyone",
            "{} users in registry:",
            &[&all.len().to_string()],
        );
        for identity in &all {
            let _ = write!(out, "\n{identity}");
            if level {
                let _ = write!(out, " level={}", identity.level);
            }
            if uuid {
                let _ = write!(out, " uuid={}", identity.uuid.as_deref().unwrap_or("null"));
            }
            if address {
                let _ = write!(out, " address={}", identity.address.as_deref().unwrap_or("null"));
            }
        }
        out
    }
}

#[async_trait]
impl Command for Lookup {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let args = inv.args();
        let Some((kind, names)) = args.split_first() else {
            return Err(CommandError::syntax("missing lookup kind"));
        };

        let namespace = match kind.to_ascii_lowercase().as_str() {
            "everyone" => return Ok(CommandResponse::text(Self::everyone(ctx, names))),
            "gamename" | "player" | "username" => Namespace::GameName,
            "nickname" => Namespace::Nickname,
            "user" if ctx.source == Source::Game => Namespace::GameName,
            "user" => Namespace::Nickname,
            other => return Err(CommandError::syntax(format!("unknown lookup kind {other}"))),
        };
        if names.is_empty() {
            return Err(CommandError::syntax("expected at least one name"));
        }

        let lines: Vec<String> = names
            .iter()
            .map(|name| {
                let found = ctx.state.identities.resolve(name, namespace);
                format!("{name} > {}", describe(found.as_ref()))
            })
            .collect();
        Ok(CommandResponse::text(lines.join("\n")))
    }
}

pub struct Link {
    spec: CommandSpec,
}

impl Link {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            spec: CommandSpec::new(
                USER_CATEGORY,
                "link",
                USER + 1,
                "<gamename> is <nickname>",
                Matcher::pattern(r"(\S+) is (\S+)")?,
            )
            .with_help("Tell me that a player and a chat user are the same person."),
        })
    }
}

/// Order `(first, second)` as `(game name, nickname)`.
///
/// The pair is swapped when it only makes sense reversed. A pair that is
/// already linked keeps its reading. Known names in both readings make the
/// pair ambiguous.
fn orient<'n>(
    ctx: &CommandContext<'_>,
    first: &'n str,
    second: &'n str,
) -> Result<(&'n str, &'n str), CommandError> {
    let identities = &ctx.state.identities;
    let known = |name: &str, namespace| identities.resolve(name, namespace).is_some();
    let linked = |game: &str, nick: &str| {
        match (
            identities.resolve(game, Namespace::GameName),
            identities.resolve(nick, Namespace::Nickname),
        ) {
            (Some(a), Some(b)) => a.id == b.id,
            _ => false,
        }
    };

    if first.eq_ignore_ascii_case(second) || linked(first, second) {
        return Ok((first, second));
    }
    if linked(second, first) {
        return Ok((second, first));
    }

    let reversed = known(first, Namespace::Nickname) || known(second, Namespace::GameName);
    let forward = known(first, Namespace::GameName) || known(second, Namespace::Nickname);
    match (forward, reversed) {
        (true, true) => Err(CommandError::Ambiguous(format!(
            "both '{first}' and '{second}' are already known"
        ))),
        (false, true) => Ok((second, first)),
        _ => Ok((first, second)),
    }
}

#[async_trait]
impl Command for Link {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let (Some(first), Some(second)) = (inv.group(1), inv.group(2)) else {
            return Err(CommandError::syntax("expected two names"));
        };
        let (game_name, nickname) = orient(ctx, first, second)?;
        let identity = ctx.state.identities.link(game_name, nickname)?;
        let game = identity.game_name.as_deref().unwrap_or(game_name);
        let nick = identity.nickname.as_deref().unwrap_or(nickname);
        Ok(CommandResponse::text(ctx.text_with(
            "user.link.success",
            "Successfully linked player {} to {}",
            &[game, nick],
        )))
    }
}
