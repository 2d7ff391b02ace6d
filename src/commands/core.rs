//! Core and Utils commands: settings, diagnostics, help and toggles.

use super::{
    Command, CommandContext, CommandResponse, CommandSpec, Invocation, Matcher, RegisteredCommand,
};
use crate::bridge::Direction;
use crate::error::{CommandError, CommandResult};
use crate::identity::{ADMIN, ANONYMOUS, OPERATOR};
use crate::store::Settings;
use crate::world::WorldError;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

const CORE: &str = "Core";
const UTILS: &str = "Utils";

pub(super) fn commands() -> Result<Vec<Box<dyn Command>>, regex::Error> {
    let commands: Vec<Box<dyn Command>> = vec![
        Box::new(Save::new()),
        Box::new(Get::new()),
        Box::new(Set::new()),
        Box::new(Version::new()),
        Box::new(GetError::new()),
        Box::new(Help::new()),
        Box::new(Reload::new()),
        Box::new(Ping::new()?),
        Box::new(Toggle::new()?),
    ];
    Ok(commands)
}

/// Pick the document named by an optional `file!` prefix.
fn document<'s, 'n>(
    ctx: &CommandContext<'s>,
    name: &'n str,
) -> Result<(&'s Settings, &'n str), CommandError> {
    match name.split_once('!') {
        None => Ok((&ctx.state.settings, name)),
        Some((file, key)) if file.eq_ignore_ascii_case("settings") => Ok((&ctx.state.settings, key)),
        Some((file, key)) if file.eq_ignore_ascii_case("language") => Ok((&ctx.state.language, key)),
        Some((file, _)) => Err(CommandError::syntax(format!("unknown settings file '{file}'"))),
    }
}

/// Type name shown by `get`.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "Boolean",
        Value::Number(n) if n.is_f64() => "Double",
        Value::Number(_) => "Integer",
        Value::String(_) => "String",
        Value::Array(_) => "List",
        Value::Object(_) => "Map",
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse `raw` into the type of `current`; absent values become strings.
fn coerce(current: Option<&Value>, raw: &str) -> Result<Value, CommandError> {
    let bad = || CommandError::syntax(format!("'{raw}' does not fit the current value"));
    match current {
        Some(Value::Number(n)) if n.is_f64() => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(bad),
        Some(Value::Number(_)) => raw.trim().parse::<i64>().map(Value::from).map_err(|_| bad()),
        Some(Value::Bool(_)) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(bad()),
        },
        _ => Ok(Value::String(raw.to_string())),
    }
}

// ============================================================================
// Core
// ============================================================================

pub struct Save {
    spec: CommandSpec,
}

impl Save {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                CORE,
                "save",
                OPERATOR,
                "save settings|users|language|all",
                Matcher::prefix("save "),
            ),
        }
    }
}

#[async_trait]
impl Command for Save {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let args = inv.args();
        let [what] = args.as_slice() else {
            return Err(CommandError::syntax("expected exactly one document"));
        };
        let state = ctx.state;
        match what.to_ascii_lowercase().as_str() {
            "settings" => state.settings.save()?,
            "users" => state.identities.save()?,
            "language" => state.language.save()?,
            "all" => state.save_all()?,
            other => return Err(CommandError::syntax(format!("unknown parameter {other}"))),
        }
        Ok(CommandResponse::text(ctx.text(
            "core.save",
            "There, I saved the settings for you. You lazy organism.",
        )))
    }
}

pub struct Get {
    spec: CommandSpec,
}

impl Get {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                CORE,
                "get",
                ADMIN,
                "get [file!]<setting name>",
                Matcher::prefix("get"),
            ),
        }
    }
}

#[async_trait]
impl Command for Get {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let args = inv.args();
        let [name] = args.as_slice() else {
            return Err(CommandError::syntax("expected one setting name"));
        };
        let (settings, key) = document(ctx, name)?;
        let value = settings.get(key).unwrap_or(Value::Null);
        Ok(CommandResponse::private(
            format!("({}): {}", type_name(&value), display(&value)),
            ctx.require_issuer()?.clone(),
        ))
    }
}

pub struct Set {
    spec: CommandSpec,
}

impl Set {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                CORE,
                "set",
                ADMIN,
                "set [file!]<setting name> <value>",
                Matcher::prefix("set"),
            ),
        }
    }
}

#[async_trait]
impl Command for Set {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let Some((name, raw)) = inv.rest().trim_start().split_once(' ') else {
            return Err(CommandError::syntax("expected a setting name and a value"));
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CommandError::syntax("missing value"));
        }
        let (settings, key) = document(ctx, name)?;
        let value = coerce(settings.get(key).as_ref(), raw)?;
        info!(key, value = %value, store = %settings.name(), "Changing setting");
        settings.put(key, value);
        settings.save()?;
        Ok(CommandResponse::text("Value successfully changed"))
    }
}

pub struct Version {
    spec: CommandSpec,
}

impl Version {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                CORE,
                "version",
                ANONYMOUS,
                "version [-l]",
                Matcher::prefix("version"),
            ),
        }
    }
}

#[async_trait]
impl Command for Version {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, _ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let mut output = format!("Current version: {}", env!("CARGO_PKG_VERSION"));
        if inv.args().first() == Some(&"-l") {
            output.push_str(&format!(
                "\nRunning on {} ({})",
                std::env::consts::OS,
                std::env::consts::ARCH
            ));
        }
        Ok(CommandResponse::text(output))
    }
}

pub struct GetError {
    spec: CommandSpec,
}

impl GetError {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                CORE,
                "geterror",
                OPERATOR,
                "what was that ?",
                Matcher::prefix("what was that"),
            ),
        }
    }
}

#[async_trait]
impl Command for GetError {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, _inv: &Invocation) -> CommandResult {
        let text = match ctx.state.take_last_error() {
            None => ctx.text(
                "core.lasterror.null",
                "What was what? There's nothing in my logs.",
            ),
            Some(last) => ctx.text_with(
                "core.lasterror",
                "Last error was {} in {} at {}: {}",
                &[
                    last.code,
                    &last.command,
                    &last.at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                    &last.message,
                ],
            ),
        };
        Ok(CommandResponse::text(text))
    }
}

// ============================================================================
// Utils
// ============================================================================

pub struct Help {
    spec: CommandSpec,
}

impl Help {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(UTILS, "help", ANONYMOUS, "help [command]", Matcher::prefix("help")),
        }
    }
}

#[async_trait]
impl Command for Help {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let accessible = |entry: &&RegisteredCommand| {
            entry.is_enabled() && ctx.level >= entry.spec().level
        };

        let args = inv.args();
        let Some(wanted) = args.first() else {
            let names: Vec<&str> = ctx
                .registry
                .iter()
                .filter(accessible)
                .map(|entry| entry.spec().name)
                .collect();
            return Ok(CommandResponse::text(names.join(", ")));
        };

        let found = ctx
            .registry
            .get(wanted)
            .filter(accessible)
            .or_else(|| {
                ctx.registry
                    .iter()
                    .filter(accessible)
                    .find(|entry| entry.spec().name.eq_ignore_ascii_case(wanted))
            })
            .ok_or_else(|| CommandError::NotFound(format!("command '{wanted}'")))?;

        let spec = found.spec();
        let text = match spec.help {
            Some(help) => format!("{} : {help}", spec.syntax),
            None => spec.syntax.to_string(),
        };
        Ok(CommandResponse::text(text))
    }
}

pub struct Reload {
    spec: CommandSpec,
}

impl Reload {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                UTILS,
                "reload",
                ADMIN,
                "reload <settings|language|users|world>",
                Matcher::prefix("reload"),
            ),
        }
    }
}

#[async_trait]
impl Command for Reload {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let args = inv.args();
        let [what] = args.as_slice() else {
            return Err(CommandError::syntax("expected one document"));
        };
        let state = ctx.state;
        match what.to_ascii_lowercase().as_str() {
            "settings" => state.settings.load()?,
            "language" => state.language.load()?,
            "users" => {
                state.identities.reload()?;
            }
            "world" => {
                state
                    .world
                    .as_deref()
                    .ok_or(WorldError::Unavailable)?
                    .reload()?;
            }
            other => return Err(CommandError::syntax(format!("unknown settings '{other}'"))),
        }
        Ok(CommandResponse::text(ctx.text(
            "utils.reload.done",
            "Can you really not do it yourself? Anyway, done.",
        )))
    }
}

pub struct Ping {
    spec: CommandSpec,
}

impl Ping {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            spec: CommandSpec::new(
                UTILS,
                "ping",
                ANONYMOUS,
                "ping|?",
                Matcher::pattern(r"ping|\?|\s*")?,
            ),
        })
    }
}

#[async_trait]
impl Command for Ping {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, _ctx: &CommandContext<'_>, _inv: &Invocation) -> CommandResult {
        Ok(CommandResponse::text("Yes ?"))
    }
}

pub struct Toggle {
    spec: CommandSpec,
}

impl Toggle {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            spec: CommandSpec::new(
                UTILS,
                "toggle",
                OPERATOR,
                "enable|disable <mtx|xtm|command>",
                Matcher::pattern(r"(enable|disable) (\S+)")?,
            )
            .with_help(
                "Toggles game-to-chat (mtx) or chat-to-game (xtm) mirroring, or enables/disables a command",
            ),
        })
    }
}

#[async_trait]
impl Command for Toggle {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let (Some(verb), Some(target)) = (inv.group(1), inv.group(2)) else {
            return Err(CommandError::syntax("expected enable|disable <target>"));
        };
        let enable = verb.eq_ignore_ascii_case("enable");
        let word = if enable { "enabled" } else { "disabled" };

        let direction = match target.to_ascii_lowercase().as_str() {
            "mtx" | "gtc" => Some(Direction::GameToChat),
            "xtm" | "ctg" => Some(Direction::ChatToGame),
            _ => None,
        };
        if let Some(direction) = direction {
            ctx.state.set_mirror(direction, enable)?;
            return Ok(CommandResponse::text(format!(
                "{} mirroring {word}",
                direction.label()
            )));
        }

        let entry = ctx
            .registry
            .find(target)
            .ok_or_else(|| CommandError::NotFound(format!("command '{target}'")))?;
        if entry.full_name() == self.spec.full_name() {
            return Err(CommandError::syntax("the toggle command cannot be toggled"));
        }
        entry.set_enabled(enable);
        info!(command = %entry.full_name(), enabled = enable, "Command toggled");
        Ok(CommandResponse::text(format!("Command {} {word}", entry.full_name())))
    }
}
