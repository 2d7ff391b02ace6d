//! World commands, backed by the world data collaborator.

use super::{Command, CommandContext, CommandResponse, CommandSpec, Invocation, Matcher};
use crate::error::{CommandError, CommandResult};
use crate::identity::{OPERATOR, USER};
use crate::world::{WorldData, WorldError, kind_of};
use async_trait::async_trait;
use serde_json::Value;

const WORLD: &str = "World";

pub(super) fn commands() -> Vec<Box<dyn Command>> {
    vec![Box::new(Data::new()), Box::new(WhereIs::new())]
}

fn world<'s>(ctx: &CommandContext<'s>) -> Result<&'s dyn WorldData, WorldError> {
    ctx.state.world.as_deref().ok_or(WorldError::Unavailable)
}

pub struct Data {
    spec: CommandSpec,
}

impl Data {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(WORLD, "data", OPERATOR, "data <path>", Matcher::prefix("data "))
                .with_help("Read a value from the world data, e.g. data Data.LevelName"),
        }
    }
}

#[async_trait]
impl Command for Data {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let path = inv.rest().trim();
        let value = world(ctx)?.fetch(path)?;
        let shown = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(CommandResponse::text(format!("({}): {shown}", kind_of(&value))))
    }
}

pub struct WhereIs {
    spec: CommandSpec,
}

impl WhereIs {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                WORLD,
                "whereis",
                USER,
                "whereis <player>",
                Matcher::prefix("whereis "),
            ),
        }
    }
}

/// Three numbers, as stored in a player's `Pos`.
fn coordinates(value: &Value) -> Option<[f64; 3]> {
    match value.as_array()?.as_slice() {
        [x, y, z] => Some([x.as_f64()?, y.as_f64()?, z.as_f64()?]),
        _ => None,
    }
}

#[async_trait]
impl Command for WhereIs {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let args = inv.args();
        let [player] = args.as_slice() else {
            return Err(CommandError::syntax("expected one player name"));
        };
        if player.contains(['.', '[', ']']) {
            return Err(CommandError::syntax(format!("'{player}' is not a player name")));
        }

        let value = world(ctx)?.fetch(&format!("players.{player}.Pos"))?;
        let [x, y, z] = coordinates(&value).ok_or_else(|| {
            CommandError::internal(
                format!("position of {player} is not three numbers"),
                crate::error::Severity::Warning,
            )
        })?;
        Ok(CommandResponse::text(ctx.text_with(
            "world.whereis",
            "{} is at {} {} {}",
            &[
                player,
                &format!("{x:.0}"),
                &format!("{y:.0}"),
                &format!("{z:.0}"),
            ],
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coordinates_need_three_numbers() {
        assert_eq!(coordinates(&json!([1.5, 64, -3.2])), Some([1.5, 64.0, -3.2]));
        assert_eq!(coordinates(&json!([1, 2])), None);
        assert_eq!(coordinates(&json!([1, "2", 3])), None);
        assert_eq!(coordinates(&json!("x")), None);
    }
}
