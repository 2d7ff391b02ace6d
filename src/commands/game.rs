//! Game commands: console access and server control.

use super::{Command, CommandContext, CommandResponse, CommandSpec, Invocation, Matcher};
use crate::error::{CommandError, CommandResult};
use crate::identity::{ANONYMOUS, OPERATOR, USER};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info};

const GAME: &str = "Game";
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

pub(super) fn commands() -> Vec<Box<dyn Command>> {
    vec![
        Box::new(Console::new()),
        Box::new(Say::new()),
        Box::new(Shutdown::new()),
        Box::new(List::new()),
    ]
}

/// Keep at most `max_lines` lines, replacing the overflow with a notice.
fn clamp_lines(mut lines: Vec<String>, max_lines: usize, notice: String) -> Vec<String> {
    if lines.len() > max_lines {
        lines.truncate(max_lines.saturating_sub(1));
        lines.push(notice);
    }
    lines
}

pub struct Console {
    spec: CommandSpec,
}

impl Console {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(GAME, "console", OPERATOR, "$<command>", Matcher::prefix("$"))
                .with_help("Run a console command and show what it printed."),
        }
    }
}

#[async_trait]
impl Command for Console {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let command = inv.text.trim_start_matches('$').trim();
        if command.is_empty() {
            return Err(CommandError::syntax("missing console command"));
        }
        info!(issuer = %ctx.issuer_name, %command, "Console command from chat");
        let output = ctx.state.game_command_captured(command).await?;

        if ctx.source.is_game() || output.is_empty() {
            return Ok(CommandResponse::text(
                ctx.text("game.console.success", "Successfully executed"),
            ));
        }
        let lines = clamp_lines(
            output,
            ctx.state.max_lines(),
            ctx.text("game.console.toolong", "... Command output exceeded max line count"),
        );
        Ok(CommandResponse::local(lines.join("\n")))
    }
}

pub struct Say {
    spec: CommandSpec,
}

impl Say {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(GAME, "say", USER + 2, "say <message>", Matcher::prefix("say")),
        }
    }
}

#[async_trait]
impl Command for Say {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> CommandResult {
        let message = inv.rest().trim();
        if message.is_empty() {
            return Err(CommandError::syntax("nothing to say"));
        }
        ctx.state.say(message).await?;
        if ctx.source.is_game() {
            Ok(CommandResponse::empty())
        } else {
            Ok(CommandResponse::local(format!("[server] {message}")))
        }
    }
}

pub struct Shutdown {
    spec: CommandSpec,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                GAME,
                "shutdown",
                OPERATOR + 1,
                "shutdown",
                Matcher::any_prefix(&["shut down", "shutdown", "poweroff", "stop"]),
            ),
        }
    }
}

#[async_trait]
impl Command for Shutdown {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, _inv: &Invocation) -> CommandResult {
        let state = ctx.state;
        info!(issuer = %ctx.issuer_name, "Shutdown requested");
        state
            .say(&ctx.text("game.shutdown", "Server is shutting down. Bye!"))
            .await?;

        if let Err(e) = state.save_all() {
            error!(error = %e, "Failed to save before shutdown");
            let notice = ctx.text("game.shutdown.savefailed", "Could not save before shutdown.");
            if let Err(e) = state.room(&notice).await {
                error!(error = %e, "Failed to report save failure");
            }
        }

        tokio::time::sleep(SHUTDOWN_GRACE).await;
        state.game_command("stop").await?;
        Ok(CommandResponse::empty())
    }
}

pub struct List {
    spec: CommandSpec,
}

impl List {
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(GAME, "list", ANONYMOUS, "list", Matcher::prefix("list")),
        }
    }
}

#[async_trait]
impl Command for List {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &CommandContext<'_>, _inv: &Invocation) -> CommandResult {
        let output = ctx.state.game_command_captured("list").await?;
        if output.is_empty() {
            return Err(CommandError::internal(
                "no output from list",
                crate::error::Severity::Warning,
            ));
        }
        Ok(CommandResponse::local(output.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_short_output() {
        let lines = vec!["a".to_string(), "b".to_string()];
        assert_eq!(clamp_lines(lines.clone(), 2, "cut".into()), lines);
    }

    #[test]
    fn clamp_replaces_overflow() {
        let lines: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(
            clamp_lines(lines, 3, "cut".into()),
            vec!["0".to_string(), "1".to_string(), "cut".to_string()]
        );
    }
}
