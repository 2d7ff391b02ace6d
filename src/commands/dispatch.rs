//! Command dispatch: resolve, authorize, match, execute, classify.

use super::{CommandContext, CommandRegistry, CommandResponse, Source};
use crate::bot::BotState;
use crate::error::{CommandError, Severity};
use crate::identity::{ANONYMOUS, Identity, OPERATOR, rank_name};
use crate::telemetry::{CommandTimer, spans};
use crate::transport::Presence;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, warn};

/// Turns text addressed to the bot into a [`CommandResponse`].
///
/// Dispatch never fails: every outcome, including handler errors, becomes a
/// response. The dispatcher itself only logs and records the last error.
#[derive(Clone)]
pub struct CommandDispatcher {
    state: Arc<BotState>,
    registry: Arc<CommandRegistry>,
}

impl CommandDispatcher {
    pub fn new(state: Arc<BotState>, registry: Arc<CommandRegistry>) -> Self {
        Self { state, registry }
    }

    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Dispatch `text` issued by `issuer_name` from `source`.
    pub async fn dispatch(&self, text: &str, issuer_name: &str, source: Source) -> CommandResponse {
        let text = text.trim();
        let issuer = self
            .state
            .identities
            .resolve(issuer_name, source.namespace());
        let level = issuer.as_ref().map_or(ANONYMOUS, |identity| identity.level);

        if is_who_am_i(text) {
            return CommandResponse::text(self.state.text_with(
                "general.whoami",
                "You are {}, {} ({}).",
                &[issuer_name, rank_name(level), &level.to_string()],
            ));
        }

        info!(source = source.as_str(), issuer = %issuer_name, command = %text, "Parsing command");

        if let Some(identity) = &issuer
            && self.is_impersonation(identity, source)
        {
            error!(
                issuer = %issuer_name,
                identity = %identity,
                command = %text,
                "Attempted impersonation"
            );
            crate::metrics::record_impersonation();
            return CommandResponse::text(self.state.text(
                "error.impersonation",
                "Nice try. You are not who you claim to be.",
            ));
        }

        let Some((entry, invocation)) = self.registry.first_match(text) else {
            debug!(command = %text, "No command matched");
            return CommandResponse::text(
                self.state
                    .text("general.unknown", "I have no idea what that is supposed to mean."),
            );
        };

        let spec = entry.spec();
        let full_name = entry.full_name();

        if level < spec.level {
            crate::metrics::record_command_error(full_name, CommandError::Privilege.error_code());
            debug!(command = %full_name, level, required = spec.level, "Privilege denied");
            return self.privilege_denied(level, spec.level);
        }

        entry.record_use();
        let span = spans::command(full_name, source.as_str(), issuer_name);
        let _timer = CommandTimer::new(full_name);

        let ctx = CommandContext {
            state: &self.state,
            registry: &self.registry,
            issuer: issuer.as_ref(),
            issuer_name,
            level,
            source,
        };
        let result = entry
            .command()
            .execute(&ctx, &invocation)
            .instrument(span)
            .await;

        match result {
            Ok(response) => response,
            Err(err) => self.failure(full_name, spec.syntax, level, spec.level, err),
        }
    }

    /// A group-chat issuer whose identity carries an address that the
    /// roster reports as unavailable is not the person behind that address.
    fn is_impersonation(&self, identity: &Identity, source: Source) -> bool {
        if source != Source::GroupChat {
            return false;
        }
        let Some(address) = identity.address.as_deref() else {
            return false;
        };
        self.state.chat.presence(address) == Presence::Unavailable
    }

    fn privilege_denied(&self, level: i32, required: i32) -> CommandResponse {
        if level < 0 {
            return CommandResponse::text(
                self.state
                    .text("error.anon", "Who even are you? Actually, I don't care."),
            );
        }
        let role = if required > OPERATOR { "admin" } else { "operator" };
        CommandResponse::text(self.state.text_with(
            "error.privilege",
            "Look at you, trying to play {}. Hilarious.",
            &[role],
        ))
    }

    fn failure(
        &self,
        command: &str,
        syntax: &str,
        level: i32,
        required: i32,
        err: CommandError,
    ) -> CommandResponse {
        crate::metrics::record_command_error(command, err.error_code());
        match &err {
            CommandError::Syntax(message) => {
                info!(%command, error = %message, "Syntax error");
                CommandResponse::text(self.state.text_with(
                    "error.syntax",
                    "You messed up the syntax. {}\n{}",
                    &[message, syntax],
                ))
            }
            CommandError::Privilege => self.privilege_denied(level, required.max(level + 1)),
            CommandError::Ambiguous(message) => {
                info!(%command, error = %message, "Ambiguous reference");
                CommandResponse::text(self.state.text_with(
                    "error.ambiguous",
                    "That is ambiguous: {}",
                    &[message],
                ))
            }
            CommandError::NotFound(what) => {
                info!(%command, %what, "Not found");
                CommandResponse::text(self.state.text_with(
                    "error.notfound",
                    "Can't find {}.",
                    &[what],
                ))
            }
            CommandError::Internal { severity, .. } => {
                self.state.record_error(command, &err);
                match severity {
                    Severity::Info => info!(%command, error = ?err, "Command failed"),
                    Severity::Warning => warn!(%command, error = ?err, "Command failed"),
                    Severity::Severe => error!(%command, error = ?err, "Command failed"),
                }
                CommandResponse::text(self.state.text(
                    "error.generic",
                    "It seems something went wrong. Oh well, too bad.",
                ))
            }
        }
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("commands", &self.registry.len())
            .finish()
    }
}

/// "who am i", optionally followed by punctuation or more words.
fn is_who_am_i(text: &str) -> bool {
    text.to_lowercase()
        .strip_prefix("who am i")
        .is_some_and(|rest| !rest.starts_with(char::is_alphanumeric))
}
