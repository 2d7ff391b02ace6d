//! Unified error handling for craftrelay.
//!
//! This module provides the error hierarchy shared by the command layer and
//! the transports, with automatic conversions and metric labeling. Errors
//! owned by a single collaborator (stores, world data) live next to it.

use crate::store::StoreError;
use crate::world::WorldError;
use thiserror::Error;

// ============================================================================
// Severity
// ============================================================================

/// Log severity attached to a command failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    Info,
    Warning,
    #[default]
    Severe,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Severe => "severe",
        }
    }
}

// ============================================================================
// Command Errors (handler outcomes)
// ============================================================================

/// Errors a command handler can return.
///
/// Only the variant decides what the issuer sees; the message of an
/// `Internal` error never reaches chat output.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("insufficient privilege")]
    Privilege,

    #[error("ambiguous reference: {0}")]
    Ambiguous(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Internal {
        message: String,
        severity: Severity,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl CommandError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    pub fn internal(message: impl Into<String>, severity: Severity) -> Self {
        Self::Internal {
            message: message.into(),
            severity,
            source: None,
        }
    }

    /// Wrap an underlying cause with a context message.
    pub fn caused_by(
        message: impl Into<String>,
        cause: impl Into<anyhow::Error>,
        severity: Severity,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            severity,
            source: Some(cause.into()),
        }
    }

    /// Severity used when logging this failure.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Syntax(_) | Self::Privilege | Self::Ambiguous(_) | Self::NotFound(_) => {
                Severity::Info
            }
            Self::Internal { severity, .. } => *severity,
        }
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "syntax",
            Self::Privilege => "privilege",
            Self::Ambiguous(_) => "ambiguous",
            Self::NotFound(_) => "not_found",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type for command handlers.
pub type CommandResult = Result<crate::commands::CommandResponse, CommandError>;

// ============================================================================
// Identity Registry Errors
// ============================================================================

/// Errors raised by the identity registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("'{game}' and '{nickname}' already belong to different identities")]
    Ambiguous { game: String, nickname: String },

    #[error("no identity for '{0}'")]
    NotFound(String),

    #[error("{field} '{value}' is already used by another identity")]
    Conflict { field: &'static str, value: String },

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("identity store: {0}")]
    Store(#[from] StoreError),
}

impl RegistryError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Ambiguous { .. } => "ambiguous",
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::InvalidName(_) => "invalid_name",
            Self::Store(_) => "store",
        }
    }
}

impl From<RegistryError> for CommandError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Ambiguous { .. } | RegistryError::Conflict { .. } => {
                Self::Ambiguous(err.to_string())
            }
            RegistryError::NotFound(name) => Self::NotFound(name),
            RegistryError::InvalidName(name) => Self::Syntax(format!("invalid name '{name}'")),
            RegistryError::Store(e) => Self::caused_by("identity store failure", e, Severity::Severe),
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        Self::caused_by("error while saving settings", err, Severity::Severe)
    }
}

impl From<WorldError> for CommandError {
    fn from(err: WorldError) -> Self {
        match err {
            WorldError::Parse(_) => Self::Syntax(err.to_string()),
            WorldError::Load(_) => Self::caused_by("world data unavailable", err, Severity::Warning),
            _ => Self::NotFound(err.to_string()),
        }
    }
}

// ============================================================================
// Transport Errors
// ============================================================================

/// Failures of the outbound game console or chat network sinks.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("not connected: {0}")]
    NotConnected(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransportError> for CommandError {
    fn from(err: TransportError) -> Self {
        Self::caused_by("transport failure", err, Severity::Warning)
    }
}

// ============================================================================
// Pipeline Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("pipeline already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_codes() {
        assert_eq!(CommandError::syntax("x").error_code(), "syntax");
        assert_eq!(CommandError::Privilege.error_code(), "privilege");
        assert_eq!(
            CommandError::internal("boom", Severity::Warning).error_code(),
            "internal"
        );
    }

    #[test]
    fn test_internal_default_severity_is_severe() {
        assert_eq!(Severity::default(), Severity::Severe);
        let err = CommandError::caused_by("ctx", std::io::Error::other("x"), Severity::default());
        assert_eq!(err.severity(), Severity::Severe);
    }

    #[test]
    fn test_registry_error_maps_to_command_kind() {
        let err: CommandError = RegistryError::Ambiguous {
            game: "alice".into(),
            nickname: "alice_x".into(),
        }
        .into();
        assert!(matches!(err, CommandError::Ambiguous(_)));

        let err: CommandError = RegistryError::NotFound("bob".into()).into();
        assert!(matches!(err, CommandError::NotFound(name) if name == "bob"));

        let err: CommandError = RegistryError::InvalidName(" ".into()).into();
        assert!(matches!(err, CommandError::Syntax(_)));
    }

    #[test]
    fn test_transport_error_is_internal_warning() {
        let err: CommandError = TransportError::Closed.into();
        assert_eq!(err.severity(), Severity::Warning);
        assert_eq!(err.error_code(), "internal");
    }
}
