//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bot.nickname is required")]
    MissingNickname,
    #[error("bot.nickname must not contain whitespace, got '{0}'")]
    InvalidNickname(String),
    #[error("game.command must name a program")]
    EmptyGameCommand,
    #[error("game.working_dir does not exist: {0}")]
    WorkingDirNotFound(String),
    #[error("{field} parent directory does not exist: {path}")]
    StorePathInvalid { field: &'static str, path: String },
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let nickname = &config.bot.nickname;
    if nickname.trim().is_empty() {
        errors.push(ValidationError::MissingNickname);
    } else if nickname.chars().any(char::is_whitespace) {
        errors.push(ValidationError::InvalidNickname(nickname.clone()));
    }

    if config.game.command.first().is_none_or(|program| program.trim().is_empty()) {
        errors.push(ValidationError::EmptyGameCommand);
    }
    if let Some(dir) = &config.game.working_dir
        && !dir.is_dir()
    {
        errors.push(ValidationError::WorkingDirNotFound(dir.display().to_string()));
    }

    let stores = [
        ("bot.settings_path", &config.bot.settings_path),
        ("bot.users_path", &config.bot.users_path),
        ("bot.language_path", &config.bot.language_path),
    ];
    for (field, path) in stores {
        if !parent_exists(path) {
            errors.push(ValidationError::StorePathInvalid {
                field,
                path: path.display().to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parent_exists(path: &Path) -> bool {
    match path.parent() {
        Some(parent) => parent.as_os_str().is_empty() || parent.exists(),
        None => true,
    }
}
