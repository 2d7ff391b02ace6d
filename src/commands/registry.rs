//! Command registry.
//!
//! Commands are kept in registration order and indexed by their lowercase
//! full name. Each entry carries its enabled flag and a usage counter.

use super::{Command, CommandSpec, Invocation, builtin_commands};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// A command plus its runtime flags.
pub struct RegisteredCommand {
    command: Box<dyn Command>,
    full_name: String,
    enabled: AtomicBool,
    uses: AtomicU64,
}

impl RegisteredCommand {
    pub fn spec(&self) -> &CommandSpec {
        self.command.spec()
    }

    pub fn command(&self) -> &dyn Command {
        self.command.as_ref()
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn record_use(&self) {
        self.uses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uses(&self) -> u64 {
        self.uses.load(Ordering::Relaxed)
    }
}

/// Usage count of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStats {
    pub name: String,
    pub uses: u64,
}

/// Registry of chat commands.
#[derive(Default)]
pub struct CommandRegistry {
    entries: Vec<RegisteredCommand>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command.
    pub fn with_builtins(with_world: bool) -> Result<Self, regex::Error> {
        let mut registry = Self::new();
        for command in builtin_commands(with_world)? {
            registry.register(command);
        }
        Ok(registry)
    }

    /// Register `command`. A command with the same full name is replaced
    /// in place and returned.
    pub fn register(&mut self, command: Box<dyn Command>) -> Option<Box<dyn Command>> {
        let full_name = command.spec().full_name();
        let key = full_name.to_lowercase();
        let entry = RegisteredCommand {
            command,
            full_name,
            enabled: AtomicBool::new(true),
            uses: AtomicU64::new(0),
        };

        match self.index.get(&key) {
            Some(&slot) => {
                warn!(command = %entry.full_name, "Command registered twice, replacing");
                let old = std::mem::replace(&mut self.entries[slot], entry);
                Some(old.command)
            }
            None => {
                debug!(command = %entry.full_name, "Registered command");
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredCommand> {
        self.entries.iter()
    }

    pub fn get(&self, full_name: &str) -> Option<&RegisteredCommand> {
        self.index
            .get(&full_name.to_lowercase())
            .map(|&slot| &self.entries[slot])
    }

    /// Find by full name, else by short name (first registered wins).
    pub fn find(&self, name: &str) -> Option<&RegisteredCommand> {
        self.get(name).or_else(|| {
            self.entries
                .iter()
                .find(|entry| entry.spec().name.eq_ignore_ascii_case(name))
        })
    }

    /// First enabled command whose matcher accepts `text`.
    pub fn first_match(&self, text: &str) -> Option<(&RegisteredCommand, Invocation)> {
        self.entries
            .iter()
            .filter(|entry| entry.is_enabled())
            .find_map(|entry| entry.spec().matcher.matches(text).map(|inv| (entry, inv)))
    }

    /// Full names of every enabled command accepting `text`.
    pub fn matching(&self, text: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.is_enabled() && entry.spec().matcher.matches(text).is_some())
            .map(RegisteredCommand::full_name)
            .collect()
    }

    /// Enable or disable a command by full or short name. Returns the full
    /// name of the affected command.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Option<&str> {
        let entry = self.find(name)?;
        entry.set_enabled(enabled);
        Some(entry.full_name())
    }

    /// Usage statistics of commands used at least once, most used first.
    pub fn stats(&self) -> Vec<CommandStats> {
        let mut stats: Vec<_> = self
            .entries
            .iter()
            .map(|entry| CommandStats {
                name: entry.full_name.clone(),
                uses: entry.uses(),
            })
            .filter(|stat| stat.uses > 0)
            .collect();
        stats.sort_by(|a, b| b.uses.cmp(&a.uses));
        stats
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| &entry.full_name))
            .finish()
    }
}
