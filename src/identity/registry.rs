//! Persisted identity set with per-namespace lookup.

use super::{Identity, IdentityId, Level, Namespace, GAME_SIGIL, NICK_SIGIL};
use crate::error::RegistryError;
use crate::store::{Settings, StoreError};
use crate::world::kind_of;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Key of the identity list inside the backing document.
const USERS_KEY: &str = "users";

struct Inner {
    identities: Vec<Identity>,
    next_id: u64,
}

impl Inner {
    fn allocate(&mut self) -> IdentityId {
        self.next_id += 1;
        IdentityId(self.next_id)
    }

    fn find(&self, namespace: Namespace, name: &str) -> Option<usize> {
        self.identities
            .iter()
            .position(|identity| identity.matches(namespace, name))
    }

    fn index_of(&self, id: IdentityId) -> Option<usize> {
        self.identities.iter().position(|identity| identity.id == id)
    }

    /// Check that `candidate` shares no non-null field with any other identity.
    fn check_unique(&self, candidate: &Identity) -> Result<(), RegistryError> {
        let fields = [
            ("game name", Namespace::GameName),
            ("nickname", Namespace::Nickname),
            ("address", Namespace::Address),
        ];
        for (field, namespace) in fields {
            let Some(value) = candidate.name_in(namespace) else {
                continue;
            };
            let taken = self
                .identities
                .iter()
                .any(|other| other.id != candidate.id && other.matches(namespace, value));
            if taken {
                return Err(RegistryError::Conflict {
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Insert or replace `candidate` after validation.
    fn commit(&mut self, candidate: Identity) -> Result<Identity, RegistryError> {
        if candidate.is_hollow() {
            return Err(RegistryError::InvalidName(candidate.to_string()));
        }
        self.check_unique(&candidate)?;
        match self.index_of(candidate.id) {
            Some(index) => self.identities[index] = candidate.clone(),
            None => self.identities.push(candidate.clone()),
        }
        Ok(candidate)
    }
}

/// Owner of every [`Identity`].
///
/// All mutations run under one lock, including the write-back to the store,
/// so concurrent dispatches cannot interleave read-modify-persist sequences.
pub struct IdentityRegistry {
    inner: Mutex<Inner>,
    store: Settings,
}

impl IdentityRegistry {
    /// Create a registry over `store` and load the stored identities.
    pub fn open(store: Settings) -> Result<Self, RegistryError> {
        let registry = Self {
            inner: Mutex::new(Inner {
                identities: Vec::new(),
                next_id: 0,
            }),
            store,
        };
        registry.reload()?;
        Ok(registry)
    }

    /// Re-read the identity document, replacing the in-memory set.
    pub fn reload(&self) -> Result<usize, RegistryError> {
        self.store.load()?;
        let raw = match self.store.get(USERS_KEY) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                warn!(kind = kind_of(&other), "Identity document has no user list, ignoring");
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut inner = self.inner.lock();
        inner.identities.clear();
        for item in raw {
            let mut identity: Identity = match serde_json::from_value(item) {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed identity entry");
                    continue;
                }
            };
            identity.id = inner.allocate();
            if let Err(e) = inner.commit(identity) {
                warn!(error = %e, "Skipping invalid identity entry");
            }
        }
        let count = inner.identities.len();
        info!(count, store = %self.store.name(), "Identities loaded");
        Ok(count)
    }

    /// Persist the current identity set.
    pub fn save(&self) -> Result<(), StoreError> {
        let inner = self.inner.lock();
        self.write_back(&inner)
    }

    fn write_back(&self, inner: &Inner) -> Result<(), StoreError> {
        let list = inner
            .identities
            .iter()
            .filter_map(|identity| serde_json::to_value(identity).ok())
            .collect::<Vec<_>>();
        self.store.put(USERS_KEY, Value::Array(list));
        self.store.save()
    }

    /// Persist after a mutation. A failed save leaves memory untouched.
    fn persist(&self, inner: &Inner) {
        if let Err(e) = self.write_back(inner) {
            error!(error = %e, "Failed to persist identities");
        }
    }

    pub fn resolve(&self, name: &str, namespace: Namespace) -> Option<Identity> {
        let inner = self.inner.lock();
        inner
            .find(namespace, name)
            .map(|index| inner.identities[index].clone())
    }

    /// Resolve a name of unknown kind.
    ///
    /// `#name` is only a game name and `§name` only a nickname; otherwise the
    /// nickname is tried before the game name.
    pub fn lookup(&self, name: &str) -> Option<Identity> {
        let name = name.trim();
        if name.starts_with(GAME_SIGIL) {
            return self.resolve(name, Namespace::GameName);
        }
        if name.starts_with(NICK_SIGIL) {
            return self.resolve(name, Namespace::Nickname);
        }
        self.resolve(name, Namespace::Nickname)
            .or_else(|| self.resolve(name, Namespace::GameName))
    }

    pub fn get(&self, id: IdentityId) -> Option<Identity> {
        let inner = self.inner.lock();
        inner.index_of(id).map(|index| inner.identities[index].clone())
    }

    pub fn all(&self) -> Vec<Identity> {
        self.inner.lock().identities.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the identity owning `game_name`, creating it when unknown.
    ///
    /// A `uuid` replaces the one recorded on an existing identity.
    pub fn register_from_game(
        &self,
        game_name: &str,
        uuid: Option<&str>,
    ) -> Result<Identity, RegistryError> {
        let name = checked_name(Namespace::GameName, game_name)?;
        let mut inner = self.inner.lock();

        if let Some(index) = inner.find(Namespace::GameName, name) {
            let existing = &inner.identities[index];
            match uuid {
                Some(uuid) if existing.uuid.as_deref() != Some(uuid) => {
                    let mut updated = existing.clone();
                    updated.uuid = Some(uuid.to_string());
                    let updated = inner.commit(updated)?;
                    self.persist(&inner);
                    return Ok(updated);
                }
                _ => return Ok(existing.clone()),
            }
        }

        let mut identity = Identity::blank(inner.allocate());
        identity.game_name = Some(name.to_string());
        identity.uuid = uuid.map(str::to_string);
        let identity = inner.commit(identity)?;
        info!(identity = %identity, "Registered identity from game");
        self.persist(&inner);
        Ok(identity)
    }

    /// Return the identity owning `nickname`, creating it when unknown.
    pub fn register_from_chat(&self, nickname: &str) -> Result<Identity, RegistryError> {
        let name = checked_name(Namespace::Nickname, nickname)?;
        let mut inner = self.inner.lock();

        if let Some(index) = inner.find(Namespace::Nickname, name) {
            return Ok(inner.identities[index].clone());
        }

        let mut identity = Identity::blank(inner.allocate());
        identity.nickname = Some(name.to_string());
        let identity = inner.commit(identity)?;
        info!(identity = %identity, "Registered identity from chat");
        self.persist(&inner);
        Ok(identity)
    }

    /// Make `game_name` and `nickname` resolve to the same identity.
    ///
    /// Fails with [`RegistryError::Ambiguous`] when both names already belong
    /// to two different identities; nothing is changed in that case.
    pub fn link(&self, game_name: &str, nickname: &str) -> Result<Identity, RegistryError> {
        let game = checked_name(Namespace::GameName, game_name)?;
        let nick = checked_name(Namespace::Nickname, nickname)?;
        let mut inner = self.inner.lock();

        let by_game = inner.find(Namespace::GameName, game);
        let by_nick = inner.find(Namespace::Nickname, nick);

        let candidate = match (by_game, by_nick) {
            (Some(a), Some(b)) if a == b => {
                debug!(game, nick, "Names already linked");
                return Ok(inner.identities[a].clone());
            }
            (Some(_), Some(_)) => {
                return Err(RegistryError::Ambiguous {
                    game: game.to_string(),
                    nickname: nick.to_string(),
                });
            }
            (Some(index), None) => {
                let mut identity = inner.identities[index].clone();
                identity.nickname = Some(nick.to_string());
                identity
            }
            (None, Some(index)) => {
                let mut identity = inner.identities[index].clone();
                identity.game_name = Some(game.to_string());
                identity
            }
            (None, None) => {
                let mut identity = Identity::blank(inner.allocate());
                identity.game_name = Some(game.to_string());
                identity.nickname = Some(nick.to_string());
                identity
            }
        };

        let identity = inner.commit(candidate)?;
        info!(identity = %identity, "Linked identity");
        self.persist(&inner);
        Ok(identity)
    }

    pub fn set_level(&self, id: IdentityId, level: Level) -> Result<Identity, RegistryError> {
        self.modify(id, |identity| identity.level = level)
    }

    /// Set or clear the chat address. The `/resource` part is dropped.
    pub fn set_address(
        &self,
        id: IdentityId,
        address: Option<&str>,
    ) -> Result<Identity, RegistryError> {
        let address = match address {
            Some(raw) => Some(checked_name(Namespace::Address, raw)?.to_string()),
            None => None,
        };
        self.modify(id, move |identity| identity.address = address)
    }

    /// Set the game name of an existing identity.
    pub fn set_game_name(&self, id: IdentityId, name: &str) -> Result<Identity, RegistryError> {
        let name = checked_name(Namespace::GameName, name)?.to_string();
        self.modify(id, move |identity| identity.game_name = Some(name))
    }

    /// Set the nickname of an existing identity.
    pub fn set_nickname(&self, id: IdentityId, name: &str) -> Result<Identity, RegistryError> {
        let name = checked_name(Namespace::Nickname, name)?.to_string();
        self.modify(id, move |identity| identity.nickname = Some(name))
    }

    pub fn delete(&self, id: IdentityId) -> Result<Identity, RegistryError> {
        let mut inner = self.inner.lock();
        let index = inner
            .index_of(id)
            .ok_or_else(|| RegistryError::NotFound(format!("#{}", id.0)))?;
        let removed = inner.identities.remove(index);
        info!(identity = %removed, "Deleted identity");
        self.persist(&inner);
        Ok(removed)
    }

    fn modify(
        &self,
        id: IdentityId,
        change: impl FnOnce(&mut Identity),
    ) -> Result<Identity, RegistryError> {
        let mut inner = self.inner.lock();
        let index = inner
            .index_of(id)
            .ok_or_else(|| RegistryError::NotFound(format!("#{}", id.0)))?;
        let mut candidate = inner.identities[index].clone();
        change(&mut candidate);
        let identity = inner.commit(candidate)?;
        self.persist(&inner);
        Ok(identity)
    }
}

fn checked_name(namespace: Namespace, raw: &str) -> Result<&str, RegistryError> {
    let name = namespace.normalize(raw);
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidName(raw.to_string()));
    }
    Ok(name)
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("identities", &self.len())
            .field("store", &self.store)
            .finish()
    }
}
