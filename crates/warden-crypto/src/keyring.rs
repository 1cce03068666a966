//! Copy-on-write key ring
//!
//! Readers take an `Arc` to the current snapshot and never hold the lock while
//! using it. Writers clone the snapshot, apply the change, and swap the `Arc`
//! in a single step, so a reader sees either the old ring or the new ring.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use warden_core::KeyState;

use crate::error::KeyError;
use crate::key::{Key, KeyId};
use crate::now_epoch;

/// An immutable view of every key in the ring at one point in time.
#[derive(Debug, Clone, Default)]
pub struct KeyRingSnapshot {
    keys: HashMap<KeyId, Key>,
}

impl KeyRingSnapshot {
    pub fn get(&self, id: &KeyId) -> Option<&Key> {
        self.keys.get(id)
    }

    /// The key new protections use at `now`.
    ///
    /// Latest activation wins, then latest creation. Remaining ties fall to
    /// the larger id so the choice never depends on map order.
    pub fn current_key(&self, now: u64) -> Option<&Key> {
        self.keys
            .values()
            .filter(|k| k.is_eligible_at(now))
            .max_by_key(|k| (k.activation_at(), k.created_at(), k.id()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.values()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Shared, concurrently readable collection of keys.
#[derive(Debug, Default)]
pub struct KeyRing {
    snapshot: RwLock<Arc<KeyRingSnapshot>>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ring from persisted keys, keeping their stored states.
    pub fn from_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        let ring = Self::new();
        ring.replace_all(keys);
        ring
    }

    /// The current snapshot. Cheap; holds the lock only to clone the `Arc`.
    pub fn snapshot(&self) -> Arc<KeyRingSnapshot> {
        // A poisoned lock still guards a whole snapshot: writers swap the Arc
        // only after the new snapshot is fully built.
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn get_key(&self, id: &KeyId) -> Result<Key, KeyError> {
        self.snapshot()
            .get(id)
            .cloned()
            .ok_or(KeyError::NotFound(*id))
    }

    pub fn current_key(&self) -> Result<Key, KeyError> {
        self.current_key_at(now_epoch())
    }

    pub fn current_key_at(&self, now: u64) -> Result<Key, KeyError> {
        self.snapshot()
            .current_key(now)
            .cloned()
            .ok_or(KeyError::NoActiveKey)
    }

    /// Insert a new key. A `Created` key is activated on insertion.
    ///
    /// Existing keys are never removed or replaced.
    pub fn add_key(&self, key: Key) -> Result<Key, KeyError> {
        let key = match key.state() {
            KeyState::Created => key.transition(KeyState::Active, None)?,
            KeyState::Active => key,
            other => {
                return Err(KeyError::InvalidTransition {
                    id: key.id(),
                    from: other,
                    to: KeyState::Active,
                })
            }
        };
        self.update(|snapshot| {
            if snapshot.keys.contains_key(&key.id()) {
                return Err(KeyError::AlreadyExists(key.id()));
            }
            snapshot.keys.insert(key.id(), key.clone());
            Ok(key)
        })
    }

    /// Stop selecting `id` for new protections; it still decrypts.
    pub fn retire(&self, id: &KeyId) -> Result<Key, KeyError> {
        self.transition(id, KeyState::Retired, None)
    }

    /// Reject `id` for both protect and unprotect.
    pub fn revoke(&self, id: &KeyId, reason: Option<String>) -> Result<Key, KeyError> {
        self.transition(id, KeyState::Revoked, reason)
    }

    /// Revoke every key created at or before `cutoff`. Returns the keys that
    /// changed state; already revoked keys are skipped.
    pub fn revoke_all_created_before(
        &self,
        cutoff: u64,
        reason: Option<String>,
    ) -> Result<Vec<Key>, KeyError> {
        self.update(|snapshot| {
            let mut revoked = Vec::new();
            for key in snapshot.keys.values_mut() {
                if key.created_at() <= cutoff && key.state() != KeyState::Revoked {
                    let next = key.transition(KeyState::Revoked, reason.clone())?;
                    *key = next.clone();
                    revoked.push(next);
                }
            }
            Ok(revoked)
        })
    }

    /// Replace the whole ring, e.g. after reloading from a repository.
    pub fn replace_all(&self, keys: impl IntoIterator<Item = Key>) {
        let snapshot = KeyRingSnapshot {
            keys: keys.into_iter().map(|k| (k.id(), k)).collect(),
        };
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
    }

    fn transition(
        &self,
        id: &KeyId,
        next: KeyState,
        reason: Option<String>,
    ) -> Result<Key, KeyError> {
        self.update(|snapshot| {
            let key = snapshot.keys.get(id).ok_or(KeyError::NotFound(*id))?;
            let updated = key.transition(next, reason)?;
            snapshot.keys.insert(*id, updated.clone());
            Ok(updated)
        })
    }

    /// Copy, mutate, swap. The closure works on a private copy; nothing is
    /// published unless it succeeds.
    fn update<T>(
        &self,
        f: impl FnOnce(&mut KeyRingSnapshot) -> Result<T, KeyError>,
    ) -> Result<T, KeyError> {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = KeyRingSnapshot::clone(&guard);
        let out = f(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }
}
