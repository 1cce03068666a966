//! Key records: identity, lifecycle metadata, and zeroizing raw material

use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use warden_core::{Algorithm, KeyState};
use zeroize::Zeroize;

use crate::error::KeyError;
use crate::{now_epoch, KEY_ID_SIZE, KEY_SIZE};

/// 128-bit key identifier (UUID v4), embedded in every envelope.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(uuid::Uuid);

impl KeyId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; KEY_ID_SIZE]) -> Self {
        Self(uuid::Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_ID_SIZE] {
        self.0.as_bytes()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.0.hyphenated())
    }
}

impl FromStr for KeyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

/// Raw 256-bit root key material. Zeroized on drop.
pub(crate) struct KeyMaterial {
    bytes: [u8; KEY_SIZE],
}

impl KeyMaterial {
    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub(crate) fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// An immutable key record.
///
/// Lifecycle changes produce a new `Key` sharing the same material; the
/// material itself is only reachable inside this crate.
#[derive(Clone)]
pub struct Key {
    id: KeyId,
    algorithm: Algorithm,
    created_at: u64,
    activation_at: u64,
    expiration_at: Option<u64>,
    state: KeyState,
    revocation_reason: Option<String>,
    material: Arc<KeyMaterial>,
}

impl Key {
    /// Generate a new key in the `Created` state with fresh random material.
    ///
    /// Times are Unix seconds. A key without an expiration never expires.
    pub fn generate(algorithm: Algorithm, activation_at: u64, expiration_at: Option<u64>) -> Self {
        Self {
            id: KeyId::generate(),
            algorithm,
            created_at: now_epoch(),
            activation_at,
            expiration_at,
            state: KeyState::Created,
            revocation_reason: None,
            material: Arc::new(KeyMaterial::generate()),
        }
    }

    /// Reassemble a persisted key.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: KeyId,
        algorithm: Algorithm,
        created_at: u64,
        activation_at: u64,
        expiration_at: Option<u64>,
        state: KeyState,
        revocation_reason: Option<String>,
        material: KeyMaterial,
    ) -> Self {
        Self {
            id,
            algorithm,
            created_at,
            activation_at,
            expiration_at,
            state,
            revocation_reason,
            material: Arc::new(material),
        }
    }

    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn activation_at(&self) -> u64 {
        self.activation_at
    }

    pub fn expiration_at(&self) -> Option<u64> {
        self.expiration_at
    }

    pub fn state(&self) -> KeyState {
        self.state
    }

    pub fn revocation_reason(&self) -> Option<&str> {
        self.revocation_reason.as_deref()
    }

    /// Whether this key may be selected for new protections at `now`.
    pub fn is_eligible_at(&self, now: u64) -> bool {
        self.state == KeyState::Active
            && self.activation_at <= now
            && self.expiration_at.is_none_or(|exp| exp > now)
    }

    pub(crate) fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Produce the same key in state `next`, validating the lifecycle.
    pub(crate) fn transition(&self, next: KeyState, reason: Option<String>) -> Result<Key, KeyError> {
        if !self.state.can_transition_to(next) {
            return Err(KeyError::InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        let mut key = self.clone();
        key.state = next;
        if next == KeyState::Revoked {
            key.revocation_reason = reason;
        }
        Ok(key)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .field("activation_at", &self.activation_at)
            .field("expiration_at", &self.expiration_at)
            .field("state", &self.state)
            .field("material", &"[REDACTED]")
            .finish()
    }
}
