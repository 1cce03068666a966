//! Key administration: generation, rotation, retirement, revocation
//!
//! The manager is the only writer of the shared [`KeyRing`]. Ordering rules:
//!
//! - new keys are persisted before they are published, so an envelope never
//!   names a key the repository does not hold
//! - retirement and revocation are published first and persisted second, so
//!   a revocation takes effect in-process even if the write fails
//! - administrative calls run one at a time

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use warden_core::{Algorithm, KeyState, WardenConfig};

use crate::error::KeyError;
use crate::key::{Key, KeyId};
use crate::keyring::KeyRing;
use crate::now_epoch;
use crate::protector::Provider;
use crate::repository::{FileKeyRepository, KeyRepository, MemoryKeyRepository};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Key generation policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySettings {
    pub algorithm: Algorithm,
    /// Lifetime of a generated key in seconds
    pub lifetime_secs: u64,
    /// Replace the current key once it expires within this many seconds
    pub renewal_window_secs: u64,
    /// Generate keys automatically in [`KeyManager::ensure_current_key`]
    pub auto_generate: bool,
    pub application_name: Option<String>,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self::from_config(&WardenConfig::default())
    }
}

impl KeySettings {
    pub fn from_config(config: &WardenConfig) -> Self {
        Self {
            algorithm: config.keys.algorithm,
            lifetime_secs: config.keys.lifetime_days.saturating_mul(SECS_PER_DAY),
            renewal_window_secs: config.keys.renewal_window_days.saturating_mul(SECS_PER_DAY),
            auto_generate: config.keys.auto_generate,
            application_name: config.application_name.clone(),
        }
    }
}

/// Owns the repository and the shared ring.
///
/// Administrative calls are serialized on an internal lock; protect and
/// unprotect never take it.
pub struct KeyManager {
    repository: Arc<dyn KeyRepository>,
    ring: Arc<KeyRing>,
    settings: KeySettings,
    admin: Mutex<()>,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("keys", &self.ring.snapshot().len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl KeyManager {
    /// A manager over `repository` with an empty ring; call [`KeyManager::load`].
    pub fn new(repository: Arc<dyn KeyRepository>, settings: KeySettings) -> Self {
        Self {
            repository,
            ring: Arc::new(KeyRing::new()),
            settings,
            admin: Mutex::new(()),
        }
    }

    /// Build the repository named by `config`, load it, and make sure a
    /// current key exists when auto-generation is on.
    pub fn from_config(config: &WardenConfig) -> Result<Self, KeyError> {
        let repository: Arc<dyn KeyRepository> = match &config.repository.directory {
            Some(dir) => Arc::new(
                FileKeyRepository::new(dir).with_mode_check(config.repository.file_mode_check),
            ),
            None => {
                tracing::info!("no key directory configured; keys are kept in memory only");
                Arc::new(MemoryKeyRepository::new())
            }
        };

        let manager = Self::new(repository, KeySettings::from_config(config));
        manager.load()?;
        manager.ensure_current_key()?;
        Ok(manager)
    }

    pub fn settings(&self) -> &KeySettings {
        &self.settings
    }

    pub fn key_ring(&self) -> Arc<KeyRing> {
        Arc::clone(&self.ring)
    }

    /// A provider over this manager's ring, carrying the configured
    /// application name.
    pub fn provider(&self) -> Provider {
        let provider = Provider::new(self.key_ring());
        match &self.settings.application_name {
            Some(name) => provider.with_application_name(name.clone()),
            None => provider,
        }
    }

    /// Replace the ring with the repository's contents. Returns the key count.
    pub fn load(&self) -> Result<usize, KeyError> {
        let _admin = self.lock_admin();
        let keys = self.repository.load_all_keys()?;
        let count = keys.len();
        self.ring.replace_all(keys);
        tracing::info!(count, "key ring loaded");
        Ok(count)
    }

    /// Generate, persist, and publish a key with the configured algorithm.
    pub fn create_key(
        &self,
        activation_at: u64,
        expiration_at: Option<u64>,
    ) -> Result<KeyId, KeyError> {
        let _admin = self.lock_admin();
        self.create_key_locked(activation_at, expiration_at)
    }

    /// Create a key that becomes current immediately and lives for the
    /// configured lifetime. The previous current key is retired, so it keeps
    /// unprotecting but is never selected again even within the same second.
    pub fn rotate(&self) -> Result<KeyId, KeyError> {
        let _admin = self.lock_admin();
        let now = now_epoch();
        let previous = self.ring.snapshot().current_key(now).map(|k| k.id());
        let id =
            self.create_key_locked(now, Some(now.saturating_add(self.settings.lifetime_secs)))?;
        if let Some(previous) = previous {
            self.retire_key_locked(&previous)?;
        }
        Ok(id)
    }

    pub fn retire_key(&self, id: &KeyId) -> Result<(), KeyError> {
        let _admin = self.lock_admin();
        self.retire_key_locked(id)
    }

    pub fn revoke_key(&self, id: &KeyId, reason: Option<String>) -> Result<(), KeyError> {
        let _admin = self.lock_admin();
        let key = self.ring.revoke(id, reason)?;
        self.repository.save_key(&key)?;
        tracing::info!(key_id = %id, reason = key.revocation_reason(), "key revoked");
        Ok(())
    }

    /// Revoke every existing key, then regenerate if auto-generation is on.
    ///
    /// Every revoked key is written back even if an earlier write fails; the
    /// error names the keys that were not persisted. Returns the number of
    /// keys revoked.
    pub fn revoke_all(&self, reason: Option<String>) -> Result<usize, KeyError> {
        let _admin = self.lock_admin();
        let revoked = self.ring.revoke_all_created_before(now_epoch(), reason)?;

        let mut unsaved = Vec::new();
        let mut first_error = None;
        for key in &revoked {
            if let Err(e) = self.repository.save_key(key) {
                unsaved.push(key.id().to_string());
                first_error.get_or_insert(e);
            }
        }
        if let Some(err) = first_error {
            let key_ids = unsaved.join(", ");
            tracing::error!(
                count = unsaved.len(),
                key_ids = %key_ids,
                "revocation not persisted; these keys are active again after a reload"
            );
            return Err(KeyError::Repository(err.context(format!(
                "{} revoked key(s) not persisted: {key_ids}",
                unsaved.len()
            ))));
        }
        tracing::info!(count = revoked.len(), "all keys revoked");

        self.ensure_current_key_locked(now_epoch())?;
        Ok(revoked.len())
    }

    pub fn ensure_current_key(&self) -> Result<Option<KeyId>, KeyError> {
        self.ensure_current_key_at(now_epoch())
    }

    /// Generate a key if none is current at `now`, or if the current key
    /// expires inside the renewal window. The replacement activates when the
    /// current key expires so both stay valid across the handover.
    ///
    /// Returns the new key's id, or `None` when nothing was needed or
    /// auto-generation is off.
    pub fn ensure_current_key_at(&self, now: u64) -> Result<Option<KeyId>, KeyError> {
        let _admin = self.lock_admin();
        self.ensure_current_key_locked(now)
    }

    fn lock_admin(&self) -> MutexGuard<'_, ()> {
        self.admin.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_key_locked(
        &self,
        activation_at: u64,
        expiration_at: Option<u64>,
    ) -> Result<KeyId, KeyError> {
        let key = Key::generate(self.settings.algorithm, activation_at, expiration_at)
            .transition(KeyState::Active, None)?;
        self.repository.save_key(&key)?;
        let key = self.ring.add_key(key)?;

        tracing::info!(
            key_id = %key.id(),
            algorithm = %key.algorithm(),
            activation_at,
            expiration_at,
            "key created"
        );
        Ok(key.id())
    }

    fn retire_key_locked(&self, id: &KeyId) -> Result<(), KeyError> {
        let key = self.ring.retire(id)?;
        self.repository.save_key(&key)?;
        tracing::info!(key_id = %id, "key retired");
        Ok(())
    }

    fn ensure_current_key_locked(&self, now: u64) -> Result<Option<KeyId>, KeyError> {
        if !self.settings.auto_generate {
            return Ok(None);
        }

        let snapshot = self.ring.snapshot();
        let activation_at = match snapshot.current_key(now) {
            None => now,
            Some(current) => match current.expiration_at() {
                Some(exp) if exp <= now.saturating_add(self.settings.renewal_window_secs) => {
                    // A successor already scheduled for the handover is enough.
                    let has_successor = snapshot.keys().any(|k| {
                        k.state() == KeyState::Active
                            && k.activation_at() <= exp
                            && k.activation_at() > current.activation_at()
                            && k.expiration_at().is_none_or(|e| e > exp)
                    });
                    if has_successor {
                        return Ok(None);
                    }
                    exp
                }
                _ => return Ok(None),
            },
        };

        let expiration_at = activation_at.saturating_add(self.settings.lifetime_secs);
        let id = self.create_key_locked(activation_at, Some(expiration_at))?;
        Ok(Some(id))
    }
}
