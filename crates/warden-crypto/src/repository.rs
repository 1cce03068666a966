//! Key persistence
//!
//! The key ring never touches storage itself. A [`KeyRepository`] is loaded
//! up front by the key manager, and new or transitioned keys are written back
//! through it. Two backends ship here:
//!
//! - [`MemoryKeyRepository`]: process-local, for tests and ephemeral keys
//! - [`FileKeyRepository`]: one JSON document per key, `key-<uuid>.json`
//!
//! The serialized record carries raw material and stays inside this crate:
//!
//! ```compile_fail
//! use warden_crypto::repository::KeyRecord;
//! ```

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use warden_core::{Algorithm, KeyState};
use zeroize::{Zeroize, Zeroizing};

use crate::key::{Key, KeyId, KeyMaterial};
use crate::KEY_SIZE;

/// Storage backend for keys.
pub trait KeyRepository: Send + Sync {
    /// Every key the repository holds, in any order.
    fn load_all_keys(&self) -> Result<Vec<Key>>;

    /// Insert or overwrite the key with `key.id()`.
    fn save_key(&self, key: &Key) -> Result<()> {
        anyhow::bail!("repository is read-only; cannot save key {}", key.id())
    }
}

/// Serialized form of a key. Material is base64 and wiped on drop.
#[derive(Serialize, Deserialize)]
pub(crate) struct KeyRecord {
    pub(crate) id: String,
    pub(crate) algorithm: Algorithm,
    pub(crate) created_at: u64,
    pub(crate) activation_at: u64,
    #[serde(default)]
    pub(crate) expiration_at: Option<u64>,
    pub(crate) state: KeyState,
    #[serde(default)]
    pub(crate) revocation_reason: Option<String>,
    pub(crate) material: String,
}

impl KeyRecord {
    pub(crate) fn from_key(key: &Key) -> Self {
        Self {
            id: key.id().to_string(),
            algorithm: key.algorithm(),
            created_at: key.created_at(),
            activation_at: key.activation_at(),
            expiration_at: key.expiration_at(),
            state: key.state(),
            revocation_reason: key.revocation_reason().map(str::to_owned),
            material: STANDARD.encode(key.material().as_bytes()),
        }
    }

    pub(crate) fn to_key(&self) -> Result<Key> {
        let id: KeyId = self
            .id
            .parse()
            .with_context(|| format!("invalid key id {:?}", self.id))?;

        let decoded = Zeroizing::new(
            STANDARD
                .decode(&self.material)
                .with_context(|| format!("key {id}: material is not valid base64"))?,
        );
        if decoded.len() != KEY_SIZE {
            anyhow::bail!(
                "key {id}: material has wrong size: {} bytes (expected {KEY_SIZE})",
                decoded.len()
            );
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);

        Ok(Key::from_parts(
            id,
            self.algorithm,
            self.created_at,
            self.activation_at,
            self.expiration_at,
            self.state,
            self.revocation_reason.clone(),
            KeyMaterial::from_bytes(bytes),
        ))
    }
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.material.zeroize();
    }
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRecord")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("state", &self.state)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// In-process repository.
#[derive(Debug, Default)]
pub struct MemoryKeyRepository {
    keys: Mutex<BTreeMap<KeyId, Key>>,
}

impl MemoryKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyRepository for MemoryKeyRepository {
    fn load_all_keys(&self) -> Result<Vec<Key>> {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.values().cloned().collect())
    }

    fn save_key(&self, key: &Key) -> Result<()> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.insert(key.id(), key.clone());
        Ok(())
    }
}

/// Directory of JSON key documents.
///
/// Material is stored unencrypted; protect the directory with filesystem
/// permissions. On Unix, files are created with mode 0600.
#[derive(Debug, Clone)]
pub struct FileKeyRepository {
    dir: PathBuf,
    mode_check: bool,
}

impl FileKeyRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mode_check: true,
        }
    }

    /// Enable or disable the warning for group/world-readable key files.
    pub fn with_mode_check(mut self, enabled: bool) -> Self {
        self.mode_check = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &KeyId) -> PathBuf {
        self.dir.join(format!("key-{id}.json"))
    }

    fn load_file(&self, path: &Path) -> Result<Key> {
        if self.mode_check {
            warn_if_readable_by_others(path);
        }
        let content = Zeroizing::new(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading key file: {}", path.display()))?,
        );
        let record: KeyRecord = serde_json::from_str(&content)
            .with_context(|| format!("parsing key file: {}", path.display()))?;
        record
            .to_key()
            .with_context(|| format!("decoding key file: {}", path.display()))
    }
}

impl KeyRepository for FileKeyRepository {
    fn load_all_keys(&self) -> Result<Vec<Key>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("listing key directory: {}", self.dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !(name.starts_with("key-") && name.ends_with(".json")) {
                continue;
            }
            keys.push(self.load_file(&entry.path())?);
        }

        tracing::debug!(dir = %self.dir.display(), count = keys.len(), "keys loaded");
        Ok(keys)
    }

    fn save_key(&self, key: &Key) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating key directory: {}", self.dir.display()))?;

        let record = KeyRecord::from_key(key);
        let json = Zeroizing::new(
            serde_json::to_string_pretty(&record).context("serializing key record")?,
        );

        let path = self.path_for(&key.id());
        atomic_write(&path, json.as_bytes())?;

        tracing::warn!(
            key_id = %key.id(),
            path = %path.display(),
            "key material stored unencrypted at rest"
        );
        Ok(())
    }
}

/// Write to a temp file in the same directory, then rename over `path`, so
/// concurrent loaders never read a partial document.
fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    write_private(&tmp_path, content)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}

#[cfg(unix)]
fn warn_if_readable_by_others(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                mode = %format!("{:o}", mode & 0o777),
                "key file is readable by group or others"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_readable_by_others(_path: &Path) {}
