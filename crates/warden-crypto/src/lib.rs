//! warden-crypto: purpose-scoped authenticated encryption
//!
//! Callers obtain a [`Protector`] for a purpose string and protect/unprotect
//! opaque bytes. Payloads produced under one purpose chain never unprotect
//! under another.
//!
//! Key hierarchy:
//! ```text
//! KeyRing (copy-on-write snapshots, shared by every protector)
//!   └── Key (UUID id, 256-bit random root material, lifecycle state)
//!       └── Subkey = iterative HKDF-SHA256(root, algorithm, application, purpose chain)
//!           └── AEAD: XChaCha20-Poly1305 or AES-256-GCM (nonce=random, AAD=version||key_id)
//! ```
//!
//! Envelope: `[version][key id][nonce][ciphertext][tag]`, see [`payload`].

mod cipher;
pub mod error;
mod kdf;
pub mod key;
pub mod keyring;
pub mod manager;
pub mod payload;
pub mod protector;
pub mod purpose;
pub mod repository;
pub mod time_limited;

pub use error::{FormatError, KeyError, ProtectError, ProtectResult};
pub use key::{Key, KeyId};
pub use keyring::{KeyRing, KeyRingSnapshot};
pub use manager::{KeyManager, KeySettings};
pub use payload::Envelope;
pub use protector::{Protector, Provider, Unprotected};
pub use purpose::PurposeChain;
pub use repository::{FileKeyRepository, KeyRepository, MemoryKeyRepository};
pub use time_limited::TimeLimitedProtector;
pub use warden_core::{Algorithm, KeyState};

/// Size of root key material and derived subkeys in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a key identifier in bytes (UUID)
pub const KEY_ID_SIZE: usize = 16;

/// Size of an AEAD authentication tag (Poly1305 and GHASH)
pub const TAG_SIZE: usize = 16;

pub(crate) fn now_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
