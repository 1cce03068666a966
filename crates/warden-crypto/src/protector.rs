//! Provider / protector façade
//!
//! A [`Provider`] is the root object: it holds the shared [`KeyRing`] and an
//! optional application discriminator. Every [`Protector`] it hands out owns
//! an immutable purpose chain plus a reference to the same ring. Nothing here
//! exposes key material; callers only ever see envelopes and plaintext.
//!
//! Purpose isolation comes from the chain never being transmitted: unprotect
//! always derives with the protector's own chain, so a payload from another
//! purpose simply fails authentication.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::sync::Arc;

use crate::cipher;
use crate::error::{FormatError, ProtectError, ProtectResult};
use crate::kdf::derive_subkey;
use crate::key::KeyId;
use crate::keyring::KeyRing;
use crate::now_epoch;
use crate::payload::{self, Envelope};
use crate::purpose::PurposeChain;
use crate::time_limited::TimeLimitedProtector;

/// Root of the protector hierarchy.
#[derive(Debug, Clone)]
pub struct Provider {
    ring: Arc<KeyRing>,
    application: Option<Arc<str>>,
}

impl Provider {
    pub fn new(ring: Arc<KeyRing>) -> Self {
        Self {
            ring,
            application: None,
        }
    }

    /// Isolate this provider's payloads from other applications sharing the
    /// ring. An empty name is the same as no name.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        let name: String = name.into();
        self.application = (!name.is_empty()).then(|| Arc::from(name));
        self
    }

    pub fn application_name(&self) -> Option<&str> {
        self.application.as_deref()
    }

    pub fn key_ring(&self) -> &Arc<KeyRing> {
        &self.ring
    }

    /// A protector with chain `[purpose]`.
    pub fn create_protector(&self, purpose: &str) -> ProtectResult<Protector> {
        Ok(Protector {
            ring: Arc::clone(&self.ring),
            application: self.application.clone(),
            chain: PurposeChain::new(purpose)?,
        })
    }
}

/// Successful unprotect with key status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unprotected {
    pub plaintext: Vec<u8>,
    /// The payload's key is no longer the current key; re-protecting the
    /// plaintext moves it onto the current key.
    pub requires_migration: bool,
}

/// Purpose-scoped protect/unprotect handle. Cheap to clone, safe to share
/// across threads.
#[derive(Debug, Clone)]
pub struct Protector {
    ring: Arc<KeyRing>,
    application: Option<Arc<str>>,
    chain: PurposeChain,
}

impl Protector {
    /// A child protector with `sub_purpose` appended to this chain.
    pub fn create_protector(&self, sub_purpose: &str) -> ProtectResult<Protector> {
        Ok(Protector {
            ring: Arc::clone(&self.ring),
            application: self.application.clone(),
            chain: self.chain.child(sub_purpose)?,
        })
    }

    pub fn purposes(&self) -> &PurposeChain {
        &self.chain
    }

    /// Wrap this protector so payloads carry an expiration time.
    pub fn to_time_limited(&self) -> ProtectResult<TimeLimitedProtector> {
        TimeLimitedProtector::new(self)
    }

    /// Encrypt and authenticate `data` under the current key.
    pub fn protect(&self, data: &[u8]) -> ProtectResult<Vec<u8>> {
        let snapshot = self.ring.snapshot();
        let key = snapshot
            .current_key(now_epoch())
            .ok_or(ProtectError::NoActiveKey)?;

        let algorithm = key.algorithm();
        let subkey = derive_subkey(
            key.material(),
            algorithm,
            self.application.as_deref(),
            &self.chain,
        )?;
        let aad = payload::header(algorithm, &key.id());
        let sealed = cipher::seal(algorithm, &subkey, &aad, data)?;

        tracing::debug!(
            key_id = %key.id(),
            %algorithm,
            depth = self.chain.len(),
            len = data.len(),
            "payload protected"
        );
        Ok(Envelope::new(algorithm, key.id(), sealed).to_bytes())
    }

    /// Verify and decrypt an envelope produced by a protector with the same
    /// purpose chain and application.
    pub fn unprotect(&self, data: &[u8]) -> ProtectResult<Vec<u8>> {
        self.unprotect_detailed(data).map(|u| u.plaintext)
    }

    /// As [`Protector::unprotect`], also reporting whether the payload's key
    /// is still the current key.
    pub fn unprotect_detailed(&self, data: &[u8]) -> ProtectResult<Unprotected> {
        let envelope = Envelope::from_bytes(data)?;
        let key_id = envelope.key_id();

        let snapshot = self.ring.snapshot();
        let key = snapshot
            .get(&key_id)
            .ok_or(ProtectError::KeyNotFound(key_id))?;
        if !key.state().can_decrypt() {
            tracing::warn!(%key_id, "unprotect rejected: key revoked");
            return Err(ProtectError::KeyRevoked(key_id));
        }
        if key.algorithm() != envelope.algorithm() {
            // A key only ever writes one version; a mismatch is a forged header.
            tracing::debug!(%key_id, "envelope version does not match key algorithm");
            return Err(ProtectError::TamperDetected);
        }

        let subkey = derive_subkey(
            key.material(),
            key.algorithm(),
            self.application.as_deref(),
            &self.chain,
        )?;
        let plaintext = cipher::open(
            envelope.algorithm(),
            &subkey,
            &envelope.header(),
            envelope.nonce(),
            envelope.ciphertext(),
            envelope.tag(),
        )
        .inspect_err(|_| tracing::debug!(%key_id, "payload authentication failed"))?;

        let requires_migration = snapshot
            .current_key(now_epoch())
            .is_none_or(|current| current.id() != key_id);

        tracing::debug!(%key_id, depth = self.chain.len(), requires_migration, "payload unprotected");
        Ok(Unprotected {
            plaintext,
            requires_migration,
        })
    }

    /// Text convenience: UTF-8 in, URL-safe base64 envelope out.
    pub fn protect_str(&self, data: &str) -> ProtectResult<String> {
        self.protect(data.as_bytes())
            .map(|envelope| URL_SAFE_NO_PAD.encode(envelope))
    }

    /// Text convenience: URL-safe base64 envelope in, UTF-8 out.
    pub fn unprotect_str(&self, data: &str) -> ProtectResult<String> {
        let envelope = URL_SAFE_NO_PAD
            .decode(data)
            .map_err(|e| FormatError::Encoding(e.to_string()))?;
        let plaintext = self.unprotect(&envelope)?;
        String::from_utf8(plaintext).map_err(|e| ProtectError::Encoding(e.to_string()))
    }

    /// Key id embedded in an envelope, without verifying it.
    pub fn peek_key_id(data: &[u8]) -> ProtectResult<KeyId> {
        Ok(Envelope::from_bytes(data)?.key_id())
    }
}
