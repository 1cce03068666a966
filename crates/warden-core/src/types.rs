use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated encryption algorithm a key is bound to.
///
/// Every algorithm maps to exactly one envelope version byte, which in turn
/// fixes the nonce width of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Algorithm {
    /// XChaCha20-Poly1305, 192-bit random nonce (envelope version 1)
    #[default]
    #[serde(rename = "xchacha20-poly1305")]
    XChaCha20Poly1305,
    /// AES-256-GCM, 96-bit random nonce (envelope version 2)
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

impl Algorithm {
    /// Stable name, bound into subkey derivation.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::XChaCha20Poly1305 => "xchacha20-poly1305",
            Algorithm::Aes256Gcm => "aes-256-gcm",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    /// Generated but not yet added to a ring
    Created,
    /// Eligible for new protections (once its activation time has passed)
    Active,
    /// Decrypt-only; never selected for new protections
    Retired,
    /// Rejected for both protect and unprotect
    Revoked,
}

impl KeyState {
    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Revoked is terminal. Retired can only be revoked.
    pub fn can_transition_to(self, next: KeyState) -> bool {
        use KeyState::*;
        matches!(
            (self, next),
            (Created, Active)
                | (Created, Revoked)
                | (Active, Retired)
                | (Active, Revoked)
                | (Retired, Revoked)
        )
    }

    /// Whether payloads referencing a key in this state may still be unprotected.
    pub fn can_decrypt(self) -> bool {
        !matches!(self, KeyState::Revoked)
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyState::Created => "created",
            KeyState::Active => "active",
            KeyState::Retired => "retired",
            KeyState::Revoked => "revoked",
        };
        f.write_str(s)
    }
}
