//! Subkey derivation: root key material + purpose chain → per-purpose key
//!
//! One HKDF-SHA256 round binds the algorithm and application discriminator,
//! then one round per purpose, each round keyed by the previous output:
//!
//! ```text
//! k0     = HKDF(salt, ikm = root, info = lp("algorithm") || lp(alg) || lp("application") || lp(app))
//! k(i+1) = HKDF(salt, ikm = k(i), info = u64be(i) || lp(purpose[i]))
//! subkey = k(n)
//! lp(x)  = u64be(len(x)) || x
//! ```
//!
//! Length prefixes make the encoding injective, so `["ab", "c"]` and
//! `["a", "bc"]` never share a round input.

use hkdf::Hkdf;
use sha2::Sha256;
use warden_core::Algorithm;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::ProtectError;
use crate::key::KeyMaterial;
use crate::purpose::PurposeChain;
use crate::KEY_SIZE;

const SUBKEY_SALT: &[u8] = b"warden.subkey.v1";

/// A derived 256-bit AEAD key. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Subkey {
    bytes: [u8; KEY_SIZE],
}

impl Subkey {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for Subkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subkey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the subkey for `chain` under `root`.
///
/// Deterministic in (root material, algorithm, application, chain).
pub(crate) fn derive_subkey(
    root: &KeyMaterial,
    algorithm: Algorithm,
    application: Option<&str>,
    chain: &PurposeChain,
) -> Result<Subkey, ProtectError> {
    let mut context = Vec::new();
    push_length_prefixed(&mut context, b"algorithm");
    push_length_prefixed(&mut context, algorithm.name().as_bytes());
    push_length_prefixed(&mut context, b"application");
    push_length_prefixed(&mut context, application.unwrap_or_default().as_bytes());

    let mut current = Zeroizing::new(hkdf_round(root.as_bytes(), &context)?);

    for (index, purpose) in chain.iter().enumerate() {
        let mut info = Vec::with_capacity(16 + purpose.len());
        info.extend_from_slice(&(index as u64).to_be_bytes());
        push_length_prefixed(&mut info, purpose.as_bytes());
        current = Zeroizing::new(hkdf_round(&current, &info)?);
    }

    Ok(Subkey { bytes: *current })
}

fn hkdf_round(ikm: &[u8; KEY_SIZE], info: &[u8]) -> Result<[u8; KEY_SIZE], ProtectError> {
    let hkdf = Hkdf::<Sha256>::new(Some(SUBKEY_SALT), ikm);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(info, &mut okm)
        .map_err(|_| ProtectError::Crypto("HKDF expand failed"))?;
    Ok(okm)
}

fn push_length_prefixed(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u64).to_be_bytes());
    buf.extend_from_slice(data);
}
