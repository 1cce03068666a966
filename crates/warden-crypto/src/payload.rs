//! Envelope wire format
//!
//! ```text
//! [1 byte: version][16 bytes: key id][M bytes: nonce][N bytes: ciphertext][16 bytes: tag]
//!
//! version 0x01: XChaCha20-Poly1305, M = 24
//! version 0x02: AES-256-GCM,        M = 12
//! ```
//!
//! The header (`version || key id`) is the AEAD associated data, so a
//! payload cannot be re-labelled with another key id or version.
//! Parsing only checks structure; authenticity is the cipher's job.

use warden_core::Algorithm;

use crate::cipher::Sealed;
use crate::error::FormatError;
use crate::key::KeyId;
use crate::{KEY_ID_SIZE, TAG_SIZE};

pub const VERSION_XCHACHA20_POLY1305: u8 = 0x01;
pub const VERSION_AES_256_GCM: u8 = 0x02;

/// `version || key id`
pub const HEADER_SIZE: usize = 1 + KEY_ID_SIZE;

/// Envelope version byte for `algorithm`.
pub fn version_for(algorithm: Algorithm) -> u8 {
    match algorithm {
        Algorithm::XChaCha20Poly1305 => VERSION_XCHACHA20_POLY1305,
        Algorithm::Aes256Gcm => VERSION_AES_256_GCM,
    }
}

/// Algorithm for an envelope version byte, if recognized.
pub fn algorithm_for(version: u8) -> Option<Algorithm> {
    match version {
        VERSION_XCHACHA20_POLY1305 => Some(Algorithm::XChaCha20Poly1305),
        VERSION_AES_256_GCM => Some(Algorithm::Aes256Gcm),
        _ => None,
    }
}

/// Nonce width for `algorithm`.
pub fn nonce_size(algorithm: Algorithm) -> usize {
    match algorithm {
        Algorithm::XChaCha20Poly1305 => 24,
        Algorithm::Aes256Gcm => 12,
    }
}

/// Smallest well-formed envelope (empty plaintext) for `algorithm`.
pub fn min_envelope_size(algorithm: Algorithm) -> usize {
    HEADER_SIZE + nonce_size(algorithm) + TAG_SIZE
}

/// A parsed (or about to be serialized) envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    algorithm: Algorithm,
    key_id: KeyId,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: [u8; TAG_SIZE],
}

impl Envelope {
    pub(crate) fn new(algorithm: Algorithm, key_id: KeyId, sealed: Sealed) -> Self {
        Self {
            algorithm,
            key_id,
            nonce: sealed.nonce,
            ciphertext: sealed.ciphertext,
            tag: sealed.tag,
        }
    }

    pub fn version(&self) -> u8 {
        version_for(self.algorithm)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn tag(&self) -> &[u8; TAG_SIZE] {
        &self.tag
    }

    /// Associated data for `version || key id`.
    pub fn header(&self) -> [u8; HEADER_SIZE] {
        header(self.algorithm, &self.key_id)
    }

    /// Serialize. Never fails.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(HEADER_SIZE + self.nonce.len() + self.ciphertext.len() + TAG_SIZE);
        out.extend_from_slice(&self.header());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Parse an envelope, rejecting anything structurally invalid.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        let Some(&version) = data.first() else {
            return Err(FormatError::TooShort {
                len: 0,
                min: smallest_envelope(),
            });
        };
        let algorithm = algorithm_for(version).ok_or(FormatError::UnknownVersion(version))?;

        let min = min_envelope_size(algorithm);
        if data.len() < min {
            return Err(FormatError::TooShort {
                len: data.len(),
                min,
            });
        }

        let (header, rest) = data.split_at(HEADER_SIZE);
        let (nonce, rest) = rest.split_at(nonce_size(algorithm));
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_SIZE);

        let mut key_id = [0u8; KEY_ID_SIZE];
        key_id.copy_from_slice(&header[1..]);
        let mut tag_bytes = [0u8; TAG_SIZE];
        tag_bytes.copy_from_slice(tag);

        Ok(Self {
            algorithm,
            key_id: KeyId::from_bytes(key_id),
            nonce: nonce.to_vec(),
            ciphertext: ciphertext.to_vec(),
            tag: tag_bytes,
        })
    }
}

pub(crate) fn header(algorithm: Algorithm, key_id: &KeyId) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    out[0] = version_for(algorithm);
    out[1..].copy_from_slice(key_id.as_bytes());
    out
}

fn smallest_envelope() -> usize {
    [Algorithm::XChaCha20Poly1305, Algorithm::Aes256Gcm]
        .into_iter()
        .map(min_envelope_size)
        .min()
        .unwrap_or(HEADER_SIZE + TAG_SIZE)
}
