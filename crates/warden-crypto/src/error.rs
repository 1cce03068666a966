//! Error taxonomy for protect/unprotect and key administration

use thiserror::Error;
use warden_core::KeyState;

use crate::key::KeyId;

/// Outcome of a failed protect or unprotect call.
///
/// `TamperDetected` carries no detail. A payload protected under a different
/// purpose chain and a payload with a flipped bit look the same to the caller.
#[derive(Debug, Error)]
pub enum ProtectError {
    #[error("no active key is available for new protections")]
    NoActiveKey,

    #[error("key {0} not found in key ring")]
    KeyNotFound(KeyId),

    #[error("key {0} has been revoked")]
    KeyRevoked(KeyId),

    #[error("malformed payload: {0}")]
    Format(#[from] FormatError),

    #[error("payload authentication failed")]
    TamperDetected,

    #[error("payload expired at {expired_at} (unix seconds)")]
    PayloadExpired { expired_at: u64 },

    #[error("purpose strings must not be empty")]
    InvalidPurpose,

    #[error("text encoding error: {0}")]
    Encoding(String),

    #[error("cryptographic primitive failure: {0}")]
    Crypto(&'static str),
}

/// Envelope rejected before any cryptographic work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("payload too short: {len} bytes (minimum {min})")]
    TooShort { len: usize, min: usize },

    #[error("unrecognized envelope version 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("invalid payload encoding: {0}")]
    Encoding(String),
}

/// Failure of a key ring or key manager operation.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key {0} not found in key ring")]
    NotFound(KeyId),

    #[error("no active key is available")]
    NoActiveKey,

    #[error("key {0} already exists in key ring")]
    AlreadyExists(KeyId),

    #[error("key {id}: illegal lifecycle transition {from} -> {to}")]
    InvalidTransition {
        id: KeyId,
        from: KeyState,
        to: KeyState,
    },

    #[error("key repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

pub type ProtectResult<T> = Result<T, ProtectError>;
