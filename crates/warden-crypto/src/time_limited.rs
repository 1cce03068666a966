//! Protectors whose payloads expire
//!
//! The expiration is sealed inside the payload, so it is covered by the
//! authentication tag:
//!
//! ```text
//! plaintext' = [8 bytes: expiration, unix seconds, big-endian][plaintext]
//! ```

use crate::error::{FormatError, ProtectError, ProtectResult};
use crate::now_epoch;
use crate::protector::Protector;

/// Purpose appended to the wrapped protector's chain, so time-limited
/// payloads never unprotect through the plain protector and vice versa.
pub const TIME_LIMITED_PURPOSE: &str = "warden.time-limited.v1";

const EXPIRATION_SIZE: usize = 8;

#[derive(Debug, Clone)]
pub struct TimeLimitedProtector {
    inner: Protector,
}

impl TimeLimitedProtector {
    pub(crate) fn new(parent: &Protector) -> ProtectResult<Self> {
        Ok(Self {
            inner: parent.create_protector(TIME_LIMITED_PURPOSE)?,
        })
    }

    /// A time-limited child with `sub_purpose` appended.
    pub fn create_protector(&self, sub_purpose: &str) -> ProtectResult<Self> {
        Ok(Self {
            inner: self.inner.create_protector(sub_purpose)?,
        })
    }

    /// Protect `data` until `expires_at` (unix seconds).
    pub fn protect_until(&self, data: &[u8], expires_at: u64) -> ProtectResult<Vec<u8>> {
        let mut framed = Vec::with_capacity(EXPIRATION_SIZE + data.len());
        framed.extend_from_slice(&expires_at.to_be_bytes());
        framed.extend_from_slice(data);
        self.inner.protect(&framed)
    }

    /// Protect `data` for `lifetime_secs` from now.
    pub fn protect_for(&self, data: &[u8], lifetime_secs: u64) -> ProtectResult<Vec<u8>> {
        self.protect_until(data, now_epoch().saturating_add(lifetime_secs))
    }

    /// Returns the plaintext and its expiration.
    pub fn unprotect(&self, data: &[u8]) -> ProtectResult<(Vec<u8>, u64)> {
        self.unprotect_at(data, now_epoch())
    }

    /// As [`TimeLimitedProtector::unprotect`], evaluated at `now`.
    pub fn unprotect_at(&self, data: &[u8], now: u64) -> ProtectResult<(Vec<u8>, u64)> {
        let mut framed = self.inner.unprotect(data)?;
        if framed.len() < EXPIRATION_SIZE {
            return Err(FormatError::TooShort {
                len: framed.len(),
                min: EXPIRATION_SIZE,
            }
            .into());
        }

        let mut expiration = [0u8; EXPIRATION_SIZE];
        expiration.copy_from_slice(&framed[..EXPIRATION_SIZE]);
        let expires_at = u64::from_be_bytes(expiration);
        if now >= expires_at {
            return Err(ProtectError::PayloadExpired {
                expired_at: expires_at,
            });
        }

        framed.drain(..EXPIRATION_SIZE);
        Ok((framed, expires_at))
    }
}
