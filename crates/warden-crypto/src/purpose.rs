//! Ordered, immutable purpose chains

use std::fmt;
use std::sync::Arc;

use crate::error::ProtectError;

/// The derivation context of a protector: an ordered list of non-empty
/// purpose strings. `[A, B]` and `[B, A]` are different chains.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PurposeChain {
    purposes: Arc<[String]>,
}

impl PurposeChain {
    /// A single-element chain.
    pub fn new(purpose: &str) -> Result<Self, ProtectError> {
        Self::from_purposes([purpose])
    }

    /// Build a chain from an ordered sequence of purposes.
    pub fn from_purposes<I, S>(purposes: I) -> Result<Self, ProtectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let purposes = purposes
            .into_iter()
            .map(|p| validate(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if purposes.is_empty() {
            return Err(ProtectError::InvalidPurpose);
        }
        Ok(Self {
            purposes: purposes.into(),
        })
    }

    /// A new chain with `purpose` appended. `self` is unchanged.
    pub fn child(&self, purpose: &str) -> Result<Self, ProtectError> {
        let purpose = validate(purpose)?;
        let mut purposes = Vec::with_capacity(self.purposes.len() + 1);
        purposes.extend(self.purposes.iter().cloned());
        purposes.push(purpose);
        Ok(Self {
            purposes: purposes.into(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.purposes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.purposes.len()
    }

    /// Always false; a chain holds at least one purpose.
    pub fn is_empty(&self) -> bool {
        self.purposes.is_empty()
    }
}

fn validate(purpose: &str) -> Result<String, ProtectError> {
    if purpose.is_empty() {
        return Err(ProtectError::InvalidPurpose);
    }
    Ok(purpose.to_owned())
}

impl fmt::Debug for PurposeChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.purposes.iter()).finish()
    }
}
