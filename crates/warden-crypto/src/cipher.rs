//! AEAD seal/open over a derived subkey
//!
//! Tags are detached so the envelope can carry them as a separate field.
//! Both primitives verify the tag in constant time before producing any
//! plaintext; on failure the working buffer is wiped and nothing is returned.

use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    XChaCha20Poly1305,
};
use rand::RngCore;
use warden_core::Algorithm;
use zeroize::Zeroize;

use crate::error::ProtectError;
use crate::kdf::Subkey;
use crate::payload::nonce_size;
use crate::TAG_SIZE;

/// Output of a seal: fresh nonce, ciphertext, detached tag.
#[derive(Debug, Clone)]
pub(crate) struct Sealed {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

/// Encrypt and authenticate `plaintext` with a fresh random nonce.
pub(crate) fn seal(
    algorithm: Algorithm,
    subkey: &Subkey,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Sealed, ProtectError> {
    let mut nonce = vec![0u8; nonce_size(algorithm)];
    rand::thread_rng().fill_bytes(&mut nonce);

    let mut buffer = plaintext.to_vec();
    let tag = match algorithm {
        Algorithm::XChaCha20Poly1305 => {
            let cipher = XChaCha20Poly1305::new(subkey.as_bytes().into());
            cipher
                .encrypt_in_place_detached(
                    chacha20poly1305::XNonce::from_slice(&nonce),
                    aad,
                    &mut buffer,
                )
                .map(|tag| tag_bytes(&tag))
        }
        Algorithm::Aes256Gcm => {
            let cipher = Aes256Gcm::new(subkey.as_bytes().into());
            cipher
                .encrypt_in_place_detached(aes_gcm::Nonce::from_slice(&nonce), aad, &mut buffer)
                .map(|tag| tag_bytes(&tag))
        }
    };

    match tag {
        Ok(tag) => Ok(Sealed {
            nonce,
            ciphertext: buffer,
            tag,
        }),
        Err(_) => {
            buffer.zeroize();
            Err(ProtectError::Crypto("AEAD encryption failed"))
        }
    }
}

fn tag_bytes(tag: &[u8]) -> [u8; TAG_SIZE] {
    let mut out = [0u8; TAG_SIZE];
    out.copy_from_slice(tag);
    out
}

/// Verify and decrypt. Any mismatch is `TamperDetected`.
///
/// `nonce` must have the width `nonce_size(algorithm)`; envelopes parsed by
/// [`crate::payload::Envelope::from_bytes`] always do.
pub(crate) fn open(
    algorithm: Algorithm,
    subkey: &Subkey,
    aad: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
) -> Result<Vec<u8>, ProtectError> {
    if nonce.len() != nonce_size(algorithm) {
        return Err(ProtectError::TamperDetected);
    }

    let mut buffer = ciphertext.to_vec();
    let result = match algorithm {
        Algorithm::XChaCha20Poly1305 => {
            let cipher = XChaCha20Poly1305::new(subkey.as_bytes().into());
            cipher.decrypt_in_place_detached(
                chacha20poly1305::XNonce::from_slice(nonce),
                aad,
                &mut buffer,
                chacha20poly1305::Tag::from_slice(tag),
            )
        }
        Algorithm::Aes256Gcm => {
            let cipher = Aes256Gcm::new(subkey.as_bytes().into());
            cipher.decrypt_in_place_detached(
                aes_gcm::Nonce::from_slice(nonce),
                aad,
                &mut buffer,
                aes_gcm::Tag::from_slice(tag),
            )
        }
    };

    match result {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            Err(ProtectError::TamperDetected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_subkey;
    use crate::key::KeyMaterial;
    use crate::purpose::PurposeChain;
    use crate::KEY_SIZE;

    const ALGORITHMS: [Algorithm; 2] = [Algorithm::XChaCha20Poly1305, Algorithm::Aes256Gcm];

    fn subkey(algorithm: Algorithm, purpose: &str) -> Subkey {
        let root = KeyMaterial::from_bytes([9u8; KEY_SIZE]);
        derive_subkey(&root, algorithm, None, &PurposeChain::new(purpose).unwrap()).unwrap()
    }

    #[test]
    fn test_seal_open_roundtrip() {
        for algorithm in ALGORITHMS {
            let key = subkey(algorithm, "p");
            let sealed = seal(algorithm, &key, b"aad", b"hello, sealed world!").unwrap();
            let opened = open(
                algorithm,
                &key,
                b"aad",
                &sealed.nonce,
                &sealed.ciphertext,
                &sealed.tag,
            )
            .unwrap();
            assert_eq!(opened, b"hello, sealed world!");
        }
    }

    #[test]
    fn test_sizes() {
        for algorithm in ALGORITHMS {
            let key = subkey(algorithm, "p");
            let sealed = seal(algorithm, &key, b"", &[0u8; 1000]).unwrap();
            assert_eq!(sealed.nonce.len(), nonce_size(algorithm));
            assert_eq!(sealed.ciphertext.len(), 1000);
        }
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = subkey(Algorithm::XChaCha20Poly1305, "p");
        let a = seal(Algorithm::XChaCha20Poly1305, &key, b"", b"same").unwrap();
        let b = seal(Algorithm::XChaCha20Poly1305, &key, b"", b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_subkey_fails() {
        for algorithm in ALGORITHMS {
            let sealed = seal(algorithm, &subkey(algorithm, "a"), b"", b"secret").unwrap();
            let result = open(
                algorithm,
                &subkey(algorithm, "b"),
                b"",
                &sealed.nonce,
                &sealed.ciphertext,
                &sealed.tag,
            );
            assert!(matches!(result, Err(ProtectError::TamperDetected)));
        }
    }

    #[test]
    fn test_aad_mismatch_fails() {
        let algorithm = Algorithm::Aes256Gcm;
        let key = subkey(algorithm, "p");
        let sealed = seal(algorithm, &key, b"header-1", b"secret").unwrap();
        let result = open(
            algorithm,
            &key,
            b"header-2",
            &sealed.nonce,
            &sealed.ciphertext,
            &sealed.tag,
        );
        assert!(matches!(result, Err(ProtectError::TamperDetected)));
    }

    #[test]
    fn test_tampered_tag_fails() {
        for algorithm in ALGORITHMS {
            let key = subkey(algorithm, "p");
            let mut sealed = seal(algorithm, &key, b"", b"secret data").unwrap();
            sealed.tag[0] ^= 0x01;
            let result = open(
                algorithm,
                &key,
                b"",
                &sealed.nonce,
                &sealed.ciphertext,
                &sealed.tag,
            );
            assert!(matches!(result, Err(ProtectError::TamperDetected)));
        }
    }

    #[test]
    fn test_wrong_nonce_width_fails() {
        let key = subkey(Algorithm::XChaCha20Poly1305, "p");
        let sealed = seal(Algorithm::XChaCha20Poly1305, &key, b"", b"x").unwrap();
        let result = open(
            Algorithm::XChaCha20Poly1305,
            &key,
            b"",
            &sealed.nonce[..12],
            &sealed.ciphertext,
            &sealed.tag,
        );
        assert!(matches!(result, Err(ProtectError::TamperDetected)));
    }
}
