//! End-to-end protect/unprotect through the public API.
//!
//! Covers round-trips for both envelope versions, purpose isolation,
//! tamper sensitivity per envelope region, and malformed input.

use proptest::prelude::*;
use std::sync::Arc;
use warden_crypto::payload::{self, HEADER_SIZE};
use warden_crypto::{
    Algorithm, FormatError, Key, KeyRing, ProtectError, Protector, Provider, KEY_ID_SIZE,
    TAG_SIZE,
};

fn provider(algorithm: Algorithm) -> Provider {
    let ring = KeyRing::new();
    ring.add_key(Key::generate(algorithm, 0, None)).unwrap();
    Provider::new(Arc::new(ring))
}

fn chain(provider: &Provider, purposes: &[&str]) -> Protector {
    let (first, rest) = purposes.split_first().unwrap();
    let mut protector = provider.create_protector(first).unwrap();
    for purpose in rest {
        protector = protector.create_protector(purpose).unwrap();
    }
    protector
}

fn arb_algorithm() -> impl Strategy<Value = Algorithm> {
    prop_oneof![
        Just(Algorithm::XChaCha20Poly1305),
        Just(Algorithm::Aes256Gcm)
    ]
}

fn arb_purposes() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z0-9.]{1,12}", 1..5)
}

#[test]
fn contoso_scenario() {
    let provider = provider(Algorithm::XChaCha20Poly1305);
    let v1 = provider.create_protector("Contoso.MyClass.v1").unwrap();
    let v2 = provider.create_protector("Contoso.MyClass.v2").unwrap();

    let protected = v1.protect_str("Hello world!").unwrap();
    assert_ne!(protected, "Hello world!");
    assert_eq!(v1.unprotect_str(&protected).unwrap(), "Hello world!");
    assert!(matches!(
        v2.unprotect_str(&protected),
        Err(ProtectError::TamperDetected)
    ));
}

#[test]
fn empty_plaintext_roundtrips() {
    for algorithm in [Algorithm::XChaCha20Poly1305, Algorithm::Aes256Gcm] {
        let protector = provider(algorithm).create_protector("empty").unwrap();
        let envelope = protector.protect(&[]).unwrap();
        assert_eq!(envelope.len(), payload::min_envelope_size(algorithm));
        assert!(protector.unprotect(&envelope).unwrap().is_empty());
    }
}

#[test]
fn envelope_layout() {
    let provider = provider(Algorithm::Aes256Gcm);
    let protector = provider.create_protector("p").unwrap();
    let envelope = protector.protect(b"0123456789").unwrap();

    assert_eq!(envelope[0], payload::VERSION_AES_256_GCM);
    assert_eq!(envelope.len(), 1 + KEY_ID_SIZE + 12 + 10 + TAG_SIZE);

    let id = Protector::peek_key_id(&envelope).unwrap();
    assert_eq!(&envelope[1..HEADER_SIZE], id.as_bytes());
    assert_eq!(provider.key_ring().current_key().unwrap().id(), id);
}

#[test]
fn purpose_order_matters() {
    let provider = provider(Algorithm::XChaCha20Poly1305);
    let ab = chain(&provider, &["A", "B"]);
    let ba = chain(&provider, &["B", "A"]);

    let envelope = ab.protect(b"ordered").unwrap();
    assert_eq!(ab.unprotect(&envelope).unwrap(), b"ordered");
    assert!(matches!(
        ba.unprotect(&envelope),
        Err(ProtectError::TamperDetected)
    ));
}

#[test]
fn purpose_boundaries_are_not_concatenation() {
    let provider = provider(Algorithm::XChaCha20Poly1305);
    let split = chain(&provider, &["ab", "c"]);
    let other_split = chain(&provider, &["a", "bc"]);
    let joined = chain(&provider, &["abc"]);

    let envelope = split.protect(b"x").unwrap();
    for protector in [&other_split, &joined] {
        assert!(matches!(
            protector.unprotect(&envelope),
            Err(ProtectError::TamperDetected)
        ));
    }
}

#[test]
fn equivalent_chains_interoperate() {
    let provider = provider(Algorithm::XChaCha20Poly1305);
    let nested = chain(&provider, &["A", "B", "C"]);
    let rebuilt = provider
        .create_protector("A")
        .unwrap()
        .create_protector("B")
        .unwrap()
        .create_protector("C")
        .unwrap();

    let envelope = nested.protect(b"same chain").unwrap();
    assert_eq!(rebuilt.unprotect(&envelope).unwrap(), b"same chain");
}

#[test]
fn empty_purpose_rejected() {
    let provider = provider(Algorithm::XChaCha20Poly1305);
    assert!(matches!(
        provider.create_protector(""),
        Err(ProtectError::InvalidPurpose)
    ));
    let parent = provider.create_protector("p").unwrap();
    assert!(matches!(
        parent.create_protector(""),
        Err(ProtectError::InvalidPurpose)
    ));
}

#[test]
fn malformed_input() {
    let protector = provider(Algorithm::XChaCha20Poly1305)
        .create_protector("p")
        .unwrap();

    assert!(matches!(
        protector.unprotect(&[]),
        Err(ProtectError::Format(FormatError::TooShort { len: 0, .. }))
    ));
    assert!(matches!(
        protector.unprotect(&[0x7f; 80]),
        Err(ProtectError::Format(FormatError::UnknownVersion(0x7f)))
    ));

    let envelope = protector.protect(b"").unwrap();
    let truncated = &envelope[..envelope.len() - 1];
    assert!(matches!(
        protector.unprotect(truncated),
        Err(ProtectError::Format(FormatError::TooShort { len: 56, min: 57 }))
    ));
}

#[test]
fn tamper_each_region() {
    for algorithm in [Algorithm::XChaCha20Poly1305, Algorithm::Aes256Gcm] {
        let protector = provider(algorithm).create_protector("tamper").unwrap();
        let envelope = protector.protect(b"sixteen byte msg").unwrap();

        for i in 0..envelope.len() {
            let mut forged = envelope.clone();
            forged[i] ^= 0x01;
            let result = protector.unprotect(&forged);
            match i {
                0 => assert!(
                    matches!(result, Err(ProtectError::Format(FormatError::UnknownVersion(_)))),
                    "version byte flip: {result:?}"
                ),
                1..HEADER_SIZE => assert!(
                    matches!(result, Err(ProtectError::KeyNotFound(_))),
                    "key id flip at {i}: {result:?}"
                ),
                _ => assert!(
                    matches!(result, Err(ProtectError::TamperDetected)),
                    "body flip at {i}: {result:?}"
                ),
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn roundtrip_any_payload(
        algorithm in arb_algorithm(),
        purposes in arb_purposes(),
        data in prop::collection::vec(any::<u8>(), 0..2048),
    ) {
        let provider = provider(algorithm);
        let names: Vec<&str> = purposes.iter().map(String::as_str).collect();
        let protector = chain(&provider, &names);

        let envelope = protector.protect(&data).unwrap();
        prop_assert_eq!(envelope.len(), payload::min_envelope_size(algorithm) + data.len());
        prop_assert_eq!(protector.unprotect(&envelope).unwrap(), data);
    }

    #[test]
    fn distinct_purposes_never_cross(
        a in "[a-z]{1,8}",
        b in "[a-z]{1,8}",
        data in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        prop_assume!(a != b);
        let provider = provider(Algorithm::XChaCha20Poly1305);
        let envelope = provider.create_protector(&a).unwrap().protect(&data).unwrap();
        let result = provider.create_protector(&b).unwrap().unprotect(&envelope);
        prop_assert!(matches!(result, Err(ProtectError::TamperDetected)));
    }

    #[test]
    fn random_bit_flip_never_yields_plaintext(
        data in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let protector = provider(Algorithm::Aes256Gcm).create_protector("p").unwrap();
        let mut envelope = protector.protect(&data).unwrap();
        let i = index.index(envelope.len());
        envelope[i] ^= 1 << bit;
        prop_assert!(protector.unprotect(&envelope).is_err());
    }

    #[test]
    fn hierarchical_independence(
        parent in arb_purposes(),
        child in "[a-z]{1,8}",
        data in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let provider = provider(Algorithm::XChaCha20Poly1305);
        let names: Vec<&str> = parent.iter().map(String::as_str).collect();
        let parent = chain(&provider, &names);
        let child = parent.create_protector(&child).unwrap();

        let from_parent = parent.protect(&data).unwrap();
        let from_child = child.protect(&data).unwrap();
        prop_assert!(matches!(child.unprotect(&from_parent), Err(ProtectError::TamperDetected)));
        prop_assert!(matches!(parent.unprotect(&from_child), Err(ProtectError::TamperDetected)));
    }
}
