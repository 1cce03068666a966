use std::sync::Arc;
use warden_crypto::{Algorithm, Key, KeyRing, Protector, Provider};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn protector(algorithm: Algorithm, depth: usize) -> Protector {
    let ring = KeyRing::new();
    ring.add_key(Key::generate(algorithm, 0, None)).unwrap();
    let mut protector = Provider::new(Arc::new(ring))
        .create_protector("bench")
        .unwrap();
    for i in 1..depth {
        protector = protector.create_protector(&format!("level-{i}")).unwrap();
    }
    protector
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_protect_xchacha(bencher: divan::Bencher, size: usize) {
    let protector = protector(Algorithm::XChaCha20Poly1305, 1);
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| protector.protect(divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_protect_aes_gcm(bencher: divan::Bencher, size: usize) {
    let protector = protector(Algorithm::Aes256Gcm, 1);
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| protector.protect(divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_unprotect_xchacha(bencher: divan::Bencher, size: usize) {
    let protector = protector(Algorithm::XChaCha20Poly1305, 1);
    let envelope = protector.protect(&make_data(size)).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| protector.unprotect(divan::black_box(&envelope)).unwrap());
}

/// Subkey derivation cost grows with the purpose chain.
#[divan::bench(args = [1, 4, 16])]
fn bench_protect_small_by_depth(bencher: divan::Bencher, depth: usize) {
    let protector = protector(Algorithm::XChaCha20Poly1305, depth);
    let data = make_data(64);
    bencher.bench(|| protector.protect(divan::black_box(&data)).unwrap());
}

fn main() {
    divan::main();
}
