//! # Ledger-Core Benchmarks
//!
//! | Crate | Operation | Expected cost |
//! |-------|-----------|---------------|
//! | lc-04 | history append | O(log n) amortized |
//! | lc-04 | inclusion proof | O(log n) |
//! | lc-04 | sign + verify | one Ed25519 signature each |
//! | lc-03 | dispatch + commit | dominated by script evaluation |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lc_02_script_runtime::Script;
use lc_03_script_dispatch::Request;
use lc_04_commit_signatures::{CommitSignatureProtocol, MerkleHistory, SeededNonceSource};
use node_runtime::{LedgerNode, NodeConfig};
use rand::Rng;
use serde_json::json;
use shared_crypto::Ed25519KeyPair;
use std::time::Duration;

fn random_digests(count: usize) -> Vec<[u8; 32]> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let mut digest = [0u8; 32];
            rng.fill(&mut digest);
            digest
        })
        .collect()
}

// ============================================================================
// LC-04: Merkle History
// ============================================================================

fn bench_merkle_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("lc-04-merkle-history");
    group.measurement_time(Duration::from_secs(5));

    for count in [100, 1_000, 10_000] {
        let digests = random_digests(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("append", count), &digests, |b, digests| {
            b.iter(|| black_box(MerkleHistory::from_digests(digests).root()))
        });

        let history = MerkleHistory::from_digests(&digests);
        let root = history.root();
        let index = (count / 2) as u64;
        group.bench_with_input(BenchmarkId::new("prove_and_verify", count), &history, |b, history| {
            b.iter(|| {
                let proof = history.inclusion_proof(index).unwrap();
                black_box(MerkleHistory::verify_inclusion(&proof, &digests[index as usize], &root))
            })
        });
    }

    group.finish();
}

// ============================================================================
// LC-04: Commit Signatures
// ============================================================================

fn bench_commit_signature(c: &mut Criterion) {
    let mut group = c.benchmark_group("lc-04-commit-signature");

    let digests = random_digests(1_000);
    group.bench_function("sign_after_1000_entries", |b| {
        b.iter_with_setup(
            || {
                let mut signer = CommitSignatureProtocol::new(
                    Ed25519KeyPair::from_seed([1; 32]),
                    SeededNonceSource::new(1),
                );
                for (i, digest) in digests.iter().enumerate() {
                    signer.append_entry(i as u64 + 1, digest).unwrap();
                }
                signer
            },
            |mut signer| black_box(signer.sign(1).unwrap()),
        )
    });

    let mut signer = CommitSignatureProtocol::new(
        Ed25519KeyPair::from_seed([2; 32]),
        SeededNonceSource::new(2),
    );
    for (i, digest) in digests.iter().enumerate() {
        signer.append_entry(i as u64 + 1, digest).unwrap();
    }
    let signature = signer.sign(1).unwrap().unwrap();
    group.bench_function("verify", |b| b.iter(|| black_box(signature.verify().is_ok())));

    group.finish();
}

// ============================================================================
// LC-03: Dispatch through a node
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("lc-03-dispatch");
    group.measurement_time(Duration::from_secs(5));

    let mut config = NodeConfig::default();
    config.signing.signature_interval = 100;
    let node = LedgerNode::with_signer(
        config,
        Ed25519KeyPair::from_seed([3; 32]),
        SeededNonceSource::new(3),
    )
    .unwrap();
    node.install_script(
        "POST put",
        &Script::from_program(&json!({"$do": [
            {"$put": ["pub0", {"$var": "args.body.k"}, {"$var": "args.body.v"}]},
            {"result": true}
        ]})),
    )
    .unwrap();
    node.install_script(
        "GET get",
        &Script::from_program(&json!({"result": {"$get": ["pub0", {"$var": "args.body.k"}]}})),
    )
    .unwrap();

    let mut i = 0u64;
    group.bench_function("write_request", |b| {
        b.iter(|| {
            i += 1;
            let request = Request::new("POST", "put").with_body(json!({"k": i % 64, "v": i}));
            black_box(node.handle_request(&request))
        })
    });

    let read = Request::new("GET", "get").with_body(json!({"k": 1}));
    group.bench_function("read_request", |b| b.iter(|| black_box(node.handle_request(&read))));

    group.finish();
}

criterion_group!(
    benches,
    bench_merkle_history,
    bench_commit_signature,
    bench_dispatch,
);
criterion_main!(benches);
