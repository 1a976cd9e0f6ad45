//! # Structure Benchmarks
//!
//! Measures copy-on-write branching, pruning, and separability removal.
//!
//! Run: `cargo bench --bench structure_bench`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qbdt_node::{Hadamard, QbdtNode, QuantumGate, RotationY};
use std::sync::Arc;

fn plus_state(qubits: u32) -> QbdtNode {
    let mut root = (*QbdtNode::basis_state(qubits, 0)).clone();
    for target in 0..qubits {
        root.apply_single(&Hadamard.matrix(), target, qubits).unwrap();
    }
    root
}

/// Branch (full unshare) followed by Prune (re-share)
fn bench_branch_prune(c: &mut Criterion) {
    let mut group = c.benchmark_group("branch_prune");

    for qubits in [8u32, 12] {
        let root = plus_state(qubits);
        group.bench_with_input(BenchmarkId::new("sequential", qubits), &root, |b, root| {
            b.iter(|| {
                let mut copy = root.clone();
                copy.branch(qubits, 0).unwrap();
                copy.prune(qubits, 0).unwrap();
                black_box(copy)
            })
        });
        group.bench_with_input(BenchmarkId::new("parallel", qubits), &root, |b, root| {
            b.iter(|| {
                let mut copy = root.clone();
                copy.branch(qubits, 3).unwrap();
                copy.prune(qubits, 3).unwrap();
                black_box(copy)
            })
        });
    }

    group.finish();
}

/// Insert a 2-qubit factor and take it back out
fn bench_insert_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_remove");

    let mut chain = (*QbdtNode::basis_state(2, 0)).clone();
    chain.apply_single(&RotationY::new(0.9).matrix(), 0, 2).unwrap();
    chain.apply_single(&Hadamard.matrix(), 1, 2).unwrap();
    let chain = Arc::new(chain);

    for qubits in [6u32, 12] {
        let root = plus_state(qubits);
        group.bench_with_input(BenchmarkId::new("middle", qubits), &root, |b, root| {
            b.iter(|| {
                let mut copy = root.clone();
                copy.insert_at_depth(&chain, qubits / 2, 2, 0).unwrap();
                let removed = copy.remove_separable_at_depth(qubits / 2, 2, 0).unwrap();
                black_box((copy, removed))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_branch_prune, bench_insert_remove);
criterion_main!(benches);
