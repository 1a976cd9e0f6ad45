//! # Gate Benchmarks
//!
//! Measures gate propagation through compressed trees: product states (pairs
//! agree, scale-only mixing) against dense random states (full push/pop).
//!
//! Run: `cargo bench --bench gate_bench`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qbdt_node::{Complex, Hadamard, PauliX, QbdtNode, QuantumGate, RotationY};

fn random_state(qubits: u32) -> Vec<Complex> {
    let mut seed = 0x2545_f491_4f6c_dd1du64;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed >> 11) as f64 / (1u64 << 53) as f64 - 0.5
    };
    let raw: Vec<Complex> = (0..1usize << qubits)
        .map(|_| Complex::new(next(), next()))
        .collect();
    let norm = raw.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
    raw.into_iter().map(|a| a / norm).collect()
}

/// Hadamard wall on a basis state (stays O(qubits) nodes)
fn bench_product_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("product_state");
    let h = Hadamard.matrix();

    for qubits in [8u32, 16, 32] {
        group.bench_with_input(BenchmarkId::new("hadamard_wall", qubits), &qubits, |b, &n| {
            b.iter(|| {
                let mut root = (*QbdtNode::basis_state(n, 0)).clone();
                for target in 0..n {
                    root.apply_single(&h, target, n).unwrap();
                }
                black_box(root.count_nodes())
            })
        });
    }

    group.finish();
}

/// Single gates on a dense random state
fn bench_dense_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_state");
    let ry = RotationY::new(0.37).matrix();
    let x = PauliX.matrix();

    for qubits in [6u32, 10, 12] {
        let root = QbdtNode::from_state_vector(&random_state(qubits), 0).unwrap();

        group.bench_with_input(BenchmarkId::new("ry_top", qubits), &root, |b, root| {
            b.iter(|| {
                let mut copy = (**root).clone();
                copy.apply_single(&ry, 0, qubits).unwrap();
                black_box(copy)
            })
        });

        group.bench_with_input(BenchmarkId::new("ry_bottom", qubits), &root, |b, root| {
            b.iter(|| {
                let mut copy = (**root).clone();
                copy.apply_single(&ry, qubits - 1, qubits).unwrap();
                black_box(copy)
            })
        });

        group.bench_with_input(BenchmarkId::new("x_middle", qubits), &root, |b, root| {
            b.iter(|| {
                let mut copy = (**root).clone();
                copy.apply_single(&x, qubits / 2, qubits).unwrap();
                black_box(copy)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_product_state, bench_dense_state);
criterion_main!(benches);
