//! # ⚛️ qbdt-node — Quantum Binary Decision Tree
//!
//! Representação comprimida de um vetor de estado: cada nível da árvore é um
//! qubit e a amplitude de |perm⟩ é o produto das escalas complexas ao longo do
//! caminho raiz → terminal. Subárvores iguais são compartilhadas (DAG).
//!
//! ## Computational Complexity
//!
//! **Apply2x2 / PushStateVector — O(N):**
//! - N = distinct nodes below the target level
//! - Pairs whose structures agree mix only their scales (O(1))
//!
//! **Prune — O(N):**
//! - Bottom-up; equal children collapse into one shared handle
//!
//! **RemoveSeparableAtDepth — O(N × 2^size):**
//! - Canonical lift of the whole tree, then one chain comparison per cut node
//!
//! **Memory:**
//! - Product states: O(qubits) nodes
//! - Worst case (fully entangled): O(2^qubits) nodes
//!
//! ## Arquitetura
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │          QbdtNode (Arc-shared DAG)              │
//! │  ┌───────────────────────────────────────────┐  │
//! │  │  BranchNode: scale + [child0, child1]     │  │
//! │  └───────────────────────────────────────────┘  │
//! │  ┌───────────────────────────────────────────┐  │
//! │  │  LeafNode: scale + dense amplitude block  │  │
//! │  └───────────────────────────────────────────┘  │
//! │  ┌───────────────────────────────────────────┐  │
//! │  │  fork_join (bounded parallel recursion)   │  │
//! │  └───────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Exemplo
//!
//! ```
//! use qbdt_node::{Hadamard, QbdtNode, QuantumGate};
//!
//! let mut root = (*QbdtNode::basis_state(2, 0)).clone();
//! root.apply_single(&Hadamard.matrix(), 0, 2).unwrap();
//!
//! let p = root.amplitude(1, 2).norm_sqr();
//! assert!((p - 0.5).abs() < 1e-12);
//! ```

pub mod branch;
pub mod config;
pub mod equality;
pub mod error;
pub mod gates;
pub mod leaf;
pub mod node;
pub mod parallel;

pub use branch::BranchNode;
pub use config::QbdtConfig;
pub use equality::nodes_equal;
pub use error::{NodeVariant, QbdtError, QbdtResult};
pub use gates::{
    Complex, Hadamard, Matrix2x2, MatrixShape, PauliX, PauliY, PauliZ, Phase, QuantumGate,
    RotationX, RotationY, RotationZ, SGate, TGate,
};
pub use leaf::LeafNode;
pub use node::{Branches, NodePtr, NodeView, QbdtNode, select_bit, unshare, zero_ptr};
pub use parallel::{fork_join, try_fork_join};


#[cfg(test)]
mod proptests;
