//! Folha densa: bloco contíguo de amplitudes no fundo da árvore
//!
//! The caller's separability threshold decides when a subtree stops branching
//! and becomes a dense block. Only scale-bearing queries and the block's own
//! normalization are available here; structural operations are rejected at
//! [`QbdtNode::as_branch_mut`](crate::QbdtNode::as_branch_mut).

use crate::error::{NodeVariant, QbdtError, QbdtResult};
use crate::gates::{Complex, ZERO, is_norm_zero};
use crate::node::NodeView;

/// Folha com bloco de 2^qubits amplitudes
#[derive(Debug, Clone)]
pub struct LeafNode {
    /// Fator de escala
    pub scale: Complex,
    qubits: u32,
    amps: Vec<Complex>,
}

impl LeafNode {
    /// Cria folha; o bloco precisa ter comprimento potência de dois
    pub fn new(scale: Complex, amps: Vec<Complex>) -> QbdtResult<Self> {
        if !amps.len().is_power_of_two() {
            return Err(QbdtError::InvalidLeaf {
                qubits: amps.len().max(1).ilog2() + 1,
                len: amps.len(),
            });
        }
        Ok(Self {
            scale,
            qubits: amps.len().trailing_zeros(),
            amps,
        })
    }

    /// Número de qubits cobertos pelo bloco
    pub fn qubit_count(&self) -> u32 {
        self.qubits
    }

    /// Bloco de amplitudes (sem a escala)
    pub fn amps(&self) -> &[Complex] {
        &self.amps
    }

    /// Amplitude do bloco para os bits restantes de `index`
    pub fn block_amplitude(&self, index: usize) -> Complex {
        self.amps[index & (self.amps.len() - 1)]
    }

    /// Σ|a|² do bloco
    pub fn block_norm_sqr(&self) -> f64 {
        self.amps.iter().map(|a| a.norm_sqr()).sum()
    }

    /// Probabilidade total incluindo a escala
    pub fn probability(&self) -> f64 {
        self.scale.norm_sqr() * self.block_norm_sqr()
    }

    /// Zera escala e bloco
    pub fn set_zero(&mut self) {
        self.scale = ZERO;
        self.amps.iter_mut().for_each(|a| *a = ZERO);
    }

    /// Block rescaled to unit norm; `scale` is left alone, so drift in the
    /// block is discarded.
    pub fn normalize(&mut self) {
        self.unit_block(false);
    }

    /// Like [`normalize`](Self::normalize), also moving the phase of the first
    /// non-negligible amplitude into `scale`.
    pub fn canonicalize(&mut self) {
        self.lift(true);
    }

    fn lift(&mut self, with_phase: bool) {
        if let Some(factor) = self.unit_block(with_phase) {
            self.scale *= factor;
        }
    }

    fn unit_block(&mut self, with_phase: bool) -> Option<Complex> {
        let nrm = self.block_norm_sqr();
        if nrm <= crate::config::epsilon() {
            self.set_zero();
            return None;
        }
        let phase = if with_phase {
            self.amps
                .iter()
                .find(|a| !is_norm_zero(**a))
                .map_or(0.0, |a| a.arg())
        } else {
            0.0
        };
        let factor = Complex::from_polar(nrm.sqrt(), phase);
        self.amps.iter_mut().for_each(|a| *a /= factor);
        Some(factor)
    }

    /// Blocos iguais dentro da tolerância (ignora a escala)
    pub fn block_equals(&self, other: &LeafNode) -> bool {
        self.qubits == other.qubits
            && self
                .amps
                .iter()
                .zip(&other.amps)
                .all(|(a, b)| is_norm_zero(a - b))
    }
}

impl NodeView for LeafNode {
    fn scale(&self) -> Complex {
        self.scale
    }

    fn variant(&self) -> NodeVariant {
        NodeVariant::Leaf
    }
}
