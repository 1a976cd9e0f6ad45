//! # Quantum Gates — Matrizes 2x2 para a árvore
//!
//! Matrizes single-qubit consumidas por `apply_2x2` / `push_state_vector`.
//!
//! ## Gates Implementadas
//!
//! - **Pauli**: X, Y, Z
//! - **Phase**: S, T, P(φ)
//! - **Rotation**: Rx, Ry, Rz
//! - **Superposição**: H (Hadamard)
//!
//! [`Matrix2x2::shape`] classifica a matriz para o caminho rápido de
//! `push_special` (diagonal / anti-diagonal).

use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_1_SQRT_2, PI};

use crate::config;

/// Número complexo de precisão dupla
pub type Complex = num_complex::Complex64;

/// Zero complexo
pub const ZERO: Complex = Complex::new(0.0, 0.0);

/// Um complexo
pub const ONE: Complex = Complex::new(1.0, 0.0);

/// Unidade imaginária
pub const I: Complex = Complex::new(0.0, 1.0);

/// |z|² abaixo da tolerância?
#[inline]
pub fn is_norm_zero(z: Complex) -> bool {
    z.norm_sqr() <= config::epsilon()
}

/// Forma estrutural de uma matriz 2x2
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatrixShape {
    /// Só a diagonal principal (fase, Z, S, T, Rz)
    Diagonal,
    /// Só a anti-diagonal (X, Y)
    AntiDiagonal,
    /// Mistura os dois ramos
    General,
}

/// Matriz 2x2 complexa para gates single-qubit
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix2x2 {
    /// Elementos: [[a, b], [c, d]]
    pub elements: [[Complex; 2]; 2],
}

impl Default for Matrix2x2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix2x2 {
    /// Cria matriz a partir dos quatro elementos (ordem linha-maior)
    pub const fn new(a: Complex, b: Complex, c: Complex, d: Complex) -> Self {
        Self {
            elements: [[a, b], [c, d]],
        }
    }

    /// Cria matriz identidade
    pub const fn identity() -> Self {
        Self::new(ONE, ZERO, ZERO, ONE)
    }

    /// Cria matriz diagonal
    pub const fn diagonal(a: Complex, d: Complex) -> Self {
        Self::new(a, ZERO, ZERO, d)
    }

    /// Aplica gate a um estado [alpha, beta]
    pub fn apply(&self, state: [Complex; 2]) -> [Complex; 2] {
        let [alpha, beta] = state;
        let [[a, b], [c, d]] = self.elements;

        [a * alpha + b * beta, c * alpha + d * beta]
    }

    /// Multiplicação de matrizes
    pub fn mul(&self, other: &Matrix2x2) -> Matrix2x2 {
        let [[a, b], [c, d]] = self.elements;
        let [[e, f], [g, h]] = other.elements;

        Matrix2x2::new(
            a * e + b * g,
            a * f + b * h,
            c * e + d * g,
            c * f + d * h,
        )
    }

    /// Transposta conjugada (dagger)
    pub fn dagger(&self) -> Matrix2x2 {
        let [[a, b], [c, d]] = self.elements;
        Matrix2x2::new(a.conj(), c.conj(), b.conj(), d.conj())
    }

    /// Determinante
    pub fn determinant(&self) -> Complex {
        let [[a, b], [c, d]] = self.elements;
        a * d - b * c
    }

    /// Inversa; `None` se singular
    pub fn inverse(&self) -> Option<Matrix2x2> {
        let det = self.determinant();
        if det.is_zero() || !det.is_finite() {
            return None;
        }
        let [[a, b], [c, d]] = self.elements;
        Some(Matrix2x2::new(d / det, -b / det, -c / det, a / det))
    }

    /// Classificação estrutural
    pub fn shape(&self) -> MatrixShape {
        let [[a, b], [c, d]] = self.elements;
        if is_norm_zero(b) && is_norm_zero(c) {
            MatrixShape::Diagonal
        } else if is_norm_zero(a) && is_norm_zero(d) {
            MatrixShape::AntiDiagonal
        } else {
            MatrixShape::General
        }
    }

    /// Verifica se é unitária
    pub fn is_unitary(&self) -> bool {
        let [[a, b], [c, d]] = self.mul(&self.dagger()).elements;
        (a - ONE).norm_sqr() < 1e-20
            && b.norm_sqr() < 1e-20
            && c.norm_sqr() < 1e-20
            && (d - ONE).norm_sqr() < 1e-20
    }
}

/// Trait para portas quânticas
pub trait QuantumGate: Send + Sync {
    /// Nome da porta
    fn name(&self) -> &'static str;

    /// Matriz da porta
    fn matrix(&self) -> Matrix2x2;

    /// Verifica se é unitária
    fn is_unitary(&self) -> bool {
        self.matrix().is_unitary()
    }

    /// Aplica a um estado
    fn apply(&self, state: [Complex; 2]) -> [Complex; 2] {
        self.matrix().apply(state)
    }
}

// =============================================================================
// Portas Padrão
// =============================================================================

/// Porta Hadamard: cria superposição
#[derive(Clone, Copy, Debug, Default)]
pub struct Hadamard;

impl QuantumGate for Hadamard {
    fn name(&self) -> &'static str {
        "H"
    }

    fn matrix(&self) -> Matrix2x2 {
        let h = Complex::new(FRAC_1_SQRT_2, 0.0);
        Matrix2x2::new(h, h, h, -h)
    }
}

/// Porta Pauli-X (NOT quântico)
#[derive(Clone, Copy, Debug, Default)]
pub struct PauliX;

impl QuantumGate for PauliX {
    fn name(&self) -> &'static str {
        "X"
    }

    fn matrix(&self) -> Matrix2x2 {
        Matrix2x2::new(ZERO, ONE, ONE, ZERO)
    }
}

/// Porta Pauli-Y
#[derive(Clone, Copy, Debug, Default)]
pub struct PauliY;

impl QuantumGate for PauliY {
    fn name(&self) -> &'static str {
        "Y"
    }

    fn matrix(&self) -> Matrix2x2 {
        Matrix2x2::new(ZERO, -I, I, ZERO)
    }
}

/// Porta Pauli-Z (phase flip)
#[derive(Clone, Copy, Debug, Default)]
pub struct PauliZ;

impl QuantumGate for PauliZ {
    fn name(&self) -> &'static str {
        "Z"
    }

    fn matrix(&self) -> Matrix2x2 {
        Matrix2x2::diagonal(ONE, -ONE)
    }
}

/// Porta S (√Z)
#[derive(Clone, Copy, Debug, Default)]
pub struct SGate;

impl QuantumGate for SGate {
    fn name(&self) -> &'static str {
        "S"
    }

    fn matrix(&self) -> Matrix2x2 {
        Matrix2x2::diagonal(ONE, I)
    }
}

/// Porta T (π/8)
#[derive(Clone, Copy, Debug, Default)]
pub struct TGate;

impl QuantumGate for TGate {
    fn name(&self) -> &'static str {
        "T"
    }

    fn matrix(&self) -> Matrix2x2 {
        Matrix2x2::diagonal(ONE, Complex::from_polar(1.0, PI / 4.0))
    }
}

/// Porta de rotação em X
#[derive(Clone, Copy, Debug)]
pub struct RotationX {
    pub theta: f64,
}

impl RotationX {
    pub fn new(theta: f64) -> Self {
        Self { theta }
    }
}

impl QuantumGate for RotationX {
    fn name(&self) -> &'static str {
        "Rx"
    }

    fn matrix(&self) -> Matrix2x2 {
        let c = Complex::new((self.theta / 2.0).cos(), 0.0);
        let s = Complex::new(0.0, -(self.theta / 2.0).sin());
        Matrix2x2::new(c, s, s, c)
    }
}

/// Porta de rotação em Y
#[derive(Clone, Copy, Debug)]
pub struct RotationY {
    pub theta: f64,
}

impl RotationY {
    pub fn new(theta: f64) -> Self {
        Self { theta }
    }
}

impl QuantumGate for RotationY {
    fn name(&self) -> &'static str {
        "Ry"
    }

    fn matrix(&self) -> Matrix2x2 {
        let c = Complex::new((self.theta / 2.0).cos(), 0.0);
        let s = Complex::new((self.theta / 2.0).sin(), 0.0);
        Matrix2x2::new(c, -s, s, c)
    }
}

/// Porta de rotação em Z
#[derive(Clone, Copy, Debug)]
pub struct RotationZ {
    pub theta: f64,
}

impl RotationZ {
    pub fn new(theta: f64) -> Self {
        Self { theta }
    }
}

impl QuantumGate for RotationZ {
    fn name(&self) -> &'static str {
        "Rz"
    }

    fn matrix(&self) -> Matrix2x2 {
        let half = self.theta / 2.0;
        Matrix2x2::diagonal(Complex::from_polar(1.0, -half), Complex::from_polar(1.0, half))
    }
}

/// Porta de fase genérica
#[derive(Clone, Copy, Debug)]
pub struct Phase {
    pub phi: f64,
}

impl Phase {
    pub fn new(phi: f64) -> Self {
        Self { phi }
    }
}

impl QuantumGate for Phase {
    fn name(&self) -> &'static str {
        "P"
    }

    fn matrix(&self) -> Matrix2x2 {
        Matrix2x2::diagonal(ONE, Complex::from_polar(1.0, self.phi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_gates_unitary() {
        assert!(Hadamard.is_unitary());
        assert!(PauliX.is_unitary());
        assert!(PauliY.is_unitary());
        assert!(PauliZ.is_unitary());
        assert!(SGate.is_unitary());
        assert!(TGate.is_unitary());
        assert!(RotationX::new(0.3).is_unitary());
        assert!(RotationY::new(1.1).is_unitary());
        assert!(RotationZ::new(PI).is_unitary());
        assert!(Phase::new(0.7).is_unitary());
    }

    #[test]
    fn test_shape_classification() {
        assert_eq!(PauliZ.matrix().shape(), MatrixShape::Diagonal);
        assert_eq!(TGate.matrix().shape(), MatrixShape::Diagonal);
        assert_eq!(PauliX.matrix().shape(), MatrixShape::AntiDiagonal);
        assert_eq!(PauliY.matrix().shape(), MatrixShape::AntiDiagonal);
        assert_eq!(Hadamard.matrix().shape(), MatrixShape::General);
        assert_eq!(RotationY::new(0.4).matrix().shape(), MatrixShape::General);
    }

    #[test]
    fn test_hadamard_creates_superposition() {
        let result = Hadamard.apply([ONE, ZERO]);

        // |+⟩ = (|0⟩ + |1⟩)/√2
        assert!((result[0].re - FRAC_1_SQRT_2).abs() < 1e-12);
        assert!((result[1].re - FRAC_1_SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_undoes_rotation() {
        let m = RotationY::new(0.9).matrix();
        let inv = m.inverse().unwrap();
        let [[a, b], [c, d]] = m.mul(&inv).elements;
        assert!((a - ONE).norm() < 1e-12);
        assert!(b.norm() < 1e-12);
        assert!(c.norm() < 1e-12);
        assert!((d - ONE).norm() < 1e-12);
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let m = Matrix2x2::new(ONE, ONE, ONE, ONE);
        assert!(m.inverse().is_none());
        assert!(!m.is_unitary());
    }

    #[test]
    fn test_s_squared_is_z() {
        let s2 = SGate.matrix().mul(&SGate.matrix());
        let z = PauliZ.matrix();
        assert!((s2.elements[1][1] - z.elements[1][1]).norm() < 1e-12);
    }
}
