//! Tipos de erro para qbdt-node

use std::fmt;
use thiserror::Error;

/// Resultado customizado para operações sobre nós
pub type QbdtResult<T> = Result<T, QbdtError>;

/// Variante de nó (usada em mensagens de erro)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeVariant {
    /// Nó ramificado (dois filhos)
    Branch,
    /// Folha densa (bloco de amplitudes)
    Leaf,
}

impl fmt::Display for NodeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch => write!(f, "branch"),
            Self::Leaf => write!(f, "dense leaf"),
        }
    }
}

/// Erros que podem ocorrer em operações sobre a árvore
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QbdtError {
    #[error(
        "{op}() not implemented for {variant} nodes (the separability threshold probably collapsed this subtree to a dense leaf too early)"
    )]
    Unsupported {
        op: &'static str,
        variant: NodeVariant,
    },

    #[error("{op}() reached terminal depth with structure left to merge")]
    PastTerminal { op: &'static str },

    #[error("Qubits [{depth}, {depth}+{size}) are not separable within tolerance")]
    NotSeparable { depth: u32, size: u32 },

    #[error("{op}(): depth {depth} is past the terminal level")]
    DepthOutOfRange { op: &'static str, depth: u32 },

    #[error("{op}(): subtree height does not match size {size}")]
    ChainSize { op: &'static str, size: u32 },

    #[error("Invalid state vector: length {0} is not a power of two")]
    InvalidStateVector(usize),

    #[error("Invalid leaf: {qubits} qubits need 2^{qubits} amplitudes, got {len}")]
    InvalidLeaf { qubits: u32, len: usize },
}

impl QbdtError {
    /// Atalho para [`QbdtError::Unsupported`] em folhas densas
    pub(crate) fn leaf(op: &'static str) -> Self {
        tracing::debug!(op, "operation rejected by dense leaf");
        Self::Unsupported {
            op,
            variant: NodeVariant::Leaf,
        }
    }

    /// Falha recuperável (o chamador pode usar outra estratégia)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotSeparable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_op_and_variant() {
        let err = QbdtError::leaf("prune");
        let msg = err.to_string();
        assert!(msg.starts_with("prune() not implemented for dense leaf nodes"));
        assert!(msg.contains("separability threshold"));
    }

    #[test]
    fn test_invalid_leaf_message() {
        let err = QbdtError::InvalidLeaf { qubits: 2, len: 3 };
        assert_eq!(err.to_string(), "Invalid leaf: 2 qubits need 2^2 amplitudes, got 3");
    }

    #[test]
    fn test_only_not_separable_is_recoverable() {
        assert!(QbdtError::NotSeparable { depth: 0, size: 1 }.is_recoverable());
        assert!(!QbdtError::PastTerminal { op: "push_special" }.is_recoverable());
        assert!(!QbdtError::leaf("branch").is_recoverable());
    }
}
