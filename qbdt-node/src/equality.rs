//! Comparação estrutural e de valor entre nós
//!
//! All comparisons use the shared tolerance from [`config`](crate::config) on
//! squared magnitudes. Identical handles short-circuit to `true`, and pairs
//! already proven equal during one comparison are not walked again, so the
//! cost is bounded by the number of distinct node pairs rather than by the
//! number of paths through the two DAGs.

use std::collections::HashSet;
use std::ptr;

use crate::gates::is_norm_zero;
use crate::node::{NodePtr, NodeView, QbdtNode};

impl QbdtNode {
    /// Escalas iguais e subárvores iguais
    pub fn is_equal(&self, other: &QbdtNode) -> bool {
        Comparison::default().equal(self, other)
    }

    /// Como [`is_equal`](Self::is_equal), ignorando as escalas dos dois nós
    pub fn is_equal_under(&self, other: &QbdtNode) -> bool {
        Comparison::default().equal_under(self, other)
    }

    /// Compara apenas o filho `which`
    pub fn is_equal_branch(&self, other: &QbdtNode, which: usize) -> bool {
        if ptr::eq(self, other) || (self.is_zero() && other.is_zero()) {
            return true;
        }
        match (self, other) {
            (Self::Branch(l), Self::Branch(r)) => Comparison::default().slots(
                l.branches[which & 1].as_ref(),
                r.branches[which & 1].as_ref(),
            ),
            _ => false,
        }
    }
}

/// Igualdade sobre referências: vazio == vazio, vazio != não vazio
pub fn nodes_equal(lhs: Option<&NodePtr>, rhs: Option<&NodePtr>) -> bool {
    Comparison::default().slots(lhs, rhs)
}

/// Pairs proven equal below their own scales, keyed by address. Only lives
/// for one comparison, while neither tree can change.
#[derive(Default)]
struct Comparison {
    proven: HashSet<(*const QbdtNode, *const QbdtNode)>,
}

impl Comparison {
    fn equal(&mut self, lhs: &QbdtNode, rhs: &QbdtNode) -> bool {
        if ptr::eq(lhs, rhs) {
            return true;
        }
        let (l, r) = (lhs.is_zero(), rhs.is_zero());
        if l || r {
            return l && r;
        }
        if !is_norm_zero(lhs.scale() - rhs.scale()) {
            return false;
        }
        self.equal_under(lhs, rhs)
    }

    fn equal_under(&mut self, lhs: &QbdtNode, rhs: &QbdtNode) -> bool {
        if ptr::eq(lhs, rhs) {
            return true;
        }
        let key = (ptr::from_ref(lhs), ptr::from_ref(rhs));
        if self.proven.contains(&key) {
            return true;
        }
        let equal = match (lhs, rhs) {
            (QbdtNode::Branch(l), QbdtNode::Branch(r)) => {
                self.slots(l.branches[0].as_ref(), r.branches[0].as_ref())
                    && self.slots(l.branches[1].as_ref(), r.branches[1].as_ref())
            }
            (QbdtNode::Leaf(l), QbdtNode::Leaf(r)) => l.block_equals(r),
            _ => false,
        };
        if equal {
            self.proven.insert(key);
        }
        equal
    }

    fn slots(&mut self, lhs: Option<&NodePtr>, rhs: Option<&NodePtr>) -> bool {
        match (lhs, rhs) {
            (None, None) => true,
            (Some(l), Some(r)) => self.equal(l, r),
            _ => false,
        }
    }
}

impl PartialEq for QbdtNode {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}
