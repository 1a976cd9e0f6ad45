//! Nó da árvore: contrato comum às duas variantes
//!
//! A node is either a [`BranchNode`] (scale + two child slots) or a
//! [`LeafNode`] (scale + dense amplitude block). Nodes live behind [`NodePtr`]
//! handles and may be shared by any number of parent slots; a node is only
//! ever written through a uniquely owned handle ([`unshare`]), which is what
//! makes sharing safe.

use std::collections::HashMap;
use std::sync::Arc;

use crate::branch::BranchNode;
use crate::error::{NodeVariant, QbdtError, QbdtResult};
use crate::gates::{Complex, ONE, ZERO, is_norm_zero};
use crate::leaf::LeafNode;

/// Handle compartilhado para um nó
pub type NodePtr = Arc<QbdtNode>;

/// Par de filhos (bit 0, bit 1); vazio = subárvore de amplitude zero
pub type Branches = [Option<NodePtr>; 2];

/// Bit `bit` de `perm` (escolhe o ramo no nível `bit`)
#[inline]
pub fn select_bit(perm: u64, bit: u32) -> usize {
    ((perm >> bit) & 1) as usize
}

/// Contrato somente-leitura comum às variantes
pub trait NodeView {
    /// Fator de escala complexo
    fn scale(&self) -> Complex;

    /// Variante concreta
    fn variant(&self) -> NodeVariant;

    /// Subárvore de amplitude zero?
    fn is_zero(&self) -> bool {
        is_norm_zero(self.scale())
    }
}

/// Nó da árvore de decisão
#[derive(Debug, Clone)]
pub enum QbdtNode {
    /// Nó ramificado
    Branch(BranchNode),
    /// Folha densa
    Leaf(LeafNode),
}

/// Copy-on-write: returns exclusive access to the slot's node, replacing it
/// with a private shallow clone first if any other handle refers to it.
pub fn unshare(slot: &mut NodePtr) -> &mut QbdtNode {
    if Arc::strong_count(slot) > 1 {
        tracing::trace!("copy-on-write clone");
    }
    Arc::make_mut(slot)
}

/// Novo nó zero terminal
pub fn zero_ptr() -> NodePtr {
    Arc::new(QbdtNode::zero())
}

impl NodeView for QbdtNode {
    fn scale(&self) -> Complex {
        match self {
            Self::Branch(b) => b.scale,
            Self::Leaf(l) => l.scale,
        }
    }

    fn variant(&self) -> NodeVariant {
        match self {
            Self::Branch(_) => NodeVariant::Branch,
            Self::Leaf(_) => NodeVariant::Leaf,
        }
    }
}

impl From<BranchNode> for QbdtNode {
    fn from(node: BranchNode) -> Self {
        Self::Branch(node)
    }
}

impl From<LeafNode> for QbdtNode {
    fn from(node: LeafNode) -> Self {
        Self::Leaf(node)
    }
}

impl QbdtNode {
    /// Nó terminal com escala dada
    pub fn terminal(scale: Complex) -> Self {
        Self::Branch(BranchNode::new(scale))
    }

    /// Nó zero canônico
    pub fn zero() -> Self {
        Self::terminal(ZERO)
    }

    /// Nó ramificado com dois filhos
    pub fn with_branches(scale: Complex, b0: NodePtr, b1: NodePtr) -> Self {
        Self::Branch(BranchNode::with_branches(scale, b0, b1))
    }

    /// Referência mutável para a escala
    pub fn scale_mut(&mut self) -> &mut Complex {
        match self {
            Self::Branch(b) => &mut b.scale,
            Self::Leaf(l) => &mut l.scale,
        }
    }

    /// Define a escala
    pub fn set_scale(&mut self, scale: Complex) {
        *self.scale_mut() = scale;
    }

    /// Zera o nó e solta os descendentes
    pub fn set_zero(&mut self) {
        match self {
            Self::Branch(b) => b.set_zero(),
            Self::Leaf(l) => l.set_zero(),
        }
    }

    /// Filho `b` (apenas nós ramificados)
    pub fn child(&self, b: usize) -> Option<&NodePtr> {
        match self {
            Self::Branch(node) => node.branches[b & 1].as_ref(),
            Self::Leaf(_) => None,
        }
    }

    /// Sem filhos (folhas densas também terminam a descida)
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Branch(b) => b.is_terminal(),
            Self::Leaf(_) => true,
        }
    }

    /// Visão como nó ramificado, se for um
    pub fn as_branch(&self) -> Option<&BranchNode> {
        match self {
            Self::Branch(b) => Some(b),
            Self::Leaf(_) => None,
        }
    }

    /// Visão como folha densa, se for uma
    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Self::Leaf(l) => Some(l),
            Self::Branch(_) => None,
        }
    }

    /// Capability gate for structural operations: only the branching variant
    /// implements them.
    pub fn as_branch_mut(&mut self, op: &'static str) -> QbdtResult<&mut BranchNode> {
        match self {
            Self::Branch(b) => Ok(b),
            Self::Leaf(_) => Err(QbdtError::leaf(op)),
        }
    }

    // =========================================================================
    // Operações estruturais (despacho por variante)
    // =========================================================================

    /// Novo nó com a mesma escala e os mesmos filhos (compartilhados)
    pub fn shallow_clone(&self) -> QbdtResult<NodePtr> {
        match self {
            Self::Branch(b) => Ok(b.shallow_clone()),
            Self::Leaf(_) => Err(QbdtError::leaf("shallow_clone")),
        }
    }

    /// Copy-on-write até `depth`
    pub fn branch(&mut self, depth: u32, par_depth: u32) -> QbdtResult<()> {
        if depth == 0 {
            return Ok(());
        }
        self.as_branch_mut("branch")?.branch(depth, par_depth)
    }

    /// Remove estrutura redundante até `depth`
    pub fn prune(&mut self, depth: u32, par_depth: u32) -> QbdtResult<()> {
        if depth == 0 {
            return Ok(());
        }
        self.as_branch_mut("prune")?.prune(depth, par_depth)
    }

    /// Restaura norma unitária por nível até `depth`; folhas normalizam o
    /// próprio bloco
    pub fn normalize(&mut self, depth: u32) {
        if depth == 0 {
            return;
        }
        match self {
            Self::Branch(b) => b.normalize(depth),
            Self::Leaf(l) => l.normalize(),
        }
    }

    /// Levanta magnitude e fase dos filhos até `depth`
    pub fn pop_state_vector(&mut self, depth: u32, par_depth: u32) -> QbdtResult<()> {
        if depth == 0 {
            return Ok(());
        }
        self.as_branch_mut("pop_state_vector")?
            .pop_state_vector(depth, par_depth)
    }

    /// Aplica matriz 2x2 ao par de filhos deste nó
    pub fn apply_2x2(&mut self, mtrx: &crate::gates::Matrix2x2, depth: u32) -> QbdtResult<()> {
        if depth == 0 {
            return Ok(());
        }
        self.as_branch_mut("apply_2x2")?.apply_2x2(mtrx, depth)
    }

    /// Insere `b` (cadeia de `size` níveis) em `depth`
    pub fn insert_at_depth(
        &mut self,
        b: &NodePtr,
        depth: u32,
        size: u32,
        par_depth: u32,
    ) -> QbdtResult<()> {
        self.as_branch_mut("insert_at_depth")?
            .insert_at_depth(b, depth, size, par_depth)
    }

    /// Remove `size` níveis separáveis a partir de `depth`
    pub fn remove_separable_at_depth(
        &mut self,
        depth: u32,
        size: u32,
        par_depth: u32,
    ) -> QbdtResult<NodePtr> {
        self.as_branch_mut("remove_separable_at_depth")?
            .remove_separable_at_depth(depth, size, par_depth)
    }

    /// Caminho rápido para matrizes estruturadas sobre o par (self, b1)
    pub fn push_special(
        &mut self,
        mtrx: &crate::gates::Matrix2x2,
        b1: &mut NodePtr,
    ) -> QbdtResult<()> {
        self.as_branch_mut("push_special")?.push_special(mtrx, b1)
    }

    /// Aplica `mtrx` ao qubit `target` de uma árvore com `qubits` níveis
    pub fn apply_single(
        &mut self,
        mtrx: &crate::gates::Matrix2x2,
        target: u32,
        qubits: u32,
    ) -> QbdtResult<()> {
        self.as_branch_mut("apply_2x2")?
            .apply_single(mtrx, target, qubits)
    }

    // =========================================================================
    // Leitura
    // =========================================================================

    /// Amplitude do estado de base `perm` numa árvore de `qubits` níveis
    pub fn amplitude(&self, perm: u64, qubits: u32) -> Complex {
        let mut amp = self.scale();
        let mut node = self;
        let mut level = 0;
        loop {
            if amp == ZERO {
                return ZERO;
            }
            match node {
                Self::Leaf(leaf) => {
                    let index = (perm >> level) as usize;
                    return amp * leaf.block_amplitude(index);
                }
                Self::Branch(b) => {
                    if level == qubits {
                        return amp;
                    }
                    match &b.branches[select_bit(perm, level)] {
                        Some(child) => {
                            amp *= child.scale();
                            node = child;
                            level += 1;
                        }
                        None => return ZERO,
                    }
                }
            }
        }
    }

    /// Soma de |amplitude|² sobre todos os estados de base
    pub fn total_probability(&self, qubits: u32) -> f64 {
        let mut memo = HashMap::new();
        self.scale().norm_sqr() * self.mass_below(qubits, &mut memo)
    }

    /// Probability mass below this node, excluding its own scale. Shared
    /// nodes are evaluated once.
    fn mass_below(&self, remaining: u32, memo: &mut HashMap<(usize, u32), f64>) -> f64 {
        let key = (self as *const Self as usize, remaining);
        if let Some(&mass) = memo.get(&key) {
            return mass;
        }
        let mass = match self {
            Self::Leaf(leaf) => leaf.block_norm_sqr(),
            Self::Branch(_) if remaining == 0 => 1.0,
            Self::Branch(b) => b
                .branches
                .iter()
                .flatten()
                .map(|c| c.scale().norm_sqr() * c.mass_below(remaining - 1, memo))
                .sum(),
        };
        memo.insert(key, mass);
        mass
    }

    /// Vetor de estado denso (apenas para registradores pequenos)
    pub fn state_vector(&self, qubits: u32) -> Vec<Complex> {
        let mut out = vec![ZERO; 1usize << qubits];
        self.fill(self.scale(), 0, 0, qubits, &mut out);
        out
    }

    fn fill(&self, amp: Complex, prefix: usize, level: u32, qubits: u32, out: &mut [Complex]) {
        if amp == ZERO {
            return;
        }
        match self {
            Self::Leaf(leaf) => {
                let span = 1usize << (qubits - level).min(leaf.qubit_count());
                for rest in 0..span {
                    out[prefix | (rest << level)] = amp * leaf.block_amplitude(rest);
                }
            }
            Self::Branch(_) if level == qubits => out[prefix] = amp,
            Self::Branch(b) => {
                for (bit, child) in b.branches.iter().enumerate() {
                    if let Some(child) = child {
                        child.fill(
                            amp * child.scale(),
                            prefix | (bit << level),
                            level + 1,
                            qubits,
                            out,
                        );
                    }
                }
            }
        }
    }

    /// Número de nós distintos alcançáveis (medida de compressão)
    pub fn count_nodes(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        let mut stack: Vec<&QbdtNode> = vec![self];
        while let Some(node) = stack.pop() {
            if !seen.insert(node as *const QbdtNode as usize) {
                continue;
            }
            if let Self::Branch(b) = node {
                stack.extend(b.branches.iter().flatten().map(|c| c.as_ref()));
            }
        }
        seen.len()
    }

    /// Altura em qubits ao longo do primeiro caminho não nulo
    pub fn height(&self) -> u32 {
        let mut height = 0;
        let mut node = self;
        loop {
            match node {
                Self::Leaf(leaf) => return height + leaf.qubit_count(),
                Self::Branch(b) => match b.branches.iter().flatten().find(|c| !c.is_zero()) {
                    Some(child) => {
                        height += 1;
                        node = child;
                    }
                    None => return height,
                },
            }
        }
    }

    /// Níveis ramificados acima da primeira folha densa ou nó terminal
    pub(crate) fn branch_height(&self) -> u32 {
        let mut height = 0;
        let mut node = self;
        while let Self::Branch(b) = node {
            match b.branches.iter().flatten().find(|c| !c.is_zero()) {
                Some(child) => {
                    height += 1;
                    node = child;
                }
                None => break,
            }
        }
        height
    }

    // =========================================================================
    // Construção
    // =========================================================================

    /// Estado de base |perm⟩ com `qubits` níveis
    pub fn basis_state(qubits: u32, perm: u64) -> NodePtr {
        let zero = zero_ptr();
        let mut node = Arc::new(Self::terminal(ONE));
        for level in (0..qubits).rev() {
            let mut branches: Branches = [Some(zero.clone()), Some(zero.clone())];
            branches[select_bit(perm, level)] = Some(node);
            node = Arc::new(Self::Branch(BranchNode {
                scale: ONE,
                branches,
            }));
        }
        node
    }

    /// Constrói árvore canônica a partir de um vetor denso. Os `leaf_qubits`
    /// níveis inferiores viram folhas densas (decisão do chamador).
    pub fn from_state_vector(amps: &[Complex], leaf_qubits: u32) -> QbdtResult<NodePtr> {
        if !amps.len().is_power_of_two() {
            return Err(QbdtError::InvalidStateVector(amps.len()));
        }
        let qubits = amps.len().trailing_zeros();
        let leaf_qubits = leaf_qubits.min(qubits);
        Ok(Arc::new(build(amps, 0, 1, qubits, leaf_qubits)?))
    }
}

/// Builds the canonical subtree for indices `offset + k * stride`.
fn build(
    amps: &[Complex],
    offset: usize,
    stride: usize,
    remaining: u32,
    leaf_qubits: u32,
) -> QbdtResult<QbdtNode> {
    if leaf_qubits > 0 && remaining == leaf_qubits {
        let block = (0..1usize << remaining)
            .map(|k| amps[offset + k * stride])
            .collect();
        let mut leaf = LeafNode::new(ONE, block)?;
        leaf.canonicalize();
        return Ok(QbdtNode::Leaf(leaf));
    }
    if remaining == 0 {
        let amp = amps[offset];
        return Ok(if is_norm_zero(amp) {
            QbdtNode::zero()
        } else {
            QbdtNode::terminal(amp)
        });
    }

    let c0 = build(amps, offset, stride << 1, remaining - 1, leaf_qubits)?;
    let c1 = build(amps, offset + stride, stride << 1, remaining - 1, leaf_qubits)?;
    let mut node = BranchNode::with_branches(ONE, Arc::new(c0), Arc::new(c1));
    node.lift(true);
    node.unify_children();
    Ok(QbdtNode::Branch(node))
}
