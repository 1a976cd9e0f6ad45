//! Nó ramificado: escala + dois filhos
//!
//! All structural algorithms of the tree live here. Children are reached
//! through [`NodePtr`] slots; anything that writes below a slot goes through
//! [`unshare`] first, so subtrees still referenced elsewhere are cloned
//! (shallowly) before they change.
//!
//! Public mutators are transactional: they keep an O(1) handle copy of the
//! node and restore it when an error surfaces mid-walk.
//!
//! ## Canonical form
//!
//! A node is *lifted* when its children's squared scales sum to one and the
//! removed magnitude (optionally also the phase of the first non-negligible
//! child) has been multiplied into the node's own scale. Lifting never
//! changes an amplitude. Structurally equal children are folded into one
//! shared handle by [`BranchNode::prune`].

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;

use crate::config;
use crate::error::{NodeVariant, QbdtError, QbdtResult};
use crate::gates::{Complex, Matrix2x2, MatrixShape, ONE, ZERO, is_norm_zero};
use crate::node::{Branches, NodePtr, NodeView, QbdtNode, unshare, zero_ptr};
use crate::parallel::{default_par_depth, try_fork_join};

/// Nó com dois filhos (ou terminal, sem filhos)
#[derive(Debug, Clone)]
pub struct BranchNode {
    /// Fator de escala
    pub scale: Complex,
    /// Filho 0 e filho 1
    pub branches: Branches,
}

impl NodeView for BranchNode {
    fn scale(&self) -> Complex {
        self.scale
    }

    fn variant(&self) -> NodeVariant {
        NodeVariant::Branch
    }
}

/// Sets `scale` on the slot's node, or swaps in a fresh zero node when the
/// scale is negligible.
fn settle(slot: &mut NodePtr, scale: Complex) {
    if is_norm_zero(scale) {
        if !is_canonical_zero(slot) {
            *slot = zero_ptr();
        }
    } else {
        unshare(slot).set_scale(scale);
    }
}

fn is_canonical_zero(node: &NodePtr) -> bool {
    matches!(&**node, QbdtNode::Branch(b) if b.scale == ZERO && b.is_terminal())
}

/// Zero-scale copy of `src` that keeps its structure
fn zero_like(src: &NodePtr) -> NodePtr {
    let mut node = (**src).clone();
    node.set_scale(ZERO);
    Arc::new(node)
}

/// Mutable access to a child: copy-on-write, or only when already unique
fn access(slot: &mut NodePtr, owned_only: bool) -> Option<&mut QbdtNode> {
    if owned_only {
        Arc::get_mut(slot)
    } else {
        Some(unshare(slot))
    }
}

impl BranchNode {
    /// Cria nó terminal
    pub fn new(scale: Complex) -> Self {
        Self {
            scale,
            branches: [None, None],
        }
    }

    /// Cria nó com dois filhos
    pub fn with_branches(scale: Complex, b0: NodePtr, b1: NodePtr) -> Self {
        Self {
            scale,
            branches: [Some(b0), Some(b1)],
        }
    }

    /// Sem filhos
    pub fn is_terminal(&self) -> bool {
        self.branches.iter().all(Option::is_none)
    }

    /// Os dois slots apontam para o mesmo nó
    pub fn siblings_shared(&self) -> bool {
        matches!(&self.branches, [Some(a), Some(b)] if Arc::ptr_eq(a, b))
    }

    /// Zera escala e solta os filhos
    pub fn set_zero(&mut self) {
        self.scale = ZERO;
        self.branches = [None, None];
    }

    /// Novo handle com a mesma escala e os mesmos filhos
    pub fn shallow_clone(&self) -> NodePtr {
        Arc::new(QbdtNode::Branch(self.clone()))
    }

    fn branch_height(&self) -> u32 {
        self.branches
            .iter()
            .flatten()
            .find(|c| !c.is_zero())
            .map_or(0, |c| 1 + c.branch_height())
    }

    /// Both child slots, with empty slots of a non-terminal node filled by
    /// zero nodes. `None` for terminals.
    fn children_mut(&mut self) -> Option<(&mut NodePtr, &mut NodePtr)> {
        if self.is_terminal() {
            return None;
        }
        let [b0, b1] = &mut self.branches;
        Some((b0.get_or_insert_with(zero_ptr), b1.get_or_insert_with(zero_ptr)))
    }

    /// Runs `op`; on error the node is put back exactly as it was.
    fn transact<T>(&mut self, op: impl FnOnce(&mut Self) -> QbdtResult<T>) -> QbdtResult<T> {
        let backup = self.clone();
        let result = op(self);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "rolling back node");
            *self = backup;
        }
        result
    }

    /// Calls `f` on both children through [`fork_join`](crate::parallel::fork_join).
    ///
    /// Siblings sharing one node are visited once and stay shared. With
    /// `owned_only`, children referenced from elsewhere are skipped instead of
    /// copied.
    fn visit_children<F, E>(&mut self, par_depth: u32, owned_only: bool, f: F) -> Result<(), E>
    where
        F: Fn(&mut QbdtNode, u32) -> Result<(), E> + Sync,
        E: Send,
    {
        if self.siblings_shared() {
            self.branches[1] = None;
            let result = match self.branches[0].as_mut().and_then(|s| access(s, owned_only)) {
                Some(node) => f(node, par_depth),
                None => Ok(()),
            };
            self.branches[1] = self.branches[0].clone();
            return result;
        }
        let [b0, b1] = &mut self.branches;
        let n0 = b0.as_mut().and_then(|s| access(s, owned_only));
        let n1 = b1.as_mut().and_then(|s| access(s, owned_only));
        let f = &f;
        try_fork_join(
            par_depth,
            move |d| n0.map_or(Ok(()), |n| f(n, d)),
            move |d| n1.map_or(Ok(()), |n| f(n, d)),
        )
    }

    // =========================================================================
    // Branch / Prune
    // =========================================================================

    /// Copy-on-write of every node down to `depth`: afterwards nothing in
    /// that range is shared with another handle or with a sibling.
    pub fn branch(&mut self, depth: u32, par_depth: u32) -> QbdtResult<()> {
        if depth == 0 {
            return Ok(());
        }
        if self.is_zero() {
            self.set_zero();
            return Ok(());
        }
        let Some((b0, b1)) = self.children_mut() else {
            return Ok(());
        };
        let (n0, n1) = (unshare(b0), unshare(b1));
        let depth = depth - 1;
        try_fork_join(
            par_depth,
            move |d| n0.branch(depth, d),
            move |d| n1.branch(depth, d),
        )
    }

    /// Drops zero subtrees and folds equal children (and grandchildren) into
    /// shared handles, bottom-up to `depth`. Only descends into children this
    /// tree owns exclusively.
    pub fn prune(&mut self, depth: u32, par_depth: u32) -> QbdtResult<()> {
        if depth == 0 {
            return Ok(());
        }
        if self.is_zero() {
            self.set_zero();
            return Ok(());
        }
        if self.is_terminal() {
            return Ok(());
        }
        let below = depth - 1;
        if below > 0 {
            self.visit_children(par_depth, true, |n, d| n.prune(below, d))?;
        }
        self.drop_zero_children();
        if !self.is_terminal() {
            self.unify_children();
        }
        Ok(())
    }

    /// Prune limited to the branching levels above any dense leaf
    fn prune_within(&mut self, depth: u32, par_depth: u32) -> QbdtResult<()> {
        let depth = depth.min(self.branch_height());
        self.prune(depth, par_depth)
    }

    fn drop_zero_children(&mut self) {
        let zero = |c: &Option<NodePtr>| c.as_ref().is_none_or(|c| c.is_zero());
        if zero(&self.branches[0]) && zero(&self.branches[1]) {
            self.set_zero();
            return;
        }
        for slot in self.branches.iter_mut().flatten() {
            if slot.is_zero() && !is_canonical_zero(slot) {
                *slot = zero_ptr();
            }
        }
    }

    /// Equal children collapse into one shared child with unit scale, their
    /// common scale moving into this node. Otherwise equal grandchildren are
    /// shared across the two sides.
    pub(crate) fn unify_children(&mut self) {
        let [Some(b0), Some(b1)] = &mut self.branches else {
            return;
        };
        if Arc::ptr_eq(b0, b1) {
            return;
        }
        if b0.is_equal(b1) {
            let common = b0.scale();
            if !is_norm_zero(common) {
                self.scale *= common;
                unshare(b0).set_scale(ONE);
            }
            *b1 = Arc::clone(b0);
            return;
        }
        for which in 0..2 {
            let Some(shared) = b0.child(which).cloned() else {
                continue;
            };
            let same = b1.child(which).is_some_and(|c| Arc::ptr_eq(c, &shared));
            if same || !b0.is_equal_branch(b1, which) {
                continue;
            }
            if let QbdtNode::Branch(n1) = unshare(b1) {
                n1.branches[which] = Some(shared);
            }
        }
    }

    // =========================================================================
    // Normalize / PopStateVector
    // =========================================================================

    /// Rescales children to unit squared-norm sum, bottom-up to `depth`.
    /// The removed magnitude is drift and is dropped, so a tree normalized to
    /// full height carries total probability |scale|². Always succeeds.
    pub fn normalize(&mut self, depth: u32) {
        if depth == 0 {
            return;
        }
        if self.is_zero() {
            self.set_zero();
            return;
        }
        if self.is_terminal() {
            return;
        }
        if depth > 1 {
            let Ok(()) = self.visit_children::<_, Infallible>(0, false, |n, _| {
                n.normalize(depth - 1);
                Ok(())
            });
        }
        self.unit_children(false);
    }

    /// Canonical lift bottom-up to `depth`: each node takes the magnitude and
    /// the leading phase of its children.
    pub fn pop_state_vector(&mut self, depth: u32, par_depth: u32) -> QbdtResult<()> {
        if depth == 0 {
            return Ok(());
        }
        if self.is_zero() {
            self.set_zero();
            return Ok(());
        }
        if self.is_terminal() {
            return Ok(());
        }
        if depth > 1 {
            self.visit_children(par_depth, false, |n, d| n.pop_state_vector(depth - 1, d))?;
        }
        self.lift(true);
        Ok(())
    }

    /// Full-depth canonical form; dense leaves canonicalize their own block.
    fn canonicalize(&mut self, par_depth: u32) {
        if self.is_zero() {
            self.set_zero();
            return;
        }
        if self.is_terminal() {
            return;
        }
        let Ok(()) = self.visit_children::<_, Infallible>(par_depth, false, |n, d| {
            match n {
                QbdtNode::Branch(b) => b.canonicalize(d),
                QbdtNode::Leaf(l) => l.canonicalize(),
            }
            Ok(())
        });
        self.lift(true);
    }

    pub(crate) fn lift(&mut self, with_phase: bool) {
        if let Some(factor) = self.unit_children(with_phase) {
            self.scale *= factor;
        }
    }

    /// Divides both children by their joint norm (and, with `with_phase`,
    /// the leading phase). Returns the divisor, or `None` when the children
    /// were negligible and this node became zero.
    fn unit_children(&mut self, with_phase: bool) -> Option<Complex> {
        let shared = self.siblings_shared();
        let (b0, b1) = self.children_mut()?;
        let (s0, s1) = (b0.scale(), b1.scale());
        let (n0, n1) = (s0.norm_sqr(), s1.norm_sqr());
        let total = if shared { 2.0 * n0 } else { n0 + n1 };
        if total <= config::epsilon() {
            self.set_zero();
            return None;
        }
        let phase = match (with_phase, is_norm_zero(s0)) {
            (false, _) => 0.0,
            (true, false) => s0.arg(),
            (true, true) => s1.arg(),
        };
        let factor = Complex::from_polar(total.sqrt(), phase);
        settle(b0, s0 / factor);
        if shared {
            *b1 = Arc::clone(b0);
        } else {
            settle(b1, s1 / factor);
        }
        Some(factor)
    }

    /// Moves this node's scale into both children. Shared siblings stay
    /// shared.
    fn push_scale_down(&mut self) {
        let scale = std::mem::replace(&mut self.scale, ONE);
        let shared = self.siblings_shared();
        if let Some((b0, b1)) = self.children_mut() {
            let (s0, s1) = (b0.scale(), b1.scale());
            settle(b0, s0 * scale);
            if shared {
                *b1 = Arc::clone(b0);
            } else {
                settle(b1, s1 * scale);
            }
        }
    }

    // =========================================================================
    // Apply2x2 / PushStateVector / PushSpecial
    // =========================================================================

    /// Applies `mtrx` to the qubit this node branches on. `depth` counts the
    /// levels below this node (this node's children are level one). Prunes
    /// afterwards.
    pub fn apply_2x2(&mut self, mtrx: &Matrix2x2, depth: u32) -> QbdtResult<()> {
        if depth == 0 {
            return Ok(());
        }
        let par_depth = default_par_depth();
        self.transact(|node| node.apply_2x2_unpruned(mtrx, depth, par_depth))?;
        self.prune_within(depth, par_depth)
    }

    /// Applies `mtrx` to qubit `target` of a `qubits`-level tree rooted here.
    pub fn apply_single(&mut self, mtrx: &Matrix2x2, target: u32, qubits: u32) -> QbdtResult<()> {
        if target >= qubits {
            return Err(QbdtError::DepthOutOfRange {
                op: "apply_2x2",
                depth: target,
            });
        }
        let par_depth = default_par_depth();
        self.transact(|node| node.apply_at(mtrx, target, qubits - target, par_depth))?;
        self.prune_within(qubits, par_depth)
    }

    fn apply_at(&mut self, mtrx: &Matrix2x2, target: u32, depth: u32, par_depth: u32) -> QbdtResult<()> {
        if self.is_zero() {
            self.set_zero();
            return Ok(());
        }
        if target == 0 {
            return self.apply_2x2_unpruned(mtrx, depth, par_depth);
        }
        if self.is_terminal() {
            return Err(QbdtError::DepthOutOfRange {
                op: "apply_2x2",
                depth: target,
            });
        }
        self.visit_children(par_depth, false, |n, d| {
            if n.is_zero() {
                return Ok(());
            }
            n.as_branch_mut("apply_2x2")?
                .apply_at(mtrx, target - 1, depth, d)
        })
    }

    fn apply_2x2_unpruned(&mut self, mtrx: &Matrix2x2, depth: u32, par_depth: u32) -> QbdtResult<()> {
        if self.is_zero() {
            self.set_zero();
            return Ok(());
        }
        let Some((b0, b1)) = self.children_mut() else {
            return Err(QbdtError::DepthOutOfRange {
                op: "apply_2x2",
                depth,
            });
        };
        match mtrx.shape() {
            MatrixShape::General => Self::push_state_vector(mtrx, b0, b1, depth - 1, par_depth),
            MatrixShape::Diagonal | MatrixShape::AntiDiagonal => {
                mix_structured(mtrx, b0, b1);
                Ok(())
            }
        }
    }

    /// Mixes the subtrees in `b0`/`b1` by `mtrx`, where `depth` is how many
    /// levels the two subtrees still have. Equal-structure pairs only mix
    /// scales; otherwise scales are pushed down one level and each pair of
    /// grandchildren is mixed recursively, re-lifting on the way back.
    ///
    /// On error both slots are restored.
    pub fn push_state_vector(
        mtrx: &Matrix2x2,
        b0: &mut NodePtr,
        b1: &mut NodePtr,
        depth: u32,
        par_depth: u32,
    ) -> QbdtResult<()> {
        let backup = (Arc::clone(b0), Arc::clone(b1));
        let result = Self::push_pair(mtrx, b0, b1, depth, par_depth);
        if result.is_err() {
            (*b0, *b1) = backup;
        }
        result
    }

    fn push_pair(
        mtrx: &Matrix2x2,
        b0: &mut NodePtr,
        b1: &mut NodePtr,
        depth: u32,
        par_depth: u32,
    ) -> QbdtResult<()> {
        match (b0.is_zero(), b1.is_zero()) {
            (true, true) => {
                *b0 = zero_ptr();
                *b1 = zero_ptr();
                return Ok(());
            }
            (true, false) => *b0 = zero_like(b1),
            (false, true) => *b1 = zero_like(b0),
            (false, false) => {}
        }

        if b0.is_equal_under(b1) {
            let [s0, s1] = mtrx.apply([b0.scale(), b1.scale()]);
            settle(b0, s0);
            settle(b1, s1);
            if !Arc::ptr_eq(b0, b1)
                && !b0.is_zero()
                && let Some(branches) = b0.as_branch().map(|n| n.branches.clone())
                && !b1.is_zero()
                && let QbdtNode::Branch(n1) = unshare(b1)
            {
                n1.branches = branches;
            }
            return Ok(());
        }

        if b0.variant() == NodeVariant::Leaf || b1.variant() == NodeVariant::Leaf {
            return Err(QbdtError::leaf("push_state_vector"));
        }
        if depth == 0 {
            return Err(QbdtError::PastTerminal {
                op: "push_state_vector",
            });
        }
        if b0.is_terminal() || b1.is_terminal() {
            return unshare(b0).push_special(mtrx, b1);
        }

        let n0 = unshare(b0).as_branch_mut("push_state_vector")?;
        let n1 = unshare(b1).as_branch_mut("push_state_vector")?;
        n0.push_scale_down();
        n1.push_scale_down();
        let depth = depth - 1;
        if n0.siblings_shared() && n1.siblings_shared() {
            // both halves repeat one pair: mix it once, then re-link
            n0.branches[1] = None;
            n1.branches[1] = None;
            let result = match (n0.branches[0].as_mut(), n1.branches[0].as_mut()) {
                (Some(c0), Some(c1)) => Self::push_pair(mtrx, c0, c1, depth, par_depth),
                _ => Ok(()),
            };
            n0.branches[1] = n0.branches[0].clone();
            n1.branches[1] = n1.branches[0].clone();
            result?;
        } else {
            let (Some((c00, c01)), Some((c10, c11))) = (n0.children_mut(), n1.children_mut())
            else {
                return Err(QbdtError::PastTerminal {
                    op: "push_state_vector",
                });
            };
            let m = *mtrx;
            try_fork_join(
                par_depth,
                move |d| Self::push_pair(&m, c00, c10, depth, d),
                move |d| Self::push_pair(&m, c01, c11, depth, d),
            )?;
        }
        n0.pop_state_vector(1, 0)?;
        n1.pop_state_vector(1, 0)
    }

    /// Scale-only mix of the pair (this node, `b1`) for diagonal and
    /// anti-diagonal matrices. A general matrix would need to merge structure
    /// and fails with [`QbdtError::PastTerminal`].
    pub fn push_special(&mut self, mtrx: &Matrix2x2, b1: &mut NodePtr) -> QbdtResult<()> {
        let [[a, b], [c, d]] = mtrx.elements;
        match mtrx.shape() {
            MatrixShape::Diagonal => {
                self.scale *= a;
                let s1 = b1.scale() * d;
                settle(b1, s1);
            }
            MatrixShape::AntiDiagonal => {
                std::mem::swap(self, unshare(b1).as_branch_mut("push_special")?);
                self.scale *= b;
                let s1 = b1.scale() * c;
                settle(b1, s1);
            }
            MatrixShape::General => {
                return Err(QbdtError::PastTerminal { op: "push_special" });
            }
        }
        if self.is_zero() {
            self.set_zero();
        }
        Ok(())
    }

    // =========================================================================
    // InsertAtDepth / RemoveSeparableAtDepth
    // =========================================================================

    /// Grafts the `size`-level chain `b` between level `depth` and the level
    /// below it, under every non-zero node at `depth`. `b`'s own scale is
    /// multiplied into this node.
    pub fn insert_at_depth(&mut self, b: &NodePtr, depth: u32, size: u32, par_depth: u32) -> QbdtResult<()> {
        let top = b.scale();
        self.transact(|node| {
            node.insert_below(b, depth, size, par_depth)?;
            node.scale *= top;
            Ok(())
        })
    }

    fn insert_below(&mut self, b: &NodePtr, depth: u32, size: u32, par_depth: u32) -> QbdtResult<()> {
        if self.is_zero() {
            self.set_zero();
            return Ok(());
        }
        if depth == 0 {
            let chain = b.as_branch().ok_or_else(|| QbdtError::leaf("insert_at_depth"))?;
            self.branches = graft(chain, size, &self.branches)?;
            return Ok(());
        }
        if self.is_terminal() {
            return Err(QbdtError::DepthOutOfRange {
                op: "insert_at_depth",
                depth,
            });
        }
        self.visit_children(par_depth, false, |n, d| {
            if n.is_zero() {
                return Ok(());
            }
            n.as_branch_mut("insert_at_depth")?
                .insert_below(b, depth - 1, size, d)
        })
    }

    /// Factors qubits `[depth, depth + size)` out of the tree and returns
    /// them as a chain with unit root scale. Fails with
    /// [`QbdtError::NotSeparable`], leaving the tree untouched, when the
    /// range is entangled with the rest.
    pub fn remove_separable_at_depth(&mut self, depth: u32, size: u32, par_depth: u32) -> QbdtResult<NodePtr> {
        let removed = self.transact(|node| node.remove_unpruned(depth, size, par_depth))?;
        self.prune_within(u32::MAX, par_depth)?;
        Ok(removed)
    }

    fn remove_unpruned(&mut self, depth: u32, size: u32, par_depth: u32) -> QbdtResult<NodePtr> {
        self.canonicalize(par_depth);
        if self.is_zero() {
            return Ok(zero_ptr());
        }
        if size == 0 {
            return Ok(Arc::new(QbdtNode::terminal(ONE)));
        }
        let factor = self.separable_factor(depth, size)?;
        self.splice_out(depth, size, par_depth)?;
        Ok(Arc::new(factor))
    }

    /// Read-only check: every non-zero node at `depth` must carry the same
    /// `size`-level chain, and within each chain all continuations must agree
    /// up to scale.
    fn separable_factor(&self, depth: u32, size: u32) -> QbdtResult<QbdtNode> {
        let mut cuts = Vec::new();
        collect_cuts(self, depth, &mut HashSet::new(), &mut cuts)?;

        let mut factor: Option<QbdtNode> = None;
        for cut in cuts {
            let mut continuations = Vec::new();
            let chain = QbdtNode::Branch(BranchNode {
                scale: ONE,
                branches: strip(cut, size, &mut continuations)?,
            });
            let separable = continuations
                .split_first()
                .is_none_or(|(rep, rest)| rest.iter().all(|c| c.is_equal_under(rep)))
                && factor.as_ref().is_none_or(|f| f.is_equal(&chain));
            if !separable {
                tracing::debug!(depth, size, "subsystem is entangled with the remainder");
                return Err(QbdtError::NotSeparable { depth, size });
            }
            factor.get_or_insert(chain);
        }
        Ok(factor.unwrap_or_else(QbdtNode::zero))
    }

    /// Replaces every node at `depth` by its first non-zero continuation,
    /// keeping the replaced node's scale.
    fn splice_out(&mut self, depth: u32, size: u32, par_depth: u32) -> QbdtResult<()> {
        const OP: &str = "remove_separable_at_depth";
        if self.is_zero() {
            self.set_zero();
            return Ok(());
        }
        if depth == 0 {
            match first_continuation(self, size) {
                None => self.set_zero(),
                Some(rep) => match &*rep {
                    QbdtNode::Branch(b) => self.branches = b.branches.clone(),
                    QbdtNode::Leaf(_) => return Err(QbdtError::leaf(OP)),
                },
            }
            return Ok(());
        }
        self.visit_children(par_depth, false, |n, d| {
            if n.is_zero() {
                return Ok(());
            }
            let cut = n.as_branch_mut(OP)?;
            if depth > 1 {
                return cut.splice_out(depth - 1, size, d);
            }
            match first_continuation(cut, size) {
                None => n.set_zero(),
                Some(rep) => {
                    let scale = n.scale();
                    let mut next = (*rep).clone();
                    next.set_scale(scale);
                    *n = next;
                }
            }
            Ok(())
        })
    }
}

/// Copy of `chain`'s top `size` levels whose bottom nodes take `cont` as
/// their children.
fn graft(chain: &BranchNode, size: u32, cont: &Branches) -> QbdtResult<Branches> {
    const OP: &str = "insert_at_depth";
    if size == 0 {
        if !chain.is_terminal() {
            return Err(QbdtError::ChainSize { op: OP, size });
        }
        return Ok(cont.clone());
    }
    if chain.is_terminal() {
        return Err(QbdtError::ChainSize { op: OP, size });
    }
    let graft_child = |child: &Option<NodePtr>| -> QbdtResult<Option<NodePtr>> {
        let Some(c) = child.as_ref().filter(|c| !c.is_zero()) else {
            return Ok(Some(zero_ptr()));
        };
        let node = c.as_branch().ok_or_else(|| QbdtError::leaf(OP))?;
        let grafted = BranchNode {
            scale: node.scale,
            branches: graft(node, size - 1, cont)?,
        };
        Ok(Some(Arc::new(QbdtNode::Branch(grafted))))
    };
    let b0 = graft_child(&chain.branches[0])?;
    let b1 = if chain.siblings_shared() {
        b0.clone()
    } else {
        graft_child(&chain.branches[1])?
    };
    Ok([b0, b1])
}

/// Distinct non-zero nodes at `depth` below `node`
fn collect_cuts<'a>(
    node: &'a BranchNode,
    depth: u32,
    seen: &mut HashSet<(usize, u32)>,
    out: &mut Vec<&'a BranchNode>,
) -> QbdtResult<()> {
    const OP: &str = "remove_separable_at_depth";
    if node.is_zero() || !seen.insert((node as *const BranchNode as usize, depth)) {
        return Ok(());
    }
    if depth == 0 {
        out.push(node);
        return Ok(());
    }
    if node.is_terminal() {
        return Err(QbdtError::DepthOutOfRange { op: OP, depth });
    }
    for child in node.branches.iter().flatten().filter(|c| !c.is_zero()) {
        let child = child.as_branch().ok_or_else(|| QbdtError::leaf(OP))?;
        collect_cuts(child, depth - 1, seen, out)?;
    }
    Ok(())
}

/// Top `size` levels of `node` with terminals where the continuations were;
/// the continuations themselves are pushed to `conts`.
fn strip(node: &BranchNode, size: u32, conts: &mut Vec<NodePtr>) -> QbdtResult<Branches> {
    const OP: &str = "remove_separable_at_depth";
    if node.is_terminal() {
        return Err(QbdtError::DepthOutOfRange { op: OP, depth: size });
    }
    let mut out: Branches = [None, None];
    for (slot, child) in out.iter_mut().zip(&node.branches) {
        let stripped = match child {
            Some(c) if !c.is_zero() => {
                if size == 1 {
                    conts.push(Arc::clone(c));
                    QbdtNode::terminal(c.scale())
                } else {
                    let b = c.as_branch().ok_or_else(|| QbdtError::leaf(OP))?;
                    QbdtNode::Branch(BranchNode {
                        scale: b.scale,
                        branches: strip(b, size - 1, conts)?,
                    })
                }
            }
            _ => QbdtNode::zero(),
        };
        *slot = Some(Arc::new(stripped));
    }
    Ok(out)
}

fn first_continuation(node: &BranchNode, size: u32) -> Option<NodePtr> {
    node.branches
        .iter()
        .flatten()
        .filter(|c| !c.is_zero())
        .find_map(|c| {
            if size <= 1 {
                Some(Arc::clone(c))
            } else {
                c.as_branch().and_then(|b| first_continuation(b, size - 1))
            }
        })
}

fn mix_structured(mtrx: &Matrix2x2, b0: &mut NodePtr, b1: &mut NodePtr) {
    let [[a, b], [c, d]] = mtrx.elements;
    let (f0, f1) = match mtrx.shape() {
        MatrixShape::AntiDiagonal => {
            std::mem::swap(b0, b1);
            (b, c)
        }
        _ => (a, d),
    };
    let (s0, s1) = (b0.scale(), b1.scale());
    settle(b0, s0 * f0);
    settle(b1, s1 * f1);
}
