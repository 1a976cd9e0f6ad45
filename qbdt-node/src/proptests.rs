use crate::*;

use proptest::prelude::*;
use std::sync::Arc;

const TOL: f64 = 1e-4;

fn normalized(raw: Vec<(f64, f64)>) -> Option<Vec<Complex>> {
    let amps: Vec<Complex> = raw.into_iter().map(|(re, im)| Complex::new(re, im)).collect();
    let norm = amps.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
    (norm > 1e-3).then(|| amps.into_iter().map(|a| a / norm).collect())
}

fn state_strategy(qubits: u32) -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-1.0f64..1.0, -1.0f64..1.0), 1usize << qubits)
}

fn gate(kind: usize, theta: f64) -> Matrix2x2 {
    match kind {
        0 => Hadamard.matrix(),
        1 => PauliX.matrix(),
        2 => PauliY.matrix(),
        3 => SGate.matrix(),
        4 => RotationY::new(theta).matrix(),
        _ => RotationX::new(theta).matrix(),
    }
}

fn dense_apply(state: &mut [Complex], m: &Matrix2x2, target: u32) {
    let bit = 1usize << target;
    for i in (0..state.len()).filter(|i| i & bit == 0) {
        let [a, b] = m.apply([state[i], state[i | bit]]);
        state[i] = a;
        state[i | bit] = b;
    }
}

fn max_diff(a: &[Complex], b: &[Complex]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).norm()).fold(0.0, f64::max)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_gates_match_dense_reference(
        raw in state_strategy(4),
        ops in prop::collection::vec((0usize..6, 0u32..4, -3.0f64..3.0), 0..12),
    ) {
        let Some(mut expected) = normalized(raw) else {
            return Ok(());
        };
        let mut root = (*QbdtNode::from_state_vector(&expected, 0).unwrap()).clone();

        for (kind, target, theta) in ops {
            let m = gate(kind, theta);
            root.apply_single(&m, target, 4).unwrap();
            dense_apply(&mut expected, &m, target);
        }

        prop_assert!(max_diff(&root.state_vector(4), &expected) < TOL);
        prop_assert!((root.total_probability(4) - 1.0).abs() < TOL);
    }

    #[test]
    fn prop_state_vector_round_trip(raw in state_strategy(3), leaf_qubits in 0u32..3) {
        let Some(amps) = normalized(raw) else {
            return Ok(());
        };
        let root = QbdtNode::from_state_vector(&amps, leaf_qubits).unwrap();
        prop_assert!(max_diff(&root.state_vector(3), &amps) < 1e-6);
        prop_assert_eq!(root.height(), 3);
    }

    #[test]
    fn prop_equality_reflexive_and_symmetric(a in state_strategy(2), b in state_strategy(2)) {
        let (Some(a), Some(b)) = (normalized(a), normalized(b)) else {
            return Ok(());
        };
        let ta = QbdtNode::from_state_vector(&a, 0).unwrap();
        let ta2 = QbdtNode::from_state_vector(&a, 0).unwrap();
        let tb = QbdtNode::from_state_vector(&b, 0).unwrap();

        prop_assert!(ta.is_equal(&ta));
        prop_assert!(ta.is_equal(&ta2) && ta2.is_equal(&ta));
        prop_assert_eq!(ta.is_equal(&tb), tb.is_equal(&ta));
    }

    #[test]
    fn prop_insert_remove_round_trip(
        base in state_strategy(2),
        factor in state_strategy(1),
        depth in 0u32..3,
    ) {
        let (Some(base), Some(factor)) = (normalized(base), normalized(factor)) else {
            return Ok(());
        };
        let original = (*QbdtNode::from_state_vector(&base, 0).unwrap()).clone();
        let chain = QbdtNode::from_state_vector(&factor, 0).unwrap();

        let mut grown = original.clone();
        grown.insert_at_depth(&chain, depth, 1, 0).unwrap();
        prop_assert!((grown.total_probability(3) - 1.0).abs() < TOL);

        let removed = grown.remove_separable_at_depth(depth, 1, 0).unwrap();
        prop_assert!((removed.total_probability(1) - 1.0).abs() < TOL);

        // the split may move a global phase between the two parts
        for outer in 0..4u64 {
            for inner in 0..2u64 {
                let got = grown.amplitude(outer, 2) * removed.amplitude(inner, 1);
                let want = original.amplitude(outer, 2) * chain.amplitude(inner, 1);
                prop_assert!((got - want).norm() < TOL);
            }
        }
    }

    #[test]
    fn prop_normalize_keeps_unit_trees(raw in state_strategy(3)) {
        let Some(amps) = normalized(raw) else {
            return Ok(());
        };
        let mut root = (*QbdtNode::from_state_vector(&amps, 0).unwrap()).clone();

        root.normalize(3);

        prop_assert!(max_diff(&root.state_vector(3), &amps) < 1e-9);
    }

    #[test]
    fn prop_normalize_removes_drift(raw in state_strategy(3), drift in 0.5f64..2.0) {
        let Some(amps) = normalized(raw) else {
            return Ok(());
        };
        let mut root = (*QbdtNode::from_state_vector(&amps, 0).unwrap()).clone();
        if let QbdtNode::Branch(b) = &mut root
            && let Some(slot) = b.branches[0].as_mut()
        {
            let s = slot.scale() * drift;
            unshare(slot).set_scale(s);
        }
        let before = root.state_vector(3);
        let total: f64 = before.iter().map(|a| a.norm_sqr()).sum();

        root.normalize(3);

        // relative weights survive; only the overall norm is corrected
        let rescaled: Vec<Complex> = before.iter().map(|a| a / total.sqrt()).collect();
        prop_assert!(max_diff(&root.state_vector(3), &rescaled) < 1e-9);
        prop_assert!((root.total_probability(3) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prop_shared_handles_are_never_mutated(raw in state_strategy(3), target in 0u32..3) {
        let Some(amps) = normalized(raw) else {
            return Ok(());
        };
        let shared = QbdtNode::from_state_vector(&amps, 0).unwrap();
        let mut copy = (*shared).clone();
        let reader = Arc::clone(&shared);

        copy.apply_single(&Hadamard.matrix(), target, 3).unwrap();
        copy.branch(3, 2).unwrap();

        prop_assert!(max_diff(&reader.state_vector(3), &amps) < 1e-6);
    }
}
