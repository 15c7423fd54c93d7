use soul_layer::scoring::{accumulate, classify, classify_axes, classify_vector, rank, Choice, RankedOrder, ScoreVector, ScoringError, TypeKey};
use soul_layer::Axis;

use Axis::{Lambda as L, MirrorE as R, E, V};

fn choices(axes: &[Axis]) -> Vec<Choice> {
    axes.iter().copied().map(Choice::new).collect()
}

/// Every sequence of length 1..=3 over the four axes.
fn all_sequences() -> Vec<Vec<Axis>> {
    let mut out: Vec<Vec<Axis>> = Axis::ALL.iter().map(|a| vec![*a]).collect();
    let mut frontier = out.clone();
    for _ in 0..2 {
        let mut next = Vec::new();
        for seq in &frontier {
            for axis in Axis::ALL {
                let mut s = seq.clone();
                s.push(axis);
                next.push(s);
            }
        }
        out.extend(next.iter().cloned());
        frontier = next;
    }
    out
}

#[test]
fn vectors_are_complete_finite_and_non_negative() {
    for seq in all_sequences() {
        let v = accumulate(&choices(&seq)).unwrap();
        assert_eq!(v.iter().count(), 4);
        for (_, w) in v.iter() {
            assert!(w.is_finite() && w >= 0.0, "{seq:?} -> {v:?}");
        }
    }
}

#[test]
fn total_weight_depends_only_on_first_and_last() {
    for seq in all_sequences() {
        let v = accumulate(&choices(&seq)).unwrap();
        let first = seq[0];
        let last = seq[seq.len() - 1];
        let expected = if first == last { 1.0 } else { 1.25 };
        assert_eq!(v.total(), expected, "{seq:?}");
        assert_eq!(v.get(last), 1.0);
        if first != last {
            assert_eq!(v.get(first), 0.25);
        }
        let nonzero = v.iter().filter(|(_, w)| *w > 0.0).count();
        assert!(nonzero <= 2);
    }
}

#[test]
fn empty_choice_list_is_invalid_input() {
    assert_eq!(
        accumulate(&[]),
        Err(ScoringError::InvalidInput("at least one choice is required".to_string()))
    );
}

#[test]
fn classifier_literal_table() {
    let cases = [
        ([E, V, L, R], TypeKey::Future),
        ([L, R, E, V], TypeKey::Reality),
        ([E, L, V, R], TypeKey::Future),
        ([R, L, V, E], TypeKey::Reality),
    ];
    for (order, expected) in cases {
        assert_eq!(classify_axes(&order).unwrap(), expected, "{order:?}");
        assert_eq!(expected.as_str(), if expected == TypeKey::Future { "EVΛƎ" } else { "EΛVƎ" });
    }
}

#[test]
fn classifier_rejects_malformed_orders() {
    assert!(classify_axes(&[E, V, L]).is_err());
    assert!(classify_axes(&[E, V, L, R, E]).is_err());
    assert!(matches!(classify_axes(&[E, E, L, R]), Err(ScoringError::InvalidInput(_))));
}

#[test]
fn classification_is_deterministic() {
    let v = ScoreVector::from_weights([0.1, 0.7, 0.3, 0.9]).unwrap();
    let first = classify_vector(&v);
    for _ in 0..10 {
        assert_eq!(classify_vector(&v), first);
        assert_eq!(rank(&v), rank(&v));
    }
    assert_eq!(rank(&v).axes(), &[R, V, L, E]);
    assert_eq!(first, TypeKey::Future);
}

#[test]
fn ties_follow_fixed_priority() {
    let cases: [([f64; 4], [Axis; 4]); 4] = [
        ([1.0, 1.0, 1.0, 1.0], [E, V, L, R]),
        ([0.0, 0.0, 1.0, 1.0], [L, R, E, V]),
        ([0.0, 1.0, 0.0, 1.0], [V, R, E, L]),
        ([0.25, 0.0, 0.0, 0.25], [E, R, V, L]),
    ];
    for (weights, expected) in cases {
        let v = ScoreVector::from_weights(weights).unwrap();
        for _ in 0..5 {
            assert_eq!(rank(&v).axes(), &expected, "{weights:?}");
        }
    }
}

#[test]
fn scenario_changed_mind_from_v_to_e() {
    let v = accumulate(&choices(&[V, E])).unwrap();
    assert_eq!(v, ScoreVector::from_weights([1.0, 0.25, 0.0, 0.0]).unwrap());
    let order = rank(&v);
    assert_eq!(order.axes(), &[E, V, L, R]);
    assert_eq!(classify(&order), TypeKey::Future);
}

#[test]
fn scenario_single_observation_pick() {
    let v = accumulate(&choices(&[R])).unwrap();
    assert_eq!(v, ScoreVector::from_weights([0.0, 0.0, 0.0, 1.0]).unwrap());
    let order = rank(&v);
    assert_eq!(order.axes(), &[R, E, V, L]);
    assert_eq!(order.winner(), R);
    assert_eq!(classify(&order), TypeKey::Reality);
}

#[test]
fn ranked_order_round_trips_through_json_with_validation() {
    let order = RankedOrder::try_from(vec![L, R, E, V]).unwrap();
    let json = serde_json::to_string(&order).unwrap();
    assert_eq!(json, r#"["Λ","Ǝ","E","V"]"#);
    assert!(serde_json::from_str::<RankedOrder>(r#"["E","E","V","Λ"]"#).is_err());
}
