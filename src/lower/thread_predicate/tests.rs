use super::*;
use crate::ir::{IterDomain, ParallelType};

use ParallelType::{BIDx, BIDy, TIDx, TIDy};

fn i() -> IterDomain {
    IterDomain::iteration()
}

fn ip(pt: ParallelType) -> IterDomain {
    IterDomain::iteration().parallelize(pt)
}

fn r(pt: ParallelType) -> IterDomain {
    IterDomain::reduction().parallelize(pt)
}

fn b(pt: ParallelType) -> IterDomain {
    IterDomain::broadcast().parallelize(pt)
}

fn bits(kinds: &[ParallelType]) -> ParallelTypeBitmap {
    kinds.iter().copied().collect()
}

fn input(f: &mut Fusion, name: &str, axes: Vec<IterDomain>) -> ValId {
    let v = f.add_tensor(name, axes);
    f.add_input(v).unwrap();
    v
}

fn unary(f: &mut Fusion, op: &str, inp: ValId, name: &str, axes: Vec<IterDomain>) -> ValId {
    let out = f.add_tensor(name, axes);
    f.add_expr(op, vec![inp], vec![out]).unwrap();
    out
}

fn sources(map: &ThreadPredicateMap, val: ValId, pt: ParallelType) -> Vec<ValId> {
    map.get(val).unwrap().sources_of(pt).collect()
}

#[test]
fn test_graph_inputs_need_no_guard() {
    let mut f = Fusion::new("inputs");
    let t0 = input(&mut f, "T0", vec![ip(TIDx), i()]);
    let s0 = f.add_scalar("s0", DataType::Float);
    f.add_input(s0).unwrap();

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert_eq!(map.get(t0), Some(&PredicateInfo::default()));
    assert!(map.get_expr(t0).unwrap().is_true());
    assert!(!map.contains(s0));
    assert_eq!(map.len(), 1);
}

#[test]
fn test_plain_ops_pass_predicates_through() {
    let mut f = Fusion::new("pass_through");
    let t0 = input(&mut f, "T0", vec![i(), i()]);
    let t1 = input(&mut f, "T1", vec![i()]);
    let t2 = f.add_tensor("T2", vec![i()]);
    f.add_expr("add", vec![t0, t1], vec![t2]).unwrap();

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert!(map.get(t2).unwrap().pred.none());
    assert!(map.get(t2).unwrap().sources.is_empty());
}

#[test]
fn test_guards_are_inherited_unchanged_by_plain_ops() {
    let mut f = Fusion::new("inherit");
    let t0 = input(&mut f, "T0", vec![ip(TIDx)]);
    let t1 = unary(&mut f, "sum", t0, "T1", vec![r(TIDx)]);
    let t2 = unary(&mut f, "neg", t1, "T2", vec![i()]);
    let t3 = unary(&mut f, "exp", t2, "T3", vec![i()]);

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert_eq!(map.get(t3), map.get(t2));
    assert_eq!(map.get(t3).unwrap().pred, bits(&[TIDx]));
}

#[test]
fn test_reduction_on_input_guards_output_with_one_source() {
    let mut f = Fusion::new("reduce");
    let t0 = input(&mut f, "T0", vec![ip(TIDx)]);
    let t1 = unary(&mut f, "sum", t0, "T1", vec![r(TIDx)]);
    let t2 = unary(&mut f, "neg", t1, "T2", vec![i()]);

    let map = ThreadPredicateMap::build(&f).unwrap();
    // The reduction's own output is computed by every lane
    assert!(map.get(t1).unwrap().pred.none());
    let rec = map.get(t2).unwrap();
    assert_eq!(rec.pred, bits(&[TIDx]));
    assert_eq!(sources(&map, t2, TIDx), vec![t1]);
    assert_eq!(map.get_expr(t2).unwrap().to_string(), "threadIdx.x == 0");
}

#[test]
fn test_serial_reduction_needs_no_guard() {
    let mut f = Fusion::new("serial");
    let t0 = input(&mut f, "T0", vec![i()]);
    let t1 = unary(&mut f, "sum", t0, "T1", vec![IterDomain::reduction()]);
    let t2 = unary(&mut f, "neg", t1, "T2", vec![i()]);

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert!(map.get(t2).unwrap().pred.none());
    assert!(map.get(t2).unwrap().sources.is_empty());
}

#[test]
fn test_reduce_then_broadcast_chain() {
    let mut f = Fusion::new("reduce_broadcast");
    let a = input(&mut f, "T0", vec![ip(TIDx)]);
    let b_ = unary(&mut f, "sum", a, "T1", vec![r(TIDx)]);
    let c = unary(&mut f, "broadcast", b_, "T2", vec![b(TIDx)]);
    let d = f.add_tensor("T3", vec![ip(TIDx)]);
    f.add_expr("add", vec![c, a], vec![d]).unwrap();

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert!(map.get(a).unwrap().pred.none());

    // Reading the reduced tensor requires thread 0 ...
    assert_eq!(map.get(c).unwrap().pred, bits(&[TIDx]));
    assert_eq!(sources(&map, c, TIDx), vec![b_]);

    // ... until the broadcast hands the value to every thread again.
    let rec = map.get(d).unwrap();
    assert!(!rec.pred.get(TIDx));
    assert!(!rec.sources.contains_key(&TIDx));
    assert!(map.get_expr(d).unwrap().is_true());
}

#[test]
fn test_broadcast_cancels_only_its_own_axis() {
    let mut f = Fusion::new("partial_cancel");
    let t0 = input(&mut f, "T0", vec![ip(BIDx), ip(TIDx)]);
    let t1 = unary(&mut f, "sum", t0, "T1", vec![r(BIDx), r(TIDx)]);
    let t2 = unary(&mut f, "neg", t1, "T2", vec![i()]);
    let t3 = unary(&mut f, "broadcast", t2, "T3", vec![i(), b(TIDx)]);
    let t4 = unary(&mut f, "exp", t3, "T4", vec![i(), ip(TIDx)]);

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert_eq!(map.get(t2).unwrap().pred, bits(&[BIDx, TIDx]));
    assert_eq!(map.get_expr(t2).unwrap().to_string(), "T1pred && threadIdx.x == 0");

    let rec = map.get(t4).unwrap();
    assert_eq!(rec.pred, bits(&[BIDx]));
    assert_eq!(sources(&map, t4, BIDx), vec![t1]);
    assert!(!rec.sources.contains_key(&TIDx));
    assert_eq!(map.get_expr(t4).unwrap().to_string(), "T1pred");
}

#[test]
fn test_cleared_bit_never_keeps_its_source() {
    let mut f = Fusion::new("bit_and_source");
    let t0 = input(&mut f, "T0", vec![ip(BIDy)]);
    let t1 = unary(&mut f, "sum", t0, "T1", vec![r(BIDy)]);
    let t2 = unary(&mut f, "broadcast", t1, "T2", vec![b(BIDy)]);
    let t3 = unary(&mut f, "neg", t2, "T3", vec![ip(BIDy)]);

    let map = ThreadPredicateMap::build(&f).unwrap();
    for (_, rec) in map.iter() {
        for pt in ParallelType::ALL {
            assert_eq!(rec.pred.get(pt), rec.sources.contains_key(&pt));
        }
    }
    assert!(map.get(t3).unwrap().pred.none());
}

#[test]
fn test_reduction_and_broadcast_on_same_axis_is_fatal() {
    let mut f = Fusion::new("conflict");
    let red = input(&mut f, "T0", vec![r(TIDx)]);
    let bc = input(&mut f, "T1", vec![b(TIDx)]);
    let out = f.add_tensor("T2", vec![ip(TIDx)]);
    let e = f.add_expr("add", vec![red, bc], vec![out]).unwrap();

    let err = ThreadPredicateMap::build(&f).unwrap_err();
    assert_eq!(
        err,
        PredicateError::MismatchedReduction {
            expr: e,
            val: bc,
            kind: TIDx
        }
    );
}

#[test]
fn test_broadcast_before_reduction_is_also_fatal() {
    let mut f = Fusion::new("conflict_rev");
    let red = input(&mut f, "T0", vec![r(TIDx)]);
    let bc = input(&mut f, "T1", vec![b(TIDx)]);
    let out = f.add_tensor("T2", vec![ip(TIDx)]);
    let e = f.add_expr("add", vec![bc, red], vec![out]).unwrap();

    let err = ThreadPredicateMap::build(&f).unwrap_err();
    assert_eq!(
        err,
        PredicateError::ReductionBroadcastConflict {
            expr: e,
            val: red,
            kind: TIDx
        }
    );
}

#[test]
fn test_reduced_input_with_both_kinds_on_axis_is_fatal() {
    let mut f = Fusion::new("mixed_axis");
    let t0 = input(&mut f, "T0", vec![r(TIDx)]);
    let t1 = input(&mut f, "T1", vec![r(TIDx), b(TIDx)]);
    let out = f.add_tensor("T2", vec![i()]);
    f.add_expr("add", vec![t0, t1], vec![out]).unwrap();

    let err = ThreadPredicateMap::build(&f).unwrap_err();
    assert!(matches!(
        err,
        PredicateError::ReductionBroadcastConflict { kind: TIDx, .. }
    ));
}

#[test]
fn test_mismatched_parallel_reduction_is_fatal_in_either_order() {
    for swap in [false, true] {
        let mut f = Fusion::new("mismatch");
        let red = input(&mut f, "T0", vec![r(TIDy)]);
        let iter = input(&mut f, "T1", vec![ip(TIDy)]);
        let out = f.add_tensor("T2", vec![i()]);
        let inputs = if swap { vec![iter, red] } else { vec![red, iter] };
        f.add_expr("add", inputs, vec![out]).unwrap();

        let err = ThreadPredicateMap::build(&f).unwrap_err();
        assert!(
            matches!(err, PredicateError::MismatchedReduction { kind: TIDy, .. }),
            "swap={} gave {:?}",
            swap,
            err
        );
    }
}

#[test]
fn test_matching_reductions_on_two_inputs_are_accepted() {
    let mut f = Fusion::new("two_reductions");
    let t0 = input(&mut f, "T0", vec![ip(TIDx)]);
    let t1 = unary(&mut f, "sum", t0, "T1", vec![r(TIDx)]);
    let t2 = unary(&mut f, "max", t0, "T2", vec![r(TIDx)]);
    let t3 = f.add_tensor("T3", vec![i()]);
    f.add_expr("add", vec![t1, t2], vec![t3]).unwrap();

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert_eq!(sources(&map, t3, TIDx), vec![t1, t2]);
    // Several sources are fine for thread axes
    assert_eq!(map.get_expr(t3).unwrap().to_string(), "threadIdx.x == 0");
}

#[test]
fn test_two_block_sources_cannot_build_a_guard() {
    let mut f = Fusion::new("two_grid_reductions");
    let t0 = input(&mut f, "T0", vec![ip(BIDx)]);
    let t1 = unary(&mut f, "sum", t0, "T1", vec![r(BIDx)]);
    let t2 = unary(&mut f, "max", t0, "T2", vec![r(BIDx)]);
    let t3 = f.add_tensor("T3", vec![i()]);
    f.add_expr("add", vec![t1, t2], vec![t3]).unwrap();

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert_eq!(
        map.get_expr(t3).unwrap_err(),
        PredicateError::MultiplePredicateSources {
            val: t3,
            kind: BIDx,
            sources: vec![t1, t2]
        }
    );
}

#[test]
fn test_block_guard_without_source_is_fatal() {
    let info = PredicateInfo::new(bits(&[BIDy]), SourceMap::new());
    assert_eq!(
        get_predicate(ValId(3), &info).unwrap_err(),
        PredicateError::NoPredicateSource {
            val: ValId(3),
            kind: BIDy
        }
    );

    let mut empty = SourceMap::new();
    empty.insert(BIDy, BTreeSet::new());
    let info = PredicateInfo::new(bits(&[BIDy]), empty);
    assert!(matches!(
        get_predicate(ValId(3), &info),
        Err(PredicateError::NoPredicateSource { kind: BIDy, .. })
    ));
}

#[test]
fn test_conjunction_order_is_not_observable() {
    let mut sources = SourceMap::new();
    sources.insert(BIDx, BTreeSet::from([ValId(4)]));
    let info = PredicateInfo::new(bits(&[TIDy, BIDx, TIDx]), sources);
    let guard = get_predicate(ValId(5), &info).unwrap();

    let mut got: Vec<String> = guard.conjuncts().iter().map(|e| e.to_string()).collect();
    got.sort();
    let mut want = vec![
        "T4pred".to_string(),
        "threadIdx.x == 0".to_string(),
        "threadIdx.y == 0".to_string(),
    ];
    want.sort();
    assert_eq!(got, want);

    // Same record, built again, gives the same guard
    assert_eq!(get_predicate(ValId(5), &info.clone()).unwrap(), guard);
}

#[test]
fn test_reading_unrecorded_value_is_fatal() {
    let mut f = Fusion::new("missing");
    let orphan = f.add_tensor("T0", vec![i()]);
    let out = f.add_tensor("T1", vec![i()]);
    f.add_expr("neg", vec![orphan], vec![out]).unwrap();

    let err = ThreadPredicateMap::build(&f).unwrap_err();
    assert_eq!(err, PredicateError::MissingPredicate { val: orphan });
}

#[test]
fn test_redefining_a_value_is_fatal() {
    let mut f = Fusion::new("redefine");
    let t0 = input(&mut f, "T0", vec![i()]);
    let t1 = unary(&mut f, "neg", t0, "T1", vec![i()]);
    f.add_expr("abs", vec![t0], vec![t1]).unwrap();

    let err = ThreadPredicateMap::build(&f).unwrap_err();
    assert_eq!(err, PredicateError::DuplicatePredicate { val: t1 });
}

#[test]
fn test_writing_a_graph_input_is_fatal() {
    let mut f = Fusion::new("write_input");
    let t0 = input(&mut f, "T0", vec![i()]);
    let t1 = input(&mut f, "T1", vec![i()]);
    f.add_expr("copy", vec![t0], vec![t1]).unwrap();

    assert_eq!(
        ThreadPredicateMap::build(&f).unwrap_err(),
        PredicateError::DuplicatePredicate { val: t1 }
    );
}

#[test]
fn test_duplicate_aliases_existing_record() {
    let mut f = Fusion::new("alias");
    let t0 = input(&mut f, "T0", vec![ip(BIDx)]);
    let t1 = unary(&mut f, "sum", t0, "T1", vec![r(BIDx)]);
    let t2 = unary(&mut f, "neg", t1, "T2", vec![i()]);
    let mut map = ThreadPredicateMap::build(&f).unwrap();

    let clone = f.add_tensor("T2_clone", vec![i()]);
    map.duplicate(clone, t2).unwrap();
    assert_eq!(map.get(clone), map.get(t2));
    assert_eq!(map.get_expr(clone).unwrap(), map.get_expr(t2).unwrap());

    // Aliasing twice violates single assignment
    assert_eq!(
        map.duplicate(clone, t0).unwrap_err(),
        PredicateError::DuplicatePredicate { val: clone }
    );
}

#[test]
fn test_duplicate_of_unrecorded_origin_is_noop() {
    let mut map = ThreadPredicateMap::default();
    map.duplicate(ValId(1), ValId(0)).unwrap();
    assert!(map.is_empty());
    assert!(map.get_expr(ValId(1)).is_err());
}

#[test]
fn test_all_outputs_share_one_record() {
    let mut f = Fusion::new("multi_output");
    let t0 = input(&mut f, "T0", vec![ip(TIDx)]);
    let t1 = unary(&mut f, "sum", t0, "T1", vec![r(TIDx)]);
    let avg = f.add_tensor("T2", vec![i()]);
    let var = f.add_tensor("T3", vec![i()]);
    let n = f.add_scalar("n", DataType::Int);
    f.add_expr("welford", vec![t1], vec![avg, var, n]).unwrap();

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert_eq!(map.get(avg), map.get(var));
    assert_eq!(map.get(avg).unwrap().pred, bits(&[TIDx]));
    assert!(!map.contains(n));
}

#[test]
fn test_scalar_inputs_contribute_nothing() {
    let mut f = Fusion::new("scalars");
    let t0 = input(&mut f, "T0", vec![ip(TIDx)]);
    let s0 = f.add_scalar("s0", DataType::Float);
    f.add_input(s0).unwrap();
    let t1 = f.add_tensor("T1", vec![ip(TIDx)]);
    f.add_expr("mul", vec![t0, s0], vec![t1]).unwrap();

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert!(map.get(t1).unwrap().pred.none());
}

#[test]
fn test_expressions_added_out_of_order_are_processed_in_definition_order() {
    let mut f = Fusion::new("out_of_order");
    let t0 = input(&mut f, "T0", vec![ip(TIDx)]);
    let t1 = f.add_tensor("T1", vec![r(TIDx)]);
    let t2 = f.add_tensor("T2", vec![i()]);
    f.add_expr("neg", vec![t1], vec![t2]).unwrap();
    f.add_expr("sum", vec![t0], vec![t1]).unwrap();

    let map = ThreadPredicateMap::build(&f).unwrap();
    assert_eq!(map.get(t2).unwrap().pred, bits(&[TIDx]));
}

#[test]
fn test_cyclic_graph_is_rejected() {
    let mut f = Fusion::new("cycle");
    let t0 = f.add_tensor("T0", vec![i()]);
    let t1 = f.add_tensor("T1", vec![i()]);
    f.add_expr("neg", vec![t1], vec![t0]).unwrap();
    f.add_expr("neg", vec![t0], vec![t1]).unwrap();

    assert!(matches!(
        ThreadPredicateMap::build(&f),
        Err(PredicateError::Graph(GraphError::Cycle { .. }))
    ));
}

#[test]
fn test_insert_refuses_overwrite() {
    let mut map = ThreadPredicateMap::default();
    map.insert(ValId(0), PredicateInfo::default()).unwrap();
    let guarded = PredicateInfo::new(bits(&[TIDx]), SourceMap::new());
    assert!(map.insert(ValId(0), guarded).is_err());
    assert!(map.get(ValId(0)).unwrap().pred.none());
}
