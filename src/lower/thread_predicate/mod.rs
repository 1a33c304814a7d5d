//! Thread predicate analysis.
//!
//! Reductions parallelized across threads or blocks leave the combined
//! result in one representative lane; every other lane holds a partial
//! value. Any statement that consumes such a result must be guarded so only
//! the representative lane (thread index 0, or the block that observed the
//! grid reduction flag) proceeds. A later broadcast along the same axis
//! makes every lane see the combined value again and lifts the guard.
//!
//! `ThreadPredicateMap` walks a `Fusion` once in definition order and
//! records, for every tensor, the set of parallel axes that need a guard and
//! which reducing tensors are responsible for the block-level ones.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, trace};

use crate::ir::{DataType, ExprId, Fusion, GraphError, ParallelType, ParallelTypeBitmap, ValId};
use crate::kir::{self, BoolExpr, Expr};

#[cfg(test)]
mod tests;

/// Parallel axis → tensors whose reduction along it created the guard.
pub type SourceMap = BTreeMap<ParallelType, BTreeSet<ValId>>;

/// Guard requirement of a single tensor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PredicateInfo {
    pub pred: ParallelTypeBitmap,
    pub sources: SourceMap,
}

impl PredicateInfo {
    pub fn new(pred: ParallelTypeBitmap, sources: SourceMap) -> Self {
        Self { pred, sources }
    }

    /// Sources recorded for `pt`, empty if none.
    pub fn sources_of(&self, pt: ParallelType) -> impl Iterator<Item = ValId> + '_ {
        self.sources.get(&pt).into_iter().flatten().copied()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PredicateError {
    #[error("thread predicate map was not initialized, couldn't find {val}")]
    MissingPredicate { val: ValId },
    #[error("thread predicate for {val} is already recorded")]
    DuplicatePredicate { val: ValId },
    #[error("mismatched parallelized reductions on {kind} found on inputs of {expr} (at {val})")]
    MismatchedReduction {
        expr: ExprId,
        val: ValId,
        kind: ParallelType,
    },
    #[error("{val} is both reduced and broadcast along {kind} among the inputs of {expr}")]
    ReductionBroadcastConflict {
        expr: ExprId,
        val: ValId,
        kind: ParallelType,
    },
    #[error("no predicate source found for {kind} guarding {val}")]
    NoPredicateSource { val: ValId, kind: ParallelType },
    #[error("multiple predicate sources ({}) detected for {kind} guarding {val}", .sources.len())]
    MultiplePredicateSources {
        val: ValId,
        kind: ParallelType,
        sources: Vec<ValId>,
    },
    #[error("tried to return a predicate that is not a bool value (found {found})")]
    NotBoolean { found: DataType },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

// ─── Source map helpers ───────────────────────────────────────────

fn merge_source_map(dst: &mut SourceMap, src: &SourceMap) {
    for (pt, tensors) in src {
        if tensors.is_empty() {
            continue;
        }
        dst.entry(*pt).or_default().extend(tensors.iter().copied());
    }
}

fn add_to_source_map(dst: &mut SourceMap, tv: ValId, reductions: ParallelTypeBitmap) {
    for pt in reductions.iter_set() {
        dst.entry(pt).or_default().insert(tv);
    }
}

/// Drop every axis that is clear in `mask`.
fn mask_source_map(src: &mut SourceMap, mask: ParallelTypeBitmap) {
    src.retain(|pt, _| mask.get(*pt));
}

// ─── Guard construction ───────────────────────────────────────────

fn predicate_per_parallel_type(
    val: ValId,
    pt: ParallelType,
    sources: Option<&BTreeSet<ValId>>,
) -> Result<Expr, PredicateError> {
    if pt.is_block() {
        let mut iter = sources.into_iter().flatten();
        match (iter.next(), iter.next()) {
            (None, _) => Err(PredicateError::NoPredicateSource { val, kind: pt }),
            (Some(&src), None) => Ok(Expr::named(&kir::predicate_flag_name(src), DataType::Bool)),
            (Some(_), Some(_)) => Err(PredicateError::MultiplePredicateSources {
                val,
                kind: pt,
                sources: sources.into_iter().flatten().copied().collect(),
            }),
        }
    } else {
        Ok(kir::eq_expr(kir::parallel_index(pt), Expr::Int(0)))
    }
}

/// Build the guard of `val` from a detached predicate record. `val` only
/// names the guarded tensor in errors.
pub fn get_predicate(val: ValId, info: &PredicateInfo) -> Result<BoolExpr, PredicateError> {
    if info.pred.none() {
        return Ok(BoolExpr::literal(true));
    }

    let mut pred: Option<Expr> = None;
    for pt in info.pred.iter_set() {
        let tp = predicate_per_parallel_type(val, pt, info.sources.get(&pt))?;
        pred = Some(match pred {
            None => tp,
            Some(acc) => kir::and_expr(acc, tp),
        });
    }

    let pred = pred.unwrap_or(Expr::Bool(true));
    BoolExpr::try_new(pred).map_err(|found| PredicateError::NotBoolean { found })
}

// ─── ThreadPredicateMap ───────────────────────────────────────────

/// Per-tensor guard requirements of a fusion. Records are written once.
#[derive(Clone, Debug, Default)]
pub struct ThreadPredicateMap {
    records: BTreeMap<ValId, PredicateInfo>,
}

impl ThreadPredicateMap {
    /// Run the analysis over `fusion`.
    pub fn build(fusion: &Fusion) -> Result<Self, PredicateError> {
        let mut map = Self::default();

        for &inp in fusion.inputs() {
            if fusion.is_tensor(inp) {
                map.insert(inp, PredicateInfo::default())?;
            }
        }

        for expr in fusion.exprs()? {
            map.update_bit_set(fusion, expr)?;
        }

        info!(
            fusion = %fusion.name,
            records = map.len(),
            guarded = map.iter().filter(|(_, i)| i.pred.any()).count(),
            "thread predicate analysis complete"
        );
        Ok(map)
    }

    /// Derive the predicate records of every tensor output of `expr_id`.
    pub fn update_bit_set(&mut self, fusion: &Fusion, expr_id: ExprId) -> Result<(), PredicateError> {
        let expr = fusion.expr(expr_id);

        // Guards already required on the inputs
        let mut input_preds = ParallelTypeBitmap::new();
        // Parallel axes reduced in some input
        let mut input_reductions = ParallelTypeBitmap::new();
        // Parallel axes broadcast in some input
        let mut input_bcasts = ParallelTypeBitmap::new();
        // Parallel axes bound in some input
        let mut input_ptypes = ParallelTypeBitmap::new();

        let mut src_map = SourceMap::new();

        for &inp in &expr.inputs {
            let Some(domain) = fusion.val(inp).domain() else {
                continue;
            };
            let record = self.at(inp)?;

            input_preds |= record.pred;
            merge_source_map(&mut src_map, &record.sources);

            let mut id_reductions = ParallelTypeBitmap::new();
            let mut id_bcasts = ParallelTypeBitmap::new();
            let mut id_ptypes = ParallelTypeBitmap::new();

            for id in domain.iter() {
                if let Some(pt) = id.parallel_type {
                    id_ptypes.set(pt, true);
                    if id.is_reduction() {
                        id_reductions.set(pt, true);
                    }
                    if id.is_broadcast() {
                        id_bcasts.set(pt, true);
                    }
                }
            }

            // An axis reduced by an earlier input must be reduced here too
            for pt in input_reductions.iter_set() {
                if !id_ptypes.get(pt) {
                    continue;
                }
                if !id_reductions.get(pt) {
                    return Err(PredicateError::MismatchedReduction {
                        expr: expr_id,
                        val: inp,
                        kind: pt,
                    });
                }
                if id_bcasts.get(pt) {
                    return Err(PredicateError::ReductionBroadcastConflict {
                        expr: expr_id,
                        val: inp,
                        kind: pt,
                    });
                }
            }

            // ...and an axis reduced here must not be bound differently earlier
            for pt in id_reductions.iter_set() {
                if input_bcasts.get(pt) {
                    return Err(PredicateError::ReductionBroadcastConflict {
                        expr: expr_id,
                        val: inp,
                        kind: pt,
                    });
                }
                if input_ptypes.get(pt) && !input_reductions.get(pt) {
                    return Err(PredicateError::MismatchedReduction {
                        expr: expr_id,
                        val: inp,
                        kind: pt,
                    });
                }
            }

            input_reductions |= id_reductions;
            input_bcasts |= id_bcasts;
            input_ptypes |= id_ptypes;

            if id_reductions.any() {
                trace!(source = %inp, kinds = %id_reductions, "recording reduction source");
                add_to_source_map(&mut src_map, inp, id_reductions);
            }
        }

        // Reductions on the inputs require a guard on the outputs
        let mut output_preds = input_preds | input_reductions;

        // A broadcast along a guarded axis gives every lane the combined value
        let bcast_reset_mask = !(output_preds & input_bcasts);

        output_preds &= bcast_reset_mask;
        mask_source_map(&mut src_map, bcast_reset_mask);

        debug!(
            expr = %expr_id,
            op = %expr.op,
            inputs = %input_preds,
            reductions = %input_reductions,
            bcasts = %input_bcasts,
            outputs = %output_preds,
            "updated thread predicates"
        );

        for &out in &expr.outputs {
            if !fusion.is_tensor(out) {
                continue;
            }
            self.insert(out, PredicateInfo::new(output_preds, src_map.clone()))?;
        }
        Ok(())
    }

    pub fn get(&self, val: ValId) -> Option<&PredicateInfo> {
        self.records.get(&val)
    }

    pub fn contains(&self, val: ValId) -> bool {
        self.records.contains_key(&val)
    }

    pub fn at(&self, val: ValId) -> Result<&PredicateInfo, PredicateError> {
        self.records
            .get(&val)
            .ok_or(PredicateError::MissingPredicate { val })
    }

    /// Add a record for `val`, which must not have one yet.
    pub fn insert(&mut self, val: ValId, info: PredicateInfo) -> Result<(), PredicateError> {
        if self.records.contains_key(&val) {
            return Err(PredicateError::DuplicatePredicate { val });
        }
        self.records.insert(val, info);
        Ok(())
    }

    /// Give `copy` the record of `origin`. Nothing happens when `origin`
    /// has no record.
    pub fn duplicate(&mut self, copy: ValId, origin: ValId) -> Result<(), PredicateError> {
        match self.records.get(&origin) {
            Some(info) => {
                let info = info.clone();
                self.insert(copy, info)
            }
            None => Ok(()),
        }
    }

    /// Guard expression for `val`.
    pub fn get_expr(&self, val: ValId) -> Result<BoolExpr, PredicateError> {
        get_predicate(val, self.at(val)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ValId, &PredicateInfo)> {
        self.records.iter().map(|(v, i)| (*v, i))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
