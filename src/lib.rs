//! Thread predicate propagation for fused GPU kernels.
//!
//! A fusion is a dataflow graph of tensor operations whose iteration axes
//! may be bound to block and thread indices. When an axis is reduced in
//! parallel, only one lane ends up holding the combined value, so every
//! consumer of that value has to be guarded. This crate computes those
//! guards and splices them into kernel source.
//!
//! ```text
//! source ─► syntax::parse_fusion ─► Fusion ─► ThreadPredicateMap ─► KernelLowering
//! ```

pub mod config;
pub mod diagnostic;
pub mod ir;
pub mod kir;
pub mod lower;
pub mod report;
pub mod syntax;

pub use syntax::span;

pub use config::PredicateConfig;
pub use diagnostic::Diagnostic;
pub use ir::{Fusion, ParallelType, ParallelTypeBitmap};
pub use lower::{PredicateError, PredicateInfo, ThreadPredicateMap};
pub use syntax::{parse_fusion, ParsedFusion};

/// Parse `source` and run the thread predicate analysis over it.
pub fn analyze_source(
    source: &str,
) -> Result<(ParsedFusion, ThreadPredicateMap), Vec<Diagnostic>> {
    let parsed = parse_fusion(source)?;
    match ThreadPredicateMap::build(&parsed.fusion) {
        Ok(preds) => Ok((parsed, preds)),
        Err(err) => {
            let diag = Diagnostic::from_predicate_error(&err, &parsed);
            Err(vec![diag])
        }
    }
}
