//! Lowering passes that analyze a `Fusion` ahead of kernel emission.

pub mod thread_predicate;

pub use thread_predicate::{
    get_predicate, PredicateError, PredicateInfo, SourceMap, ThreadPredicateMap,
};
