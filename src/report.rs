//! Table-style summary of a thread predicate analysis.

use crate::ir::Fusion;
use crate::lower::{PredicateError, PredicateInfo, ThreadPredicateMap};

const NAME_WIDTH: usize = 12;
const COLUMN_WIDTH: usize = 20;
const LINE_WIDTH: usize = 72;

/// Format one line per analyzed tensor in value order.
///
/// Tensors that need no guard are listed only with `show_all`.
pub fn format_report(
    fusion: &Fusion,
    preds: &ThreadPredicateMap,
    show_all: bool,
) -> Result<String, PredicateError> {
    let mut out = String::new();
    out.push_str(&format!("Thread predicates: {}\n", fusion.name));
    out.push_str(&format!(
        "{:<nw$} {:<cw$} {:<cw$} {}\n",
        "Value",
        "Bits",
        "Sources",
        "Guard",
        nw = NAME_WIDTH,
        cw = COLUMN_WIDTH
    ));
    out.push_str(&"-".repeat(LINE_WIDTH));
    out.push('\n');

    let mut tensors = 0;
    let mut guarded = 0;
    for val in fusion.vals() {
        let Some(info) = preds.get(val) else {
            continue;
        };
        tensors += 1;
        if info.pred.any() {
            guarded += 1;
        } else if !show_all {
            continue;
        }
        out.push_str(&format!(
            "{:<nw$} {:<cw$} {:<cw$} {}\n",
            fusion.val(val).name,
            info.pred.to_string(),
            format_sources(fusion, info),
            preds.get_expr(val)?,
            nw = NAME_WIDTH,
            cw = COLUMN_WIDTH
        ));
    }

    out.push_str(&"-".repeat(LINE_WIDTH));
    out.push('\n');
    out.push_str(&format!("{} of {} tensors guarded\n", guarded, tensors));
    Ok(out)
}

/// `bidx<-T1, tidx<-T1`, or `-`.
fn format_sources(fusion: &Fusion, info: &PredicateInfo) -> String {
    let parts: Vec<String> = info
        .sources
        .iter()
        .flat_map(|(pt, vals)| {
            vals.iter()
                .map(move |&v| format!("{}<-{}", pt.short_name(), fusion.val(v).name))
        })
        .collect();
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}
