//! KernelLowering: splices thread predicates into GPU kernel source.
//!
//! Each GPU target implements `KernelLowering` to spell the block/thread
//! indices and the kernel signature its own way. Statement emission and
//! guard placement are shared: every expression becomes one statement,
//! wrapped in `if (<guard>)` whenever its outputs carry a thread predicate.

mod cuda;
mod metal;
mod vulkan;

use crate::ir::{Expr as FusionExpr, Fusion, ParallelType, ValId};
use crate::kir::BoolExpr;
use crate::lower::{PredicateError, ThreadPredicateMap};

pub use cuda::CudaLowering;
pub use metal::MetalLowering;
pub use vulkan::VulkanLowering;

/// Lowers a predicated fusion into GPU kernel source text.
pub trait KernelLowering {
    /// The target name (e.g. "cuda", "metal", "vulkan").
    fn target_name(&self) -> &str;

    /// Target spelling of the runtime index along `pt`.
    fn index_name(&self, pt: ParallelType) -> String;

    /// Kernel signature up to and including the opening brace.
    fn kernel_header(&self, fusion: &Fusion) -> String;

    /// Render a guard with this target's index names.
    fn lower_guard(&self, guard: &BoolExpr) -> String {
        guard
            .expr()
            .map_names(&|name: &str| match name.parse::<ParallelType>() {
                Ok(pt) => self.index_name(pt),
                Err(_) => name.to_string(),
            })
            .to_string()
    }

    /// Emit the whole kernel, one statement per expression in definition order.
    fn lower(&self, fusion: &Fusion, preds: &ThreadPredicateMap) -> Result<String, PredicateError> {
        let mut out = self.kernel_header(fusion);
        for expr_id in fusion.exprs()? {
            let expr = fusion.expr(expr_id);
            let stmt = statement(fusion, expr);
            let guard = match expr.outputs.iter().find(|&&o| fusion.is_tensor(o)) {
                Some(&tv) => preds.get_expr(tv)?,
                None => BoolExpr::literal(true),
            };
            if guard.is_true() {
                out.push_str(&format!("  {}\n", stmt));
            } else {
                out.push_str(&format!(
                    "  if ({}) {{\n    {}\n  }}\n",
                    self.lower_guard(&guard),
                    stmt
                ));
            }
        }
        out.push_str("}\n");
        Ok(out)
    }
}

/// `T2 = add(T0, T1);` or `(T3, T4) = welford(T2);`
fn statement(fusion: &Fusion, expr: &FusionExpr) -> String {
    let names = |ids: &[ValId]| -> Vec<String> {
        ids.iter().map(|&v| fusion.val(v).name.clone()).collect()
    };
    let outs = names(&expr.outputs);
    let lhs = if outs.len() == 1 {
        outs[0].clone()
    } else {
        format!("({})", outs.join(", "))
    };
    format!("{} = {}({});", lhs, expr.op, names(&expr.inputs).join(", "))
}

/// Kernel parameters: graph inputs, then outputs that are not also inputs.
pub(crate) fn kernel_params(fusion: &Fusion) -> Vec<ValId> {
    let mut params: Vec<ValId> = fusion.inputs().to_vec();
    for &out in fusion.outputs() {
        if !params.contains(&out) {
            params.push(out);
        }
    }
    params
}

/// Create a kernel-lowering backend for the given target name.
pub fn create_kernel_lowering(target: &str) -> Option<Box<dyn KernelLowering>> {
    match target {
        "cuda" | "ptx" => Some(Box::new(CudaLowering::new())),
        "metal" | "msl" => Some(Box::new(MetalLowering::new())),
        "vulkan" | "spirv" | "spir-v" => Some(Box::new(VulkanLowering::new())),
        _ => None,
    }
}
