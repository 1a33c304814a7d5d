//! Metal lowering: emits a Metal Shading Language compute kernel.
//!
//! Thread and threadgroup positions arrive as `tid` / `tgid` kernel
//! arguments; every fusion parameter is bound to its own buffer slot.

use super::{kernel_params, KernelLowering};
use crate::ir::{DataType, Fusion, ParallelType, ValKind};

pub struct MetalLowering;

impl MetalLowering {
    pub fn new() -> Self {
        Self
    }
}

fn scalar_type(dtype: DataType) -> &'static str {
    match dtype {
        DataType::Bool => "bool",
        DataType::Int => "long",
        DataType::Float => "float",
    }
}

impl KernelLowering for MetalLowering {
    fn target_name(&self) -> &str {
        "metal"
    }

    fn index_name(&self, pt: ParallelType) -> String {
        let base = if pt.is_block() { "tgid" } else { "tid" };
        format!("{}.{}", base, pt.axis())
    }

    fn kernel_header(&self, fusion: &Fusion) -> String {
        let mut out = format!("kernel void {}(\n", fusion.name);
        for (slot, v) in kernel_params(fusion).into_iter().enumerate() {
            let val = fusion.val(v);
            let decl = match &val.kind {
                ValKind::Tensor(_) => format!("device float* {}", val.name),
                ValKind::Scalar(dtype) => format!("constant {}& {}", scalar_type(*dtype), val.name),
            };
            out.push_str(&format!("    {} [[buffer({})]],\n", decl, slot));
        }
        out.push_str("    uint3 tid [[thread_position_in_threadgroup]],\n");
        out.push_str("    uint3 tgid [[threadgroup_position_in_grid]]) {\n");
        out
    }
}
