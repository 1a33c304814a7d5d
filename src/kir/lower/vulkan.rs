//! Vulkan lowering: emits a GLSL compute shader for SPIR-V compilation.
//!
//! Buffers are bound by the host in parameter order, so the shader body
//! only records that order in a comment.

use super::{kernel_params, KernelLowering};
use crate::ir::{Fusion, ParallelType};

pub struct VulkanLowering;

impl VulkanLowering {
    pub fn new() -> Self {
        Self
    }
}

impl KernelLowering for VulkanLowering {
    fn target_name(&self) -> &str {
        "vulkan"
    }

    fn index_name(&self, pt: ParallelType) -> String {
        let base = if pt.is_block() {
            "gl_WorkGroupID"
        } else {
            "gl_LocalInvocationID"
        };
        format!("{}.{}", base, pt.axis())
    }

    fn kernel_header(&self, fusion: &Fusion) -> String {
        let bindings: Vec<String> = kernel_params(fusion)
            .into_iter()
            .map(|v| fusion.val(v).name.clone())
            .collect();
        format!(
            "#version 450\n// {}: bindings {}\nvoid main() {{\n",
            fusion.name,
            bindings.join(", ")
        )
    }
}
