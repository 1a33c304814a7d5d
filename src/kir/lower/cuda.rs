//! CUDA lowering: emits a `__global__` kernel with predicated statements.
//!
//! Thread guards use the builtin `threadIdx` / `blockIdx` vectors; grid
//! reduction flags are referenced by name and declared by the reduction
//! itself.

use super::{kernel_params, KernelLowering};
use crate::ir::{DataType, Fusion, ParallelType, ValKind};

pub struct CudaLowering;

impl CudaLowering {
    pub fn new() -> Self {
        Self
    }
}

fn scalar_type(dtype: DataType) -> &'static str {
    match dtype {
        DataType::Bool => "bool",
        DataType::Int => "int64_t",
        DataType::Float => "float",
    }
}

impl KernelLowering for CudaLowering {
    fn target_name(&self) -> &str {
        "cuda"
    }

    fn index_name(&self, pt: ParallelType) -> String {
        pt.cuda_name().to_string()
    }

    fn kernel_header(&self, fusion: &Fusion) -> String {
        let params: Vec<String> = kernel_params(fusion)
            .into_iter()
            .map(|v| {
                let val = fusion.val(v);
                match &val.kind {
                    ValKind::Tensor(_) => format!("Tensor<float> {}", val.name),
                    ValKind::Scalar(dtype) => format!("{} {}", scalar_type(*dtype), val.name),
                }
            })
            .collect();
        format!("__global__ void {}({}) {{\n", fusion.name, params.join(", "))
    }
}
