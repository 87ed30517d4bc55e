use super::streams::{declare_stream_variants, stream_cost, StreamData};
use crate::capability::VariantCapabilities;
use crate::config::{
    ChecksumTolerance, KernelCost, KernelGroup, KernelInfo, ProblemSize, Real, SizeClass,
};
use crate::error::KernelError;
use crate::kernel::KernelSpec;

/// `out1 = in1 * in2; out2 = in1 + in2; out3 = in1 - in2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MulAddSub;

impl MulAddSub {
    pub const NAME: &'static str = "Basic_MULADDSUB";
    const DEFAULT_SIZE: usize = 1_000_000;
    const DEFAULT_REPS: usize = 350;

    pub fn new() -> Self {
        Self
    }
}

#[inline(always)]
fn muladdsub(a: Real, b: Real) -> (Real, Real, Real) {
    (a * b, a + b, a - b)
}

const GPU_BODY: &str = "out1[i] = in1[i] * in2[i];
  out2[i] = in1[i] + in2[i];
  out3[i] = in1[i] - in2[i];";

impl KernelSpec for MulAddSub {
    type Data = StreamData;

    fn info(&self) -> KernelInfo {
        KernelInfo::new(Self::NAME, KernelGroup::Basic, Self::DEFAULT_SIZE, Self::DEFAULT_REPS)
    }

    fn resolve(&self, class: SizeClass) -> ProblemSize {
        let (len, reps) = class.scale_linear(Self::DEFAULT_SIZE, Self::DEFAULT_REPS);
        ProblemSize::linear(class, len, reps)
    }

    fn cost(&self, size: &ProblemSize) -> KernelCost {
        stream_cost(size.dim(0), 3)
    }

    fn tolerance(&self, _size: &ProblemSize) -> ChecksumTolerance {
        ChecksumTolerance::Rounded { depth: 1 }
    }

    fn declare(&self, caps: &mut VariantCapabilities<StreamData>) {
        declare_stream_variants(caps, "muladdsub", muladdsub, GPU_BODY);
    }

    fn allocate(&self, size: &ProblemSize) -> Result<StreamData, KernelError> {
        StreamData::allocate(Self::NAME, size.dim(0))
    }

    fn checksum(&self, data: &StreamData) -> f64 {
        data.checksum()
    }
}
