use super::streams::{declare_stream_variants, stream_cost, StreamData};
use crate::capability::VariantCapabilities;
use crate::config::{
    ChecksumTolerance, KernelCost, KernelGroup, KernelInfo, ProblemSize, Real, SizeClass,
};
use crate::error::KernelError;
use crate::kernel::KernelSpec;

/// `out1 = out2 = out3 = -in1 - in2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Init3;

impl Init3 {
    pub const NAME: &'static str = "Basic_INIT3";
    const DEFAULT_SIZE: usize = 1_000_000;
    const DEFAULT_REPS: usize = 500;

    pub fn new() -> Self {
        Self
    }
}

#[inline(always)]
fn init3(a: Real, b: Real) -> (Real, Real, Real) {
    let value = -a - b;
    (value, value, value)
}

const GPU_BODY: &str = "let value = -in1[i] - in2[i];
  out1[i] = value;
  out2[i] = value;
  out3[i] = value;";

impl KernelSpec for Init3 {
    type Data = StreamData;

    fn info(&self) -> KernelInfo {
        KernelInfo::new(Self::NAME, KernelGroup::Basic, Self::DEFAULT_SIZE, Self::DEFAULT_REPS)
    }

    fn resolve(&self, class: SizeClass) -> ProblemSize {
        let (len, reps) = class.scale_linear(Self::DEFAULT_SIZE, Self::DEFAULT_REPS);
        ProblemSize::linear(class, len, reps)
    }

    fn cost(&self, size: &ProblemSize) -> KernelCost {
        stream_cost(size.dim(0), 1)
    }

    fn tolerance(&self, _size: &ProblemSize) -> ChecksumTolerance {
        ChecksumTolerance::Rounded { depth: 1 }
    }

    fn declare(&self, caps: &mut VariantCapabilities<StreamData>) {
        declare_stream_variants(caps, "init3", init3, GPU_BODY);
    }

    fn allocate(&self, size: &ProblemSize) -> Result<StreamData, KernelError> {
        StreamData::allocate(Self::NAME, size.dim(0))
    }

    fn checksum(&self, data: &StreamData) -> f64 {
        data.checksum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Kernel, Registered};
    use crate::testing::{checksums, context};
    use crate::variant::HostCapabilities;
    use crate::RunParams;

    #[test]
    fn all_outputs_hold_the_negated_sum() {
        assert_eq!(init3(1.5, 0.25), (-1.75, -1.75, -1.75));
    }

    #[test]
    fn sequential_only_host_declares_four_variants() -> anyhow::Result<()> {
        let kernel = Registered::new(Init3::new(), HostCapabilities::sequential_only());
        let size = kernel.resolve(&RunParams::new(SizeClass::Mini).with_reps(1))?;
        let results = checksums(&kernel, &size, &context()?)?;
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|(_, _, checksum)| *checksum == results[0].2));
        assert!(results[0].2 < 0.0);
        Ok(())
    }
}
