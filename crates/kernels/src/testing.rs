//! Helpers for driving kernels directly in unit tests.

use crate::config::ProblemSize;
use crate::kernel::Kernel;
use crate::strategy::ExecContext;
use crate::variant::{TuningIndex, VariantId};
use kernelsuite_backend_cpu::CpuRuntime;

pub(crate) fn context() -> anyhow::Result<ExecContext> {
    Ok(ExecContext::new(CpuRuntime::with_threads(4)?))
}

/// Checksum of every declared (variant, tuning), each on freshly allocated
/// data.
pub(crate) fn checksums(
    kernel: &dyn Kernel,
    size: &ProblemSize,
    ctx: &ExecContext,
) -> anyhow::Result<Vec<(VariantId, TuningIndex, f64)>> {
    let mut results = Vec::new();
    for variant in kernel.variants() {
        for index in 0..kernel.tunings(variant).len() {
            let tuning = TuningIndex(index);
            let mut workload = kernel.set_up(size)?;
            {
                let mut launch = workload.launch(variant, tuning, ctx)?;
                for _ in 0..size.reps {
                    launch.run_rep()?;
                }
                launch.synchronize()?;
                launch.finish()?;
            }
            results.push((variant, tuning, workload.checksum()));
        }
    }
    Ok(results)
}
