//! Per-kernel lifecycle: allocate, run, checksum, release.

use crate::error::HarnessError;
use crate::runner::{run_timed, MonotonicTimer, Timer};
use kernelsuite_kernels::{ExecContext, Kernel, ProblemSize, TuningIndex, VariantId, Workload};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Uninitialized,
    DataAllocated,
    Executed,
    ChecksumComputed,
    Released,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::DataAllocated => "allocated",
            LifecycleState::Executed => "executed",
            LifecycleState::ChecksumComputed => "checksummed",
            LifecycleState::Released => "released",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub elapsed: Duration,
    pub reps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    Completed(Timing),
    /// The kernel does not declare the variant on this host.
    UnknownVariant,
    /// The variant is declared but has no tuning at this index.
    UnknownTuning,
}

/// Drives one kernel through one (variant, tuning) cycle at a resolved size.
///
/// Buffers live only between `set_up` and `tear_down`; a fresh cycle
/// allocates and fills them again.
pub struct KernelLifecycle<'k, T: Timer = MonotonicTimer> {
    kernel: &'k dyn Kernel,
    size: ProblemSize,
    state: LifecycleState,
    active: Option<(VariantId, TuningIndex)>,
    workload: Option<Box<dyn Workload + 'k>>,
    timing: Option<Timing>,
    checksum: Option<f64>,
    timer: T,
}

impl<'k> KernelLifecycle<'k> {
    pub fn new(kernel: &'k dyn Kernel, size: ProblemSize) -> Self {
        Self::with_timer(kernel, size, MonotonicTimer::default())
    }
}

impl<'k, T: Timer> KernelLifecycle<'k, T> {
    pub fn with_timer(kernel: &'k dyn Kernel, size: ProblemSize, timer: T) -> Self {
        Self {
            kernel,
            size,
            state: LifecycleState::Uninitialized,
            active: None,
            workload: None,
            timing: None,
            checksum: None,
            timer,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn size(&self) -> &ProblemSize {
        &self.size
    }

    pub fn active(&self) -> Option<(VariantId, TuningIndex)> {
        self.active
    }

    pub fn timing(&self) -> Option<Timing> {
        self.timing
    }

    pub fn checksum(&self) -> Option<f64> {
        self.checksum
    }

    /// Allocate and fill every buffer. The fill does not depend on the pair.
    pub fn set_up(&mut self, variant: VariantId, tuning: TuningIndex) -> Result<(), HarnessError> {
        self.expect_state("set up", &[LifecycleState::Uninitialized, LifecycleState::Released])?;
        let workload = self.kernel.set_up(&self.size)?;
        debug!(kernel = self.kernel.name(), %variant, %tuning, "buffers allocated");
        self.workload = Some(workload);
        self.active = Some((variant, tuning));
        self.timing = None;
        self.checksum = None;
        self.state = LifecycleState::DataAllocated;
        Ok(())
    }

    /// Time `reps` repetitions of the pair's strategy. Undeclared pairs and
    /// failures leave the state at `DataAllocated`.
    pub fn run(
        &mut self,
        variant: VariantId,
        tuning: TuningIndex,
        ctx: &ExecContext,
    ) -> Result<RunOutcome, HarnessError> {
        self.expect_state("run", &[LifecycleState::DataAllocated])?;
        if !self.kernel.supports(variant) {
            debug!(kernel = self.kernel.name(), %variant, "unknown variant");
            return Ok(RunOutcome::UnknownVariant);
        }
        if !self.kernel.supports_tuning(variant, tuning) {
            debug!(kernel = self.kernel.name(), %variant, %tuning, "unknown tuning");
            return Ok(RunOutcome::UnknownTuning);
        }

        let reps = self.size.reps;
        let workload = self
            .workload
            .as_mut()
            .ok_or(HarnessError::InvalidTransition {
                op: "run",
                state: self.state,
            })?;
        let mut launch = workload.launch(variant, tuning, ctx)?;
        let elapsed = run_timed(&mut *launch, reps, &mut self.timer)?;
        launch.finish()?;

        let timing = Timing { elapsed, reps };
        self.active = Some((variant, tuning));
        self.timing = Some(timing);
        self.state = LifecycleState::Executed;
        Ok(RunOutcome::Completed(timing))
    }

    /// Reduce the outputs of the last run into its checksum.
    pub fn update_checksum(&mut self) -> Result<f64, HarnessError> {
        self.expect_state("checksum", &[LifecycleState::Executed])?;
        let workload = self.workload.as_ref().ok_or(HarnessError::InvalidTransition {
            op: "checksum",
            state: self.state,
        })?;
        let checksum = workload.checksum();
        self.checksum = Some(checksum);
        self.state = LifecycleState::ChecksumComputed;
        Ok(checksum)
    }

    /// Free all buffers. Valid from any state, including after a skipped run
    /// and after a previous `tear_down`.
    pub fn tear_down(&mut self) {
        if self.workload.take().is_some() {
            debug!(kernel = self.kernel.name(), "buffers released");
        }
        self.state = LifecycleState::Released;
    }

    fn expect_state(
        &self,
        op: &'static str,
        allowed: &[LifecycleState],
    ) -> Result<(), HarnessError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(HarnessError::InvalidTransition { op, state: self.state })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernelsuite_backend_cpu::CpuRuntime;
    use kernelsuite_kernels::{
        sequential, ChecksumTolerance, HostCapabilities, KernelCost, KernelError, KernelGroup,
        KernelInfo, KernelSpec, Registered, RunParams, SizeClass, VariantCapabilities,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts allocations and body calls through shared counters.
    struct Probe {
        allocations: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl KernelSpec for Probe {
        type Data = (Vec<f64>, Arc<AtomicUsize>);

        fn info(&self) -> KernelInfo {
            KernelInfo::new("Test_PROBE", KernelGroup::Basic, 4, 3)
        }

        fn resolve(&self, class: SizeClass) -> ProblemSize {
            ProblemSize::linear(class, 4, 3)
        }

        fn cost(&self, _size: &ProblemSize) -> KernelCost {
            KernelCost::default()
        }

        fn tolerance(&self, _size: &ProblemSize) -> ChecksumTolerance {
            ChecksumTolerance::Exact
        }

        fn declare(&self, caps: &mut VariantCapabilities<Self::Data>) {
            caps.declare(
                VariantId::BaseSeq,
                "default",
                sequential(|(values, calls): &mut Self::Data| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    values.iter_mut().for_each(|v| *v += 1.0);
                }),
            );
        }

        fn allocate(&self, size: &ProblemSize) -> Result<Self::Data, KernelError> {
            self.allocations.fetch_add(1, Ordering::SeqCst);
            Ok((vec![0.0; size.dim(0)], Arc::clone(&self.calls)))
        }

        fn checksum(&self, (values, _): &Self::Data) -> f64 {
            values.iter().sum()
        }
    }

    fn probe() -> (Registered<Probe>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let allocations = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let kernel = Registered::new(
            Probe {
                allocations: Arc::clone(&allocations),
                calls: Arc::clone(&calls),
            },
            HostCapabilities::sequential_only(),
        );
        (kernel, allocations, calls)
    }

    fn context() -> anyhow::Result<ExecContext> {
        Ok(ExecContext::new(CpuRuntime::with_threads(1)?))
    }

    #[test]
    fn full_cycle_walks_every_state() -> anyhow::Result<()> {
        let (kernel, allocations, calls) = probe();
        let ctx = context()?;
        let size = kernel.resolve(&RunParams::default())?;
        let mut lifecycle = KernelLifecycle::new(&kernel, size);
        assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);

        lifecycle.set_up(VariantId::BaseSeq, TuningIndex::DEFAULT)?;
        assert_eq!(lifecycle.state(), LifecycleState::DataAllocated);

        let outcome = lifecycle.run(VariantId::BaseSeq, TuningIndex::DEFAULT, &ctx)?;
        assert!(matches!(outcome, RunOutcome::Completed(Timing { reps: 3, .. })));
        assert_eq!(lifecycle.state(), LifecycleState::Executed);

        assert_eq!(lifecycle.update_checksum()?, 12.0);
        assert_eq!(lifecycle.state(), LifecycleState::ChecksumComputed);

        lifecycle.tear_down();
        assert_eq!(lifecycle.state(), LifecycleState::Released);
        assert_eq!(allocations.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[test]
    fn unknown_variant_leaves_buffers_untouched() -> anyhow::Result<()> {
        let (kernel, _, calls) = probe();
        let ctx = context()?;
        let size = kernel.resolve(&RunParams::default())?;
        let mut lifecycle = KernelLifecycle::new(&kernel, size);
        lifecycle.set_up(VariantId::ForallGpu, TuningIndex::DEFAULT)?;

        let outcome = lifecycle.run(VariantId::ForallGpu, TuningIndex::DEFAULT, &ctx)?;
        assert_eq!(outcome, RunOutcome::UnknownVariant);
        let outcome = lifecycle.run(VariantId::BaseSeq, TuningIndex(3), &ctx)?;
        assert_eq!(outcome, RunOutcome::UnknownTuning);
        assert_eq!(lifecycle.state(), LifecycleState::DataAllocated);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(lifecycle.timing().is_none());
        Ok(())
    }

    #[test]
    fn out_of_order_calls_are_rejected() -> anyhow::Result<()> {
        let (kernel, _, _) = probe();
        let ctx = context()?;
        let size = kernel.resolve(&RunParams::default())?;
        let mut lifecycle = KernelLifecycle::new(&kernel, size);

        let err = lifecycle.run(VariantId::BaseSeq, TuningIndex::DEFAULT, &ctx).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::InvalidTransition {
                state: LifecycleState::Uninitialized,
                ..
            }
        ));
        lifecycle.set_up(VariantId::BaseSeq, TuningIndex::DEFAULT)?;
        assert!(lifecycle.set_up(VariantId::BaseSeq, TuningIndex::DEFAULT).is_err());
        assert!(lifecycle.update_checksum().is_err());
        Ok(())
    }

    #[test]
    fn tear_down_is_idempotent() -> anyhow::Result<()> {
        let (kernel, allocations, _) = probe();
        let size = kernel.resolve(&RunParams::default())?;
        let mut lifecycle = KernelLifecycle::new(&kernel, size);
        lifecycle.set_up(VariantId::BaseSeq, TuningIndex::DEFAULT)?;
        lifecycle.tear_down();
        lifecycle.tear_down();
        assert_eq!(lifecycle.state(), LifecycleState::Released);

        lifecycle.set_up(VariantId::BaseSeq, TuningIndex::DEFAULT)?;
        assert_eq!(allocations.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn repeated_cycles_reproduce_checksum() -> anyhow::Result<()> {
        let (kernel, _, _) = probe();
        let ctx = context()?;
        let size = kernel.resolve(&RunParams::default())?;
        let mut lifecycle = KernelLifecycle::new(&kernel, size);
        let mut checksums = Vec::new();
        for _ in 0..2 {
            lifecycle.set_up(VariantId::BaseSeq, TuningIndex::DEFAULT)?;
            lifecycle.run(VariantId::BaseSeq, TuningIndex::DEFAULT, &ctx)?;
            checksums.push(lifecycle.update_checksum()?);
            lifecycle.tear_down();
        }
        assert_eq!(checksums[0].to_bits(), checksums[1].to_bits());
        Ok(())
    }
}
