use anyhow::Result;
use kernelsuite_backend_cpu::CpuRuntime;
use kernelsuite_harness::{
    ExecutorOptions, KernelLifecycle, LifecycleState, RunOutcome, Selection, SkipReason,
    SuiteExecutor, SuiteReport, VariantRequest,
};
use kernelsuite_kernels::basic::IndexList;
use kernelsuite_kernels::{
    sequential, try_alloc, ChecksumTolerance, ExecContext, HostCapabilities, Kernel, KernelCost,
    KernelError, KernelGroup, KernelInfo, KernelRegistry, KernelSpec, ProblemSize, Registered,
    RunParams, SizeClass, TuningIndex, VariantCapabilities, VariantId,
};
use kernelsuite_suite::{SuiteOptions, SuiteSession};
use std::time::Duration;

fn context() -> Result<ExecContext> {
    Ok(ExecContext::new(CpuRuntime::with_threads(2)?))
}

fn mini_options() -> SuiteOptions {
    SuiteOptions {
        size: "mini".into(),
        reps: Some(1),
        threads: Some(2),
        gpu: false,
        ..SuiteOptions::default()
    }
}

/// Sleeps for a fixed interval per repetition.
struct Sleeper;

impl KernelSpec for Sleeper {
    type Data = ();

    fn info(&self) -> KernelInfo {
        KernelInfo::new("Test_SLEEP", KernelGroup::Basic, 1, 1)
    }

    fn resolve(&self, class: SizeClass) -> ProblemSize {
        ProblemSize::linear(class, 1, 1)
    }

    fn cost(&self, _size: &ProblemSize) -> KernelCost {
        KernelCost {
            its_per_rep: 1,
            kernels_per_rep: 1,
            ..KernelCost::default()
        }
    }

    fn tolerance(&self, _size: &ProblemSize) -> ChecksumTolerance {
        ChecksumTolerance::Exact
    }

    fn declare(&self, caps: &mut VariantCapabilities<()>) {
        caps.declare(
            VariantId::BaseSeq,
            "default",
            sequential(|_: &mut ()| std::thread::sleep(Duration::from_millis(2))),
        );
    }

    fn allocate(&self, _size: &ProblemSize) -> Result<(), KernelError> {
        Ok(())
    }

    fn checksum(&self, _data: &()) -> f64 {
        0.0
    }
}

/// Asks for more memory than any host can provide.
struct Oversized;

impl KernelSpec for Oversized {
    type Data = Vec<f64>;

    fn info(&self) -> KernelInfo {
        KernelInfo::new("Test_OVERSIZED", KernelGroup::Basic, usize::MAX / 4, 1)
    }

    fn resolve(&self, class: SizeClass) -> ProblemSize {
        ProblemSize::linear(class, usize::MAX / 4, 1)
    }

    fn cost(&self, _size: &ProblemSize) -> KernelCost {
        KernelCost::default()
    }

    fn tolerance(&self, _size: &ProblemSize) -> ChecksumTolerance {
        ChecksumTolerance::Exact
    }

    fn declare(&self, caps: &mut VariantCapabilities<Vec<f64>>) {
        caps.declare(VariantId::BaseSeq, "default", sequential(|_: &mut Vec<f64>| {}));
    }

    fn allocate(&self, size: &ProblemSize) -> Result<Vec<f64>, KernelError> {
        try_alloc("x", size.dim(0), 0.0)
    }

    fn checksum(&self, data: &Vec<f64>) -> f64 {
        data.iter().sum()
    }
}

#[test]
fn every_kernel_agrees_with_reference_at_mini() -> Result<()> {
    let session = SuiteSession::new(mini_options())?;
    let run = session.run()?;

    assert_eq!(run.kernels.len(), 5);
    assert!(run.kernels.iter().all(|k| k.is_complete()));
    assert!(run.records.iter().all(|r| r.is_complete()));
    assert!(run.discrepancies.is_empty(), "{:?}", run.discrepancies);
    assert!(run.skipped.is_empty());

    let report = SuiteReport::from_run(&run);
    assert_eq!(report.rows.len(), run.records.len());
    let rows = report.as_map();
    assert_eq!(rows["Polybench_3MM/Base_Seq/0"].speedup, Some(1.0));
    Ok(())
}

#[test]
fn repeated_cycles_are_deterministic() -> Result<()> {
    let registry = KernelRegistry::with_default_kernels(HostCapabilities::default())?;
    let ctx = context()?;
    for kernel in registry.kernels() {
        let size = kernel.resolve(&RunParams::new(SizeClass::Mini).with_reps(2))?;
        let mut lifecycle = KernelLifecycle::new(kernel.as_ref(), size);
        let mut checksums = Vec::new();
        for _ in 0..2 {
            lifecycle.set_up(VariantId::ForallThreads, TuningIndex::DEFAULT)?;
            let outcome = lifecycle.run(VariantId::ForallThreads, TuningIndex::DEFAULT, &ctx)?;
            assert!(matches!(outcome, RunOutcome::Completed(_)), "{}", kernel.name());
            checksums.push(lifecycle.update_checksum()?.to_bits());
            lifecycle.tear_down();
        }
        assert_eq!(checksums[0], checksums[1], "{}", kernel.name());
    }
    Ok(())
}

#[test]
fn index_list_example_matches_across_variants() -> Result<()> {
    let mut registry = KernelRegistry::new(HostCapabilities::default());
    registry.register(IndexList::with_input(vec![0.5, -0.25, 2.0, 1.0, -3.0]))?;
    let selection = Selection {
        variants: vec![
            VariantRequest::Known(VariantId::BaseSeq),
            VariantRequest::Known(VariantId::IterAlt),
        ],
        ..Selection::default()
    };
    let options = ExecutorOptions {
        run_params: RunParams::new(SizeClass::Small).with_reps(3),
        ..ExecutorOptions::default()
    };
    let run = SuiteExecutor::new(options).run(&registry, &selection, &context()?);

    let checksums: Vec<u64> = run
        .records
        .iter()
        .filter_map(|record| record.checksum.map(f64::to_bits))
        .collect();
    assert_eq!(checksums.len(), 2);
    assert_eq!(checksums[0], checksums[1]);
    // indices [0, 2, 3] weighted by position, plus the length
    assert_eq!(f64::from_bits(checksums[0]), 16.0);
    assert!(run.discrepancies.is_empty());
    Ok(())
}

#[test]
fn undeclared_variants_are_reported_not_run() -> Result<()> {
    let registry = KernelRegistry::with_default_kernels(HostCapabilities::sequential_only())?;
    let selection = Selection {
        kernels: vec!["Basic_MULADDSUB".into()],
        variants: vec![
            VariantRequest::parse("Hyper_Seq"),
            VariantRequest::Known(VariantId::BaseGpu),
            VariantRequest::Known(VariantId::ForallThreads),
        ],
        ..Selection::default()
    };
    let options = ExecutorOptions {
        run_params: RunParams::new(SizeClass::Mini),
        ..ExecutorOptions::default()
    };
    let run = SuiteExecutor::new(options).run(&registry, &selection, &context()?);

    assert!(run.records.is_empty());
    assert_eq!(run.skipped.len(), 3);
    assert!(run.skipped.iter().all(|s| s.reason == SkipReason::UnknownVariant));
    assert_eq!(run.skipped[0].variant.as_deref(), Some("Hyper_Seq"));
    Ok(())
}

#[test]
fn teardown_after_set_up_alone_is_idempotent() -> Result<()> {
    let registry = KernelRegistry::with_default_kernels(HostCapabilities::default())?;
    let kernel = registry.find("Polybench_3MM").expect("registered");
    let size = kernel.resolve(&RunParams::new(SizeClass::Mini))?;
    let mut lifecycle = KernelLifecycle::new(kernel.as_ref(), size);
    lifecycle.set_up(VariantId::BaseSeq, TuningIndex::DEFAULT)?;
    lifecycle.tear_down();
    lifecycle.tear_down();
    assert_eq!(lifecycle.state(), LifecycleState::Released);
    assert!(lifecycle.checksum().is_none());
    Ok(())
}

#[test]
fn allocation_failure_moves_on_to_next_kernel() -> Result<()> {
    let mut registry = KernelRegistry::new(HostCapabilities::sequential_only());
    registry.register(Oversized)?;
    registry.register(kernelsuite_kernels::basic::Init3::new())?;
    let options = ExecutorOptions {
        run_params: RunParams::new(SizeClass::Mini).with_reps(1),
        ..ExecutorOptions::default()
    };
    let run = SuiteExecutor::new(options).run(&registry, &Selection::default(), &context()?);

    let oversized = run.kernel("Test_OVERSIZED").expect("summary");
    assert!(!oversized.is_complete());
    assert!(oversized.failure.as_deref().is_some_and(|f| f.contains("allocate")));
    assert_eq!(run.records.for_kernel("Test_OVERSIZED").count(), 0);

    let init3 = run.kernel("Basic_INIT3").expect("summary");
    assert!(init3.is_complete());
    assert_eq!(run.records.for_kernel("Basic_INIT3").count(), 4);

    let report = SuiteReport::from_run(&run);
    assert!(report.incomplete_kernels.contains_key("Test_OVERSIZED"));
    Ok(())
}

#[test]
fn elapsed_time_grows_with_repetitions() -> Result<()> {
    let kernel = Registered::new(Sleeper, HostCapabilities::sequential_only());
    let ctx = context()?;
    let mut elapsed = Vec::new();
    for reps in [1, 8, 32] {
        let size = kernel.resolve(&RunParams::default().with_reps(reps))?;
        let mut lifecycle = KernelLifecycle::new(&kernel, size);
        lifecycle.set_up(VariantId::BaseSeq, TuningIndex::DEFAULT)?;
        match lifecycle.run(VariantId::BaseSeq, TuningIndex::DEFAULT, &ctx)? {
            RunOutcome::Completed(timing) => elapsed.push(timing.elapsed),
            other => panic!("unexpected outcome {other:?}"),
        }
        lifecycle.tear_down();
    }
    assert!(elapsed[0] >= Duration::from_millis(2));
    assert!(elapsed.windows(2).all(|w| w[0] <= w[1]), "{elapsed:?}");
    Ok(())
}

#[test]
fn total_work_increases_with_size_class() -> Result<()> {
    let registry = KernelRegistry::with_default_kernels(HostCapabilities::default())?;
    for kernel in registry.kernels() {
        let work = SizeClass::ALL
            .iter()
            .map(|&class| -> Result<u128> {
                let size = kernel.resolve(&RunParams::new(class))?;
                Ok(kernel.cost(&size).operations_per_rep() as u128 * size.reps as u128)
            })
            .collect::<Result<Vec<u128>>>()?;
        assert!(work.windows(2).all(|w| w[0] < w[1]), "{}: {work:?}", kernel.name());
    }
    Ok(())
}

#[test]
fn zero_reps_is_an_untimed_no_op() -> Result<()> {
    let session = SuiteSession::new(SuiteOptions {
        kernels: vec!["Basic_MULADDSUB".into()],
        reps: Some(0),
        ..mini_options()
    })?;
    let report = session.run_report()?;
    assert!(!report.rows.is_empty());
    for row in &report.rows {
        assert_eq!(row.reps, 0);
        assert_eq!(row.elapsed_s, 0.0);
        assert!(row.metrics.is_none());
        assert!(row.speedup.is_none());
    }
    Ok(())
}
