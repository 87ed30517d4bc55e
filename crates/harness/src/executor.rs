//! Drives a selection of kernels, variants and tunings through the lifecycle.

use crate::error::HarnessError;
use crate::lifecycle::{KernelLifecycle, RunOutcome};
use crate::records::{RunKey, RunRecord, RunRecordTable, RunStatus};
use crate::runner::{MonotonicTimer, Timer};
use crate::validate::{CrossValidator, Discrepancy, RunReference};
use kernelsuite_kernels::{
    DynKernel, ExecContext, Kernel, KernelCost, KernelGroup, KernelRegistry, ProblemSize, RunParams,
    TuningIndex, VariantId,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutorOptions {
    pub run_params: RunParams,
    /// Times the whole selection is driven.
    pub passes: usize,
    pub keep_history: bool,
    pub reference: RunReference,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            run_params: RunParams::default(),
            passes: 1,
            keep_history: false,
            reference: RunReference::default(),
        }
    }
}

/// A requested variant name, parsed or kept verbatim when unrecognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantRequest {
    Known(VariantId),
    Unknown(String),
}

impl VariantRequest {
    pub fn parse(name: &str) -> Self {
        VariantId::lookup(name)
            .map(VariantRequest::Known)
            .unwrap_or_else(|| VariantRequest::Unknown(name.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TuningSelection {
    #[default]
    All,
    /// Tuning names, or indices written as integers.
    Only(Vec<String>),
}

impl TuningSelection {
    fn matches(&self, index: usize, name: &str) -> bool {
        match self {
            TuningSelection::All => true,
            TuningSelection::Only(tokens) => tokens
                .iter()
                .any(|token| token == name || token.parse::<usize>() == Ok(index)),
        }
    }
}

/// What to run. Empty lists mean "everything".
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Kernel names or group names.
    pub kernels: Vec<String>,
    pub exclude_kernels: Vec<String>,
    pub variants: Vec<VariantRequest>,
    pub exclude_variants: Vec<VariantId>,
    pub tunings: TuningSelection,
}

impl Selection {
    fn kernel_matches(token: &str, kernel: &dyn Kernel) -> bool {
        token.eq_ignore_ascii_case(kernel.name())
            || token.eq_ignore_ascii_case(kernel.info().group.name())
    }

    fn selects(&self, kernel: &dyn Kernel) -> bool {
        let included = self.kernels.is_empty()
            || self.kernels.iter().any(|t| Self::kernel_matches(t, kernel));
        included && !self.exclude_kernels.iter().any(|t| Self::kernel_matches(t, kernel))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    UnknownKernel,
    UnknownVariant,
    UnknownTuning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipEntry {
    pub kernel: String,
    pub variant: Option<String>,
    pub tuning: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelRunSummary {
    pub kernel: String,
    pub group: KernelGroup,
    pub size: Option<ProblemSize>,
    pub cost: KernelCost,
    /// Why the kernel stopped early, if it did.
    pub failure: Option<String>,
}

impl KernelRunSummary {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Everything one executor run produced.
#[derive(Debug, Clone)]
pub struct SuiteRun {
    pub options: ExecutorOptions,
    pub records: RunRecordTable,
    pub kernels: Vec<KernelRunSummary>,
    pub skipped: Vec<SkipEntry>,
    pub discrepancies: Vec<Discrepancy>,
}

impl SuiteRun {
    pub fn kernel(&self, name: &str) -> Option<&KernelRunSummary> {
        self.kernels.iter().find(|summary| summary.kernel == name)
    }
}

#[derive(Debug, Default, PartialEq)]
struct KernelPlan {
    pairs: Vec<(VariantId, TuningIndex)>,
    /// Tuning names that match nothing declared under the variant.
    unmatched: Vec<(VariantId, String)>,
}

/// Planned (variant, tuning) pairs for one kernel. Pairs the kernel does not
/// declare stay in the plan so the lifecycle reports them.
fn plan_pairs(kernel: &dyn Kernel, selection: &Selection) -> KernelPlan {
    let requested: Vec<VariantId> = if selection.variants.is_empty() {
        kernel.variants()
    } else {
        selection
            .variants
            .iter()
            .filter_map(|request| match request {
                VariantRequest::Known(variant) => Some(*variant),
                VariantRequest::Unknown(_) => None,
            })
            .collect()
    };

    let mut plan = KernelPlan::default();
    for variant in requested {
        if selection.exclude_variants.contains(&variant) {
            continue;
        }
        let tunings = kernel.tunings(variant);
        if tunings.is_empty() {
            plan.pairs.push((variant, TuningIndex::DEFAULT));
            continue;
        }
        let before = plan.pairs.len();
        for (index, name) in tunings.iter().enumerate() {
            if selection.tunings.matches(index, name) {
                plan.pairs.push((variant, TuningIndex(index)));
            }
        }
        if plan.pairs.len() == before {
            if let TuningSelection::Only(tokens) = &selection.tunings {
                for token in tokens {
                    match token.parse::<usize>() {
                        Ok(index) => plan.pairs.push((variant, TuningIndex(index))),
                        Err(_) => plan.unmatched.push((variant, token.clone())),
                    }
                }
            }
        }
    }
    plan
}

/// Runs selections through fresh lifecycles. Each pair gets its own timer
/// from `timers`.
pub struct SuiteExecutor<F = fn() -> MonotonicTimer> {
    options: ExecutorOptions,
    timers: F,
}

impl SuiteExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self {
            options,
            timers: MonotonicTimer::default,
        }
    }
}

impl<F, T> SuiteExecutor<F>
where
    F: Fn() -> T,
    T: Timer,
{
    pub fn with_timers(options: ExecutorOptions, timers: F) -> Self {
        Self { options, timers }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Run every selected combination. Failures are recorded in the result,
    /// never returned.
    pub fn run(
        &self,
        registry: &KernelRegistry,
        selection: &Selection,
        ctx: &ExecContext,
    ) -> SuiteRun {
        let mut run = SuiteRun {
            options: self.options,
            records: if self.options.keep_history {
                RunRecordTable::with_history()
            } else {
                RunRecordTable::new()
            },
            kernels: Vec::new(),
            skipped: Vec::new(),
            discrepancies: Vec::new(),
        };

        for token in &selection.kernels {
            let known = registry
                .kernels()
                .iter()
                .any(|kernel| Selection::kernel_matches(token, kernel.as_ref()));
            if !known {
                warn!(kernel = %token, "unknown kernel or group");
                run.skipped.push(SkipEntry {
                    kernel: token.clone(),
                    variant: None,
                    tuning: None,
                    reason: SkipReason::UnknownKernel,
                });
            }
        }

        let kernels: Vec<DynKernel> = registry
            .kernels()
            .iter()
            .filter(|kernel| selection.selects(kernel.as_ref()))
            .cloned()
            .collect();

        for kernel in &kernels {
            for request in &selection.variants {
                if let VariantRequest::Unknown(name) = request {
                    run.skipped.push(SkipEntry {
                        kernel: kernel.name().to_string(),
                        variant: Some(name.clone()),
                        tuning: None,
                        reason: SkipReason::UnknownVariant,
                    });
                }
            }
        }

        let passes = self.options.passes.max(1);
        for pass in 0..passes {
            for kernel in &kernels {
                self.run_kernel(kernel.as_ref(), selection, ctx, pass == 0, &mut run);
            }
        }

        let validator = CrossValidator::new(self.options.reference);
        for summary in &run.kernels {
            let Some(size) = &summary.size else { continue };
            let Some(kernel) = kernels.iter().find(|k| k.name() == summary.kernel) else {
                continue;
            };
            let found = validator.validate(&summary.kernel, kernel.tolerance(size), &run.records);
            run.discrepancies.extend(found);
        }

        info!(
            kernels = run.kernels.len(),
            records = run.records.len(),
            skipped = run.skipped.len(),
            discrepancies = run.discrepancies.len(),
            "suite run finished"
        );
        run
    }

    fn run_kernel(
        &self,
        kernel: &dyn Kernel,
        selection: &Selection,
        ctx: &ExecContext,
        first_pass: bool,
        run: &mut SuiteRun,
    ) {
        let name = kernel.name().to_string();
        if first_pass {
            run.kernels.push(KernelRunSummary {
                kernel: name.clone(),
                group: kernel.info().group,
                size: None,
                cost: KernelCost::default(),
                failure: None,
            });
        }
        let Some(slot) = run.kernels.iter().position(|summary| summary.kernel == name) else {
            return;
        };
        run.kernels[slot].failure = None;

        let size = match kernel.resolve(&self.options.run_params) {
            Ok(size) => size,
            Err(err) => {
                warn!(kernel = %name, error = %err, "failed to resolve problem size");
                run.kernels[slot].failure = Some(err.to_string());
                return;
            }
        };
        run.kernels[slot].cost = kernel.cost(&size);
        run.kernels[slot].size = Some(size.clone());
        info!(
            kernel = %name,
            class = %size.class,
            dims = ?size.dims,
            reps = size.reps,
            "running kernel"
        );

        let plan = plan_pairs(kernel, selection);
        if first_pass {
            for (variant, token) in &plan.unmatched {
                warn!(kernel = %name, %variant, tuning = %token, "unknown tuning");
                run.skipped.push(SkipEntry {
                    kernel: name.clone(),
                    variant: Some(variant.name().to_string()),
                    tuning: Some(token.clone()),
                    reason: SkipReason::UnknownTuning,
                });
            }
        }

        for (variant, tuning) in plan.pairs {
            let mut lifecycle = KernelLifecycle::with_timer(kernel, size.clone(), (self.timers)());
            if let Err(err) = lifecycle.set_up(variant, tuning) {
                warn!(kernel = %name, error = %err, "set up failed, skipping remaining runs");
                run.kernels[slot].failure = Some(err.to_string());
                lifecycle.tear_down();
                return;
            }

            let key = RunKey::new(name.clone(), variant, tuning);
            match lifecycle.run(variant, tuning, ctx) {
                Ok(RunOutcome::Completed(timing)) => {
                    let record = match lifecycle.update_checksum() {
                        Ok(checksum) => self.record(
                            kernel,
                            key,
                            timing.elapsed,
                            timing.reps,
                            Some(checksum),
                            RunStatus::Complete,
                        ),
                        Err(err) => self.failed(kernel, key, size.reps, &err),
                    };
                    run.records.upsert(record);
                }
                Ok(RunOutcome::UnknownVariant) => {
                    if first_pass {
                        run.skipped.push(SkipEntry {
                            kernel: name.clone(),
                            variant: Some(variant.name().to_string()),
                            tuning: None,
                            reason: SkipReason::UnknownVariant,
                        });
                    }
                }
                Ok(RunOutcome::UnknownTuning) => {
                    if first_pass {
                        run.skipped.push(SkipEntry {
                            kernel: name.clone(),
                            variant: Some(variant.name().to_string()),
                            tuning: Some(tuning.to_string()),
                            reason: SkipReason::UnknownTuning,
                        });
                    }
                }
                Err(err) => {
                    warn!(kernel = %name, %variant, %tuning, error = %err, "run failed");
                    run.records.upsert(self.failed(kernel, key, size.reps, &err));
                }
            }
            lifecycle.tear_down();
        }
    }

    fn record(
        &self,
        kernel: &dyn Kernel,
        key: RunKey,
        elapsed: Duration,
        reps: usize,
        checksum: Option<f64>,
        status: RunStatus,
    ) -> RunRecord {
        let tuning_name = kernel
            .tunings(key.variant)
            .get(key.tuning.get())
            .cloned()
            .unwrap_or_else(|| key.tuning.to_string());
        RunRecord {
            precision: kernel.precision(key.variant, key.tuning).unwrap_or_default(),
            key,
            tuning_name,
            elapsed,
            reps,
            checksum,
            status,
            history: Vec::new(),
        }
    }

    fn failed(
        &self,
        kernel: &dyn Kernel,
        key: RunKey,
        reps: usize,
        err: &HarnessError,
    ) -> RunRecord {
        self.record(
            kernel,
            key,
            Duration::ZERO,
            reps,
            None,
            RunStatus::Incomplete {
                reason: err.to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RunMetrics;
    use kernelsuite_backend_cpu::CpuRuntime;
    use kernelsuite_kernels::basic::Init3;
    use kernelsuite_kernels::{
        sequential, try_sequential, ChecksumAccumulator, ChecksumTolerance, HostCapabilities,
        KernelError, KernelInfo, KernelSpec, SizeClass, VariantCapabilities,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// `Base_Seq` always succeeds; `Iter_Alt` fails on the calls `fails`
    /// selects. The first allocation is refused when `refuse_first_allocation`.
    struct Flaky {
        calls: Arc<AtomicUsize>,
        allocations: AtomicUsize,
        fails: fn(usize) -> bool,
        refuse_first_allocation: bool,
    }

    impl Flaky {
        fn new(fails: fn(usize) -> bool) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                allocations: AtomicUsize::new(0),
                fails,
                refuse_first_allocation: false,
            }
        }
    }

    fn fill(data: &mut Vec<f64>) {
        std::thread::sleep(Duration::from_millis(1));
        data.iter_mut().enumerate().for_each(|(i, v)| *v = i as f64);
    }

    impl KernelSpec for Flaky {
        type Data = Vec<f64>;

        fn info(&self) -> KernelInfo {
            KernelInfo::new("Test_FLAKY", KernelGroup::Basic, 8, 1)
        }

        fn resolve(&self, class: SizeClass) -> ProblemSize {
            ProblemSize::linear(class, 8, 1)
        }

        fn cost(&self, size: &ProblemSize) -> KernelCost {
            KernelCost {
                its_per_rep: size.dim(0) as u64,
                ..KernelCost::default()
            }
        }

        fn tolerance(&self, _size: &ProblemSize) -> ChecksumTolerance {
            ChecksumTolerance::Exact
        }

        fn declare(&self, caps: &mut VariantCapabilities<Vec<f64>>) {
            let calls = Arc::clone(&self.calls);
            let fails = self.fails;
            caps.declare(VariantId::BaseSeq, "default", sequential(fill)).declare(
                VariantId::IterAlt,
                "default",
                try_sequential(move |data: &mut Vec<f64>| {
                    let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if fails(call) {
                        return Err(anyhow::anyhow!("dispatch {call} failed").into());
                    }
                    fill(data);
                    Ok(())
                }),
            );
        }

        fn allocate(&self, size: &ProblemSize) -> Result<Vec<f64>, KernelError> {
            let previous = self.allocations.fetch_add(1, Ordering::SeqCst);
            if self.refuse_first_allocation && previous == 0 {
                return Err(KernelError::Allocation {
                    buffer: "values",
                    elements: size.dim(0),
                    bytes: size.dim(0) * 8,
                });
            }
            Ok(vec![0.0; size.dim(0)])
        }

        fn checksum(&self, data: &Vec<f64>) -> f64 {
            ChecksumAccumulator::new().add_slice(data).value()
        }
    }

    fn with_flaky(kernel: Flaky) -> anyhow::Result<KernelRegistry> {
        let mut registry = KernelRegistry::new(HostCapabilities::sequential_only());
        registry.register(kernel)?;
        registry.register(Init3::new())?;
        Ok(registry)
    }

    fn flaky_only(variant: VariantId) -> Selection {
        Selection {
            kernels: vec!["Test_FLAKY".into()],
            variants: vec![VariantRequest::Known(variant)],
            ..Selection::default()
        }
    }

    /// Reports no elapsed time at all.
    struct FrozenTimer;

    impl Timer for FrozenTimer {
        fn start(&mut self) {}

        fn stop(&mut self) -> Duration {
            Duration::ZERO
        }
    }

    fn context() -> anyhow::Result<ExecContext> {
        Ok(ExecContext::new(CpuRuntime::with_threads(2)?))
    }

    fn mini() -> ExecutorOptions {
        ExecutorOptions {
            run_params: RunParams::new(SizeClass::Mini).with_reps(1),
            ..ExecutorOptions::default()
        }
    }

    #[test]
    fn selection_by_group_and_exclusion() -> anyhow::Result<()> {
        let registry = KernelRegistry::with_default_kernels(HostCapabilities::sequential_only())?;
        let selection = Selection {
            kernels: vec!["basic".into()],
            exclude_kernels: vec!["Basic_INIT3".into()],
            variants: vec![VariantRequest::parse("base_seq")],
            ..Selection::default()
        };
        let run = SuiteExecutor::new(mini()).run(&registry, &selection, &context()?);
        let names: Vec<&str> = run.kernels.iter().map(|k| k.kernel.as_str()).collect();
        assert_eq!(names, vec!["Basic_MULADDSUB", "Basic_INDEXLIST"]);
        assert_eq!(run.records.len(), 2);
        assert!(run.records.iter().all(|r| r.is_complete() && r.key.variant == VariantId::BaseSeq));
        Ok(())
    }

    #[test]
    fn unknown_names_become_skip_entries() -> anyhow::Result<()> {
        let registry = KernelRegistry::with_default_kernels(HostCapabilities::sequential_only())?;
        let selection = Selection {
            kernels: vec!["Basic_INIT3".into(), "Basic_NOPE".into()],
            variants: vec![
                VariantRequest::parse("Warp_Speed"),
                VariantRequest::parse("Base_Threads"),
            ],
            ..Selection::default()
        };
        let run = SuiteExecutor::new(mini()).run(&registry, &selection, &context()?);
        let reasons: Vec<SkipReason> = run.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![SkipReason::UnknownKernel, SkipReason::UnknownVariant, SkipReason::UnknownVariant]
        );
        assert!(run.records.is_empty());
        assert!(run.kernel("Basic_INIT3").is_some_and(KernelRunSummary::is_complete));
        Ok(())
    }

    #[test]
    fn tunings_select_by_name_or_index() -> anyhow::Result<()> {
        let registry = KernelRegistry::with_default_kernels(HostCapabilities {
            threads: true,
            accelerator: false,
        })?;
        let kernel = registry.find("Basic_MULADDSUB").expect("registered");
        let selection = Selection {
            tunings: TuningSelection::Only(vec!["chunk_4096".into()]),
            ..Selection::default()
        };
        let plan = plan_pairs(kernel.as_ref(), &selection);
        assert!(plan.pairs.iter().all(|(_, tuning)| *tuning == TuningIndex(1)));
        assert_eq!(plan.pairs.len(), 3);

        let selection = Selection {
            variants: vec![VariantRequest::Known(VariantId::BaseSeq)],
            tunings: TuningSelection::Only(vec!["2".into()]),
            ..Selection::default()
        };
        assert_eq!(
            plan_pairs(kernel.as_ref(), &selection).pairs,
            vec![(VariantId::BaseSeq, TuningIndex(2))]
        );

        let selection = Selection {
            variants: vec![VariantRequest::Known(VariantId::BaseSeq)],
            tunings: TuningSelection::Only(vec!["chunk_4096".into()]),
            ..Selection::default()
        };
        let plan = plan_pairs(kernel.as_ref(), &selection);
        assert!(plan.pairs.is_empty());
        assert_eq!(plan.unmatched, vec![(VariantId::BaseSeq, "chunk_4096".to_string())]);
        Ok(())
    }

    #[test]
    fn unmatched_tuning_names_are_skip_entries() -> anyhow::Result<()> {
        let registry = KernelRegistry::with_default_kernels(HostCapabilities::sequential_only())?;
        let selection = Selection {
            kernels: vec!["Basic_INIT3".into()],
            tunings: TuningSelection::Only(vec!["chunk_4096".into()]),
            ..Selection::default()
        };
        let options = ExecutorOptions { passes: 2, ..mini() };
        let run = SuiteExecutor::new(options).run(&registry, &selection, &context()?);
        assert!(run.records.is_empty());
        assert_eq!(run.skipped.len(), 4);
        assert!(run.skipped.iter().all(|s| {
            s.reason == SkipReason::UnknownTuning && s.tuning.as_deref() == Some("chunk_4096")
        }));
        Ok(())
    }

    #[test]
    fn failing_strategy_is_incomplete_and_later_kernels_run() -> anyhow::Result<()> {
        let registry = with_flaky(Flaky::new(|_| true))?;
        let run = SuiteExecutor::new(mini()).run(&registry, &Selection::default(), &context()?);

        let key = RunKey::new("Test_FLAKY", VariantId::IterAlt, TuningIndex::DEFAULT);
        let failed = run.records.get(&key).expect("recorded");
        assert!(matches!(
            &failed.status,
            RunStatus::Incomplete { reason } if reason.contains("dispatch 1 failed")
        ));
        assert_eq!(failed.checksum, None);

        let summary = run.kernel("Test_FLAKY").expect("summary");
        assert!(summary.is_complete());
        assert!(RunMetrics::compute(failed, &summary.cost).is_none());
        assert!(run.discrepancies.is_empty());

        let init3: Vec<&RunRecord> = run.records.for_kernel("Basic_INIT3").collect();
        assert_eq!(init3.len(), 4);
        assert!(init3.iter().all(|record| record.is_complete()));
        Ok(())
    }

    #[test]
    fn clock_failure_leaves_runs_incomplete() -> anyhow::Result<()> {
        let registry = with_flaky(Flaky::new(|_| false))?;
        let executor = SuiteExecutor::with_timers(mini(), || FrozenTimer);
        let run = executor.run(&registry, &Selection::default(), &context()?);

        assert_eq!(run.records.len(), 6);
        for record in run.records.iter() {
            let clock_failure = matches!(
                &record.status,
                RunStatus::Incomplete { reason } if reason.contains("clock")
            );
            assert!(clock_failure, "{}", record.key.label());
            assert_eq!(record.checksum, None);
        }
        assert!(run.discrepancies.is_empty());
        assert!(run.kernels.iter().all(KernelRunSummary::is_complete));
        Ok(())
    }

    #[test]
    fn failed_pass_is_left_out_of_history() -> anyhow::Result<()> {
        let registry = with_flaky(Flaky::new(|call| call == 2))?;
        let options = ExecutorOptions {
            passes: 3,
            keep_history: true,
            ..mini()
        };
        let selection = flaky_only(VariantId::IterAlt);
        let run = SuiteExecutor::new(options).run(&registry, &selection, &context()?);

        let record = run.records.iter().next().expect("one record");
        assert!(record.is_complete());
        assert_eq!(record.history.len(), 2);
        assert!(record
            .history
            .iter()
            .all(|sample| sample.elapsed >= Duration::from_millis(1) && sample.checksum.is_some()));
        Ok(())
    }

    #[test]
    fn later_pass_clears_kernel_failure() -> anyhow::Result<()> {
        let registry = with_flaky(Flaky {
            refuse_first_allocation: true,
            ..Flaky::new(|_| false)
        })?;
        let options = ExecutorOptions { passes: 2, ..mini() };
        let selection = flaky_only(VariantId::BaseSeq);
        let run = SuiteExecutor::new(options).run(&registry, &selection, &context()?);

        assert!(run.kernel("Test_FLAKY").is_some_and(KernelRunSummary::is_complete));
        let record = run.records.iter().next().expect("second pass recorded");
        assert!(record.is_complete());
        Ok(())
    }

    #[test]
    fn passes_overwrite_and_history_keeps_samples() -> anyhow::Result<()> {
        let registry = KernelRegistry::with_default_kernels(HostCapabilities::sequential_only())?;
        let selection = Selection {
            kernels: vec!["Basic_INIT3".into()],
            variants: vec![VariantRequest::Known(VariantId::BaseSeq)],
            ..Selection::default()
        };
        let options = ExecutorOptions {
            passes: 3,
            keep_history: true,
            ..mini()
        };
        let run = SuiteExecutor::new(options).run(&registry, &selection, &context()?);
        assert_eq!(run.records.len(), 1);
        let record = run.records.iter().next().expect("one record");
        assert_eq!(record.history.len(), 3);
        assert!(record
            .history
            .iter()
            .all(|sample| sample.checksum.map(f64::to_bits) == record.checksum.map(f64::to_bits)));
        Ok(())
    }
}
