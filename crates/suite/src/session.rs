//! Suite session orchestration.

use crate::options::SuiteOptions;
use anyhow::Result;
use kernelsuite_backend_cpu::CpuRuntime;
use kernelsuite_harness::{SuiteExecutor, SuiteReport, SuiteRun};
use kernelsuite_kernels::{ExecContext, KernelRegistry};
use tracing::info;

/// Execution context, kernel registry and options for one process.
pub struct SuiteSession {
    options: SuiteOptions,
    ctx: ExecContext,
    registry: KernelRegistry,
}

impl SuiteSession {
    pub fn new(options: SuiteOptions) -> Result<Self> {
        let cpu = CpuRuntime::new(options.to_cpu_options())?;
        let ctx = attach_gpu(ExecContext::new(cpu), options.gpu);
        let host = ctx.host_capabilities();
        info!(
            threads = ctx.cpu().num_threads(),
            threaded_variants = host.threads,
            accelerated_variants = host.accelerator,
            "suite session ready"
        );
        let registry = KernelRegistry::with_default_kernels(host)?;
        Ok(Self {
            options,
            ctx,
            registry,
        })
    }

    pub fn options(&self) -> &SuiteOptions {
        &self.options
    }

    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.registry
    }

    pub fn run(&self) -> Result<SuiteRun> {
        let executor = SuiteExecutor::new(self.options.to_executor_options()?);
        let selection = self.options.to_selection();
        Ok(executor.run(&self.registry, &selection, &self.ctx))
    }

    pub fn run_report(&self) -> Result<SuiteReport> {
        Ok(SuiteReport::from_run(&self.run()?))
    }
}

#[cfg(feature = "gpu")]
fn attach_gpu(ctx: ExecContext, enabled: bool) -> ExecContext {
    if !enabled {
        return ctx;
    }
    match kernelsuite_backend_gpu::GpuContext::new() {
        Ok(gpu) => ctx.with_gpu(gpu),
        Err(e) => {
            tracing::warn!(error = %e, "GPU not available, accelerated variants will be skipped");
            ctx
        }
    }
}

#[cfg(not(feature = "gpu"))]
fn attach_gpu(ctx: ExecContext, enabled: bool) -> ExecContext {
    if enabled {
        tracing::warn!("built without the `gpu` feature, accelerated variants will be skipped");
    }
    ctx
}
