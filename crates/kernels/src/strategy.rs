//! Strategy objects behind each (variant, tuning) pair.
//!
//! A [`Strategy`] owns no data. Launching it against a kernel's buffers does
//! any untimed preparation (device upload, program build) and returns a
//! [`Launch`], whose `run_rep` is what the timed region repeats.

use crate::config::Precision;
use crate::error::KernelError;
use crate::variant::HostCapabilities;
use kernelsuite_backend_cpu::CpuRuntime;

#[cfg(feature = "gpu")]
use kernelsuite_backend_gpu::GpuContext;

/// Execution resources shared by every strategy in a suite run.
#[derive(Debug)]
pub struct ExecContext {
    cpu: CpuRuntime,
    #[cfg(feature = "gpu")]
    gpu: Option<GpuContext>,
}

impl ExecContext {
    pub fn new(cpu: CpuRuntime) -> Self {
        Self {
            cpu,
            #[cfg(feature = "gpu")]
            gpu: None,
        }
    }

    #[cfg(feature = "gpu")]
    pub fn with_gpu(mut self, gpu: GpuContext) -> Self {
        self.gpu = Some(gpu);
        self
    }

    pub fn cpu(&self) -> &CpuRuntime {
        &self.cpu
    }

    #[cfg(feature = "gpu")]
    pub fn gpu(&self) -> Option<&GpuContext> {
        self.gpu.as_ref()
    }

    #[cfg(feature = "gpu")]
    fn has_accelerator(&self) -> bool {
        self.gpu.is_some()
    }

    #[cfg(not(feature = "gpu"))]
    fn has_accelerator(&self) -> bool {
        false
    }

    pub fn host_capabilities(&self) -> HostCapabilities {
        HostCapabilities {
            threads: cfg!(feature = "threads"),
            accelerator: self.has_accelerator(),
        }
    }
}

pub trait Strategy<D>: Send + Sync {
    fn precision(&self) -> Precision {
        Precision::F64
    }

    fn launch<'a>(
        &'a self,
        ctx: &'a ExecContext,
        data: &'a mut D,
    ) -> Result<Box<dyn Launch + 'a>, KernelError>;
}

/// One prepared execution of a strategy.
pub trait Launch {
    /// One repetition of the kernel body.
    fn run_rep(&mut self) -> Result<(), KernelError>;

    /// Block until all outstanding work from `run_rep` has completed.
    fn synchronize(&mut self) -> Result<(), KernelError> {
        Ok(())
    }

    /// Move results back into host buffers.
    fn finish(self: Box<Self>) -> Result<(), KernelError> {
        Ok(())
    }
}

type HostBody<D> = Box<dyn Fn(&mut D) -> Result<(), KernelError> + Send + Sync>;

/// A strategy whose body runs on the host, either on the calling thread or
/// inside the suite's rayon pool.
pub struct HostStrategy<D> {
    body: HostBody<D>,
    threaded: bool,
}

pub fn sequential<D, F>(body: F) -> HostStrategy<D>
where
    D: 'static,
    F: Fn(&mut D) + Send + Sync + 'static,
{
    try_sequential(move |data: &mut D| {
        body(data);
        Ok(())
    })
}

/// Like [`sequential`] for bodies that can fail.
pub fn try_sequential<D, F>(body: F) -> HostStrategy<D>
where
    D: 'static,
    F: Fn(&mut D) -> Result<(), KernelError> + Send + Sync + 'static,
{
    HostStrategy {
        body: Box::new(body),
        threaded: false,
    }
}

pub fn threaded<D, F>(body: F) -> HostStrategy<D>
where
    D: 'static,
    F: Fn(&mut D) + Send + Sync + 'static,
{
    HostStrategy {
        body: Box::new(move |data: &mut D| {
            body(data);
            Ok(())
        }),
        threaded: true,
    }
}

impl<D: Send> Strategy<D> for HostStrategy<D> {
    fn launch<'a>(
        &'a self,
        ctx: &'a ExecContext,
        data: &'a mut D,
    ) -> Result<Box<dyn Launch + 'a>, KernelError> {
        Ok(Box::new(HostLaunch {
            strategy: self,
            ctx,
            data,
        }))
    }
}

struct HostLaunch<'a, D> {
    strategy: &'a HostStrategy<D>,
    ctx: &'a ExecContext,
    data: &'a mut D,
}

impl<'a, D: Send> Launch for HostLaunch<'a, D> {
    fn run_rep(&mut self) -> Result<(), KernelError> {
        let body = &self.strategy.body;
        if self.strategy.threaded {
            let data = &mut *self.data;
            self.ctx.cpu().install(|| body(data))
        } else {
            body(&mut *self.data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> anyhow::Result<ExecContext> {
        Ok(ExecContext::new(CpuRuntime::with_threads(2)?))
    }

    #[test]
    fn sequential_body_runs_once_per_rep() -> anyhow::Result<()> {
        let ctx = context()?;
        let strategy = sequential(|count: &mut usize| *count += 1);
        let mut count = 0usize;
        {
            let mut launch = strategy.launch(&ctx, &mut count)?;
            for _ in 0..3 {
                launch.run_rep()?;
            }
            launch.synchronize()?;
            launch.finish()?;
        }
        assert_eq!(count, 3);
        Ok(())
    }

    #[test]
    fn threaded_body_runs_inside_pool() -> anyhow::Result<()> {
        let ctx = context()?;
        let strategy = threaded(|seen: &mut usize| *seen = rayon::current_num_threads());
        let mut seen = 0usize;
        strategy.launch(&ctx, &mut seen)?.run_rep()?;
        assert_eq!(seen, 2);
        Ok(())
    }
}
