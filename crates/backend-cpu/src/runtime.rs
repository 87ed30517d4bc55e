//! Thread-pool runtime for threaded variants.

use anyhow::{Context, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct CpuRuntimeOptions {
    /// Worker count; `None` lets rayon pick one worker per logical core.
    pub threads: Option<usize>,
}

/// Owns the rayon pool every threaded strategy runs inside. Cloning shares
/// the pool.
#[derive(Clone)]
pub struct CpuRuntime {
    pool: Arc<ThreadPool>,
}

impl CpuRuntime {
    pub fn new(options: CpuRuntimeOptions) -> Result<Self> {
        let mut builder =
            ThreadPoolBuilder::new().thread_name(|idx| format!("kernelsuite-worker-{idx}"));
        if let Some(threads) = options.threads {
            builder = builder.num_threads(threads.max(1));
        }
        let pool = builder
            .build()
            .context("failed to build rayon thread pool")?;
        info!(threads = pool.current_num_threads(), "cpu runtime ready");
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn with_threads(threads: usize) -> Result<Self> {
        Self::new(CpuRuntimeOptions {
            threads: Some(threads),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` with this runtime's pool as the current rayon pool. Blocks
    /// until `op` and every task it spawned have finished.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl fmt::Debug for CpuRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuRuntime")
            .field("threads", &self.num_threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{forall_rows, ExecPolicy};

    #[test]
    fn install_uses_configured_pool() -> Result<()> {
        let runtime = CpuRuntime::with_threads(3)?;
        assert_eq!(runtime.num_threads(), 3);
        let observed = runtime.install(rayon::current_num_threads);
        assert_eq!(observed, 3);
        Ok(())
    }

    #[test]
    fn parallel_policy_runs_inside_pool() -> Result<()> {
        let runtime = CpuRuntime::with_threads(2)?;
        let mut out = vec![0usize; 1000];
        runtime.install(|| forall_rows(ExecPolicy::par(), &mut out, 1, |i, v| v[0] = i * 2));
        assert!(out.iter().enumerate().all(|(i, v)| *v == i * 2));
        Ok(())
    }
}
