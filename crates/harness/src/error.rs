use crate::lifecycle::LifecycleState;
use kernelsuite_kernels::KernelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("cannot {op} while the kernel is {state}")]
    InvalidTransition { op: &'static str, state: LifecycleState },
    #[error("clock reported no elapsed time over {reps} repetitions")]
    Clock { reps: usize },
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

impl HarnessError {
    /// Allocation failures end every remaining run of the kernel.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, HarnessError::Kernel(KernelError::Allocation { .. }))
    }
}
