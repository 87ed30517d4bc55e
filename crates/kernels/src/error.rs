use crate::variant::{TuningIndex, VariantId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("failed to allocate {elements} elements ({bytes} bytes) for buffer `{buffer}`")]
    Allocation {
        buffer: &'static str,
        elements: usize,
        bytes: usize,
    },
    #[error("invalid problem size for `{kernel}`: {reason}")]
    InvalidSize { kernel: String, reason: String },
    #[error("invalid run parameters: {0}")]
    InvalidParams(String),
    #[error("`{kernel}` does not implement {variant} tuning {tuning}")]
    Unsupported {
        kernel: String,
        variant: VariantId,
        tuning: TuningIndex,
    },
    #[error("unknown variant `{0}`")]
    UnknownVariant(String),
    #[error("kernel `{0}` is already registered")]
    DuplicateKernel(String),
    #[error("accelerated variant requested without a GPU context")]
    GpuUnavailable,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
