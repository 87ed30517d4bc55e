//! Kernel catalogue for kernelsuite.
//!
//! A kernel is described once by a [`KernelSpec`]: how its problem size
//! scales, what one repetition costs, how its buffers are filled and which
//! (variant, tuning) strategies it implements. [`Registered`] erases that into
//! the [`Kernel`] handle the harness drives through [`KernelRegistry`].

pub mod apps;
pub mod basic;
pub mod capability;
pub mod config;
pub mod data;
pub mod error;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod kernel;
pub mod polybench;
pub mod registry;
pub mod strategy;
pub mod variant;

#[cfg(test)]
mod testing;

pub use capability::VariantCapabilities;
pub use config::*;
pub use data::{
    alloc_and_init, alloc_and_init_const, alloc_and_init_rand_sign, try_alloc, ChecksumAccumulator,
    DataSeeder,
};
pub use error::KernelError;
pub use kernel::{DynKernel, Kernel, KernelSpec, Registered, Workload};
pub use registry::KernelRegistry;
pub use strategy::{
    sequential, threaded, try_sequential, ExecContext, HostStrategy, Launch, Strategy,
};
pub use variant::{HostCapabilities, TuningIndex, VariantFamily, VariantId};
