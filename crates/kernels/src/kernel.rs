//! Kernel definitions and the type-erased handle the harness drives.

use crate::capability::VariantCapabilities;
use crate::config::{
    ChecksumTolerance, KernelCost, KernelInfo, Precision, ProblemSize, RunParams, SizeClass,
};
use crate::error::KernelError;
use crate::strategy::{ExecContext, Launch};
use crate::variant::{HostCapabilities, TuningIndex, VariantId};
use std::sync::Arc;

/// What a kernel author implements: sizing, cost, data and strategies.
pub trait KernelSpec: Send + Sync + 'static {
    /// Buffers owned by one set-up of the kernel.
    type Data: Send + 'static;

    fn info(&self) -> KernelInfo;

    /// Dimensions and repetition count at `class`, before run parameters.
    fn resolve(&self, class: SizeClass) -> ProblemSize;

    fn cost(&self, size: &ProblemSize) -> KernelCost;

    fn tolerance(&self, size: &ProblemSize) -> ChecksumTolerance;

    fn declare(&self, caps: &mut VariantCapabilities<Self::Data>);

    /// Allocate and deterministically fill every buffer.
    fn allocate(&self, size: &ProblemSize) -> Result<Self::Data, KernelError>;

    fn checksum(&self, data: &Self::Data) -> f64;
}

/// Object-safe kernel handle stored in the registry.
pub trait Kernel: Send + Sync {
    fn info(&self) -> &KernelInfo;

    fn name(&self) -> &str {
        &self.info().name
    }

    fn resolve(&self, params: &RunParams) -> Result<ProblemSize, KernelError>;

    fn cost(&self, size: &ProblemSize) -> KernelCost;

    fn tolerance(&self, size: &ProblemSize) -> ChecksumTolerance;

    fn variants(&self) -> Vec<VariantId>;

    fn supports(&self, variant: VariantId) -> bool;

    fn supports_tuning(&self, variant: VariantId, tuning: TuningIndex) -> bool;

    fn tunings(&self, variant: VariantId) -> Vec<String>;

    fn precision(&self, variant: VariantId, tuning: TuningIndex) -> Option<Precision>;

    fn set_up<'k>(&'k self, size: &ProblemSize) -> Result<Box<dyn Workload + 'k>, KernelError>;
}

pub type DynKernel = Arc<dyn Kernel>;

/// Allocated buffers for one (variant, tuning) run.
pub trait Workload {
    fn launch<'w>(
        &'w mut self,
        variant: VariantId,
        tuning: TuningIndex,
        ctx: &'w ExecContext,
    ) -> Result<Box<dyn Launch + 'w>, KernelError>;

    fn checksum(&self) -> f64;
}

/// A [`KernelSpec`] with its capabilities declared for one host.
pub struct Registered<S: KernelSpec> {
    spec: S,
    info: KernelInfo,
    caps: VariantCapabilities<S::Data>,
}

impl<S: KernelSpec> Registered<S> {
    pub fn new(spec: S, host: HostCapabilities) -> Self {
        let info = spec.info();
        let mut caps = VariantCapabilities::new(info.name.clone(), host);
        spec.declare(&mut caps);
        Self { spec, info, caps }
    }
}

impl<S: KernelSpec> Kernel for Registered<S> {
    fn info(&self) -> &KernelInfo {
        &self.info
    }

    fn resolve(&self, params: &RunParams) -> Result<ProblemSize, KernelError> {
        let mut size = self.spec.resolve(params.size_class);
        if size.dims.is_empty() || size.dims.contains(&0) {
            return Err(KernelError::InvalidSize {
                kernel: self.info.name.clone(),
                reason: format!("resolved dimensions {:?} at {}", size.dims, size.class),
            });
        }
        size.reps = params.apply_reps(size.reps)?;
        Ok(size)
    }

    fn cost(&self, size: &ProblemSize) -> KernelCost {
        self.spec.cost(size)
    }

    fn tolerance(&self, size: &ProblemSize) -> ChecksumTolerance {
        self.spec.tolerance(size)
    }

    fn variants(&self) -> Vec<VariantId> {
        self.caps.variants()
    }

    fn supports(&self, variant: VariantId) -> bool {
        self.caps.supports(variant)
    }

    fn supports_tuning(&self, variant: VariantId, tuning: TuningIndex) -> bool {
        self.caps.supports_tuning(variant, tuning)
    }

    fn tunings(&self, variant: VariantId) -> Vec<String> {
        self.caps.tunings(variant)
    }

    fn precision(&self, variant: VariantId, tuning: TuningIndex) -> Option<Precision> {
        self.caps.precision(variant, tuning)
    }

    fn set_up<'k>(&'k self, size: &ProblemSize) -> Result<Box<dyn Workload + 'k>, KernelError> {
        let data = self.spec.allocate(size)?;
        Ok(Box::new(SpecWorkload { kernel: self, data }))
    }
}

struct SpecWorkload<'k, S: KernelSpec> {
    kernel: &'k Registered<S>,
    data: S::Data,
}

impl<'k, S: KernelSpec> Workload for SpecWorkload<'k, S> {
    fn launch<'w>(
        &'w mut self,
        variant: VariantId,
        tuning: TuningIndex,
        ctx: &'w ExecContext,
    ) -> Result<Box<dyn Launch + 'w>, KernelError> {
        let kernel = self.kernel;
        let strategy = kernel
            .caps
            .strategy(variant, tuning)
            .ok_or_else(|| KernelError::Unsupported {
                kernel: kernel.info.name.clone(),
                variant,
                tuning,
            })?;
        strategy.launch(ctx, &mut self.data)
    }

    fn checksum(&self) -> f64 {
        self.kernel.spec.checksum(&self.data)
    }
}
