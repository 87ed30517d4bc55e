//! Kernel registry for lookup and discovery.

use crate::apps::Mass3dpa;
use crate::basic::{IndexList, Init3, MulAddSub};
use crate::error::KernelError;
use crate::kernel::{DynKernel, KernelSpec, Registered};
use crate::polybench::ThreeMm;
use crate::variant::HostCapabilities;
use std::sync::Arc;

/// Kernels in registration order, each with capabilities declared against
/// one host.
#[derive(Clone)]
pub struct KernelRegistry {
    host: HostCapabilities,
    kernels: Vec<DynKernel>,
}

impl KernelRegistry {
    pub fn new(host: HostCapabilities) -> Self {
        Self {
            host,
            kernels: Vec::new(),
        }
    }

    pub fn with_default_kernels(host: HostCapabilities) -> Result<Self, KernelError> {
        let mut registry = Self::new(host);
        registry.register(MulAddSub::new())?;
        registry.register(Init3::new())?;
        registry.register(IndexList::new())?;
        registry.register(ThreeMm::new())?;
        registry.register(Mass3dpa::new())?;
        Ok(registry)
    }

    pub fn host(&self) -> HostCapabilities {
        self.host
    }

    pub fn register<S: KernelSpec>(&mut self, spec: S) -> Result<&mut Self, KernelError> {
        self.register_kernel(Arc::new(Registered::new(spec, self.host)))
    }

    /// Add an already type-erased kernel. Names are unique.
    pub fn register_kernel(&mut self, kernel: DynKernel) -> Result<&mut Self, KernelError> {
        if self.find(kernel.name()).is_some() {
            return Err(KernelError::DuplicateKernel(kernel.name().to_string()));
        }
        self.kernels.push(kernel);
        Ok(self)
    }

    pub fn kernels(&self) -> &[DynKernel] {
        &self.kernels
    }

    pub fn find(&self, name: &str) -> Option<DynKernel> {
        self.kernels
            .iter()
            .find(|kernel| kernel.name() == name)
            .map(Arc::clone)
    }
}

impl std::fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("host", &self.host)
            .field("kernels", &self.kernels.iter().map(|k| k.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantId;

    #[test]
    fn default_kernels_are_registered_in_order() -> anyhow::Result<()> {
        let registry = KernelRegistry::with_default_kernels(HostCapabilities::default())?;
        let names: Vec<&str> = registry.kernels().iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            vec![
                "Basic_MULADDSUB",
                "Basic_INIT3",
                "Basic_INDEXLIST",
                "Polybench_3MM",
                "Apps_MASS3DPA"
            ]
        );
        Ok(())
    }

    #[test]
    fn duplicate_names_are_rejected() -> anyhow::Result<()> {
        let mut registry = KernelRegistry::new(HostCapabilities::sequential_only());
        registry.register(Init3::new())?;
        let err = registry.register(Init3::new()).unwrap_err();
        assert!(matches!(err, KernelError::DuplicateKernel(name) if name == "Basic_INIT3"));
        assert_eq!(registry.kernels().len(), 1);
        Ok(())
    }

    #[test]
    fn capabilities_follow_registry_host() -> anyhow::Result<()> {
        let registry = KernelRegistry::with_default_kernels(HostCapabilities::sequential_only())?;
        let kernel = registry.find("Basic_MULADDSUB").expect("registered");
        assert!(kernel.supports(VariantId::BaseSeq));
        assert!(!kernel.supports(VariantId::BaseThreads));
        assert!(!kernel.supports(VariantId::BaseGpu));
        assert!(registry.find("Basic_NOPE").is_none());
        Ok(())
    }
}
