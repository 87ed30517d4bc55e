//! Suite options and their conversion into kernel and harness settings.

use anyhow::{Context, Result};
use kernelsuite_backend_cpu::CpuRuntimeOptions;
use kernelsuite_harness::{
    ExecutorOptions, RunReference, Selection, TuningSelection, VariantRequest,
};
use kernelsuite_kernels::{RunParams, SizeClass, TuningIndex, VariantId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteOptions {
    /// Size class token; unrecognised tokens run at `Medium`.
    pub size: String,
    /// Kernel or group names; empty runs every kernel.
    pub kernels: Vec<String>,
    pub exclude_kernels: Vec<String>,
    /// Variant names; empty runs every declared variant.
    pub variants: Vec<String>,
    pub exclude_variants: Vec<String>,
    /// Tuning names or indices; empty runs every tuning.
    pub tunings: Vec<String>,
    pub reps: Option<usize>,
    pub reps_factor: f64,
    pub passes: usize,
    pub threads: Option<usize>,
    pub reference_variant: String,
    pub reference_tuning: usize,
    pub history: bool,
    /// Try to open a GPU device for accelerated variants.
    pub gpu: bool,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            size: SizeClass::Medium.name().to_string(),
            kernels: Vec::new(),
            exclude_kernels: Vec::new(),
            variants: Vec::new(),
            exclude_variants: Vec::new(),
            tunings: Vec::new(),
            reps: None,
            reps_factor: 1.0,
            passes: 1,
            threads: None,
            reference_variant: VariantId::BaseSeq.name().to_string(),
            reference_tuning: 0,
            history: false,
            gpu: cfg!(feature = "gpu"),
        }
    }
}

impl SuiteOptions {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read suite options from {}", path.display()))?;
        let options = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse suite options in {}", path.display()))?;
        Ok(options)
    }

    pub fn size_class(&self) -> SizeClass {
        SizeClass::from_token(&self.size)
    }

    pub fn to_run_params(&self) -> RunParams {
        RunParams {
            size_class: self.size_class(),
            reps_factor: self.reps_factor,
            reps_override: self.reps,
        }
    }

    pub fn to_cpu_options(&self) -> CpuRuntimeOptions {
        CpuRuntimeOptions { threads: self.threads }
    }

    pub fn to_executor_options(&self) -> Result<ExecutorOptions> {
        let variant = self
            .reference_variant
            .parse::<VariantId>()
            .context("invalid reference variant")?;
        Ok(ExecutorOptions {
            run_params: self.to_run_params(),
            passes: self.passes.max(1),
            keep_history: self.history,
            reference: RunReference {
                variant,
                tuning: TuningIndex(self.reference_tuning),
            },
        })
    }

    pub fn to_selection(&self) -> Selection {
        let exclude_variants = self
            .exclude_variants
            .iter()
            .filter_map(|name| {
                let variant = VariantId::lookup(name);
                if variant.is_none() {
                    warn!(variant = %name, "ignoring unknown variant in exclusions");
                }
                variant
            })
            .collect();
        Selection {
            kernels: self.kernels.clone(),
            exclude_kernels: self.exclude_kernels.clone(),
            variants: self.variants.iter().map(|name| VariantRequest::parse(name)).collect(),
            exclude_variants,
            tunings: if self.tunings.is_empty() {
                TuningSelection::All
            } else {
                TuningSelection::Only(self.tunings.clone())
            },
        }
    }
}
