//! Variant identifiers, variant families and tuning indices.

use crate::error::KernelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Execution strategy a kernel can be run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariantId {
    #[serde(rename = "Base_Seq")]
    BaseSeq,
    #[serde(rename = "Lambda_Seq")]
    LambdaSeq,
    #[serde(rename = "Forall_Seq")]
    ForallSeq,
    #[serde(rename = "Base_Threads")]
    BaseThreads,
    #[serde(rename = "Lambda_Threads")]
    LambdaThreads,
    #[serde(rename = "Forall_Threads")]
    ForallThreads,
    #[serde(rename = "Base_Gpu")]
    BaseGpu,
    #[serde(rename = "Forall_Gpu")]
    ForallGpu,
    #[serde(rename = "Iter_Alt")]
    IterAlt,
}

impl VariantId {
    pub const ALL: [VariantId; 9] = [
        VariantId::BaseSeq,
        VariantId::LambdaSeq,
        VariantId::ForallSeq,
        VariantId::BaseThreads,
        VariantId::LambdaThreads,
        VariantId::ForallThreads,
        VariantId::BaseGpu,
        VariantId::ForallGpu,
        VariantId::IterAlt,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VariantId::BaseSeq => "Base_Seq",
            VariantId::LambdaSeq => "Lambda_Seq",
            VariantId::ForallSeq => "Forall_Seq",
            VariantId::BaseThreads => "Base_Threads",
            VariantId::LambdaThreads => "Lambda_Threads",
            VariantId::ForallThreads => "Forall_Threads",
            VariantId::BaseGpu => "Base_Gpu",
            VariantId::ForallGpu => "Forall_Gpu",
            VariantId::IterAlt => "Iter_Alt",
        }
    }

    pub fn family(&self) -> VariantFamily {
        match self {
            VariantId::BaseSeq => VariantFamily::BaselineSequential,
            VariantId::LambdaSeq | VariantId::ForallSeq => VariantFamily::AbstractionSequential,
            VariantId::BaseThreads => VariantFamily::BaselineThreaded,
            VariantId::LambdaThreads | VariantId::ForallThreads => {
                VariantFamily::AbstractionThreaded
            }
            VariantId::BaseGpu => VariantFamily::BaselineAccelerated,
            VariantId::ForallGpu => VariantFamily::AbstractionAccelerated,
            VariantId::IterAlt => VariantFamily::AlternateAbstraction,
        }
    }

    /// Case-insensitive lookup by display name.
    pub fn lookup(name: &str) -> Option<VariantId> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|variant| variant.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VariantId {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| KernelError::UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantFamily {
    BaselineSequential,
    AbstractionSequential,
    BaselineThreaded,
    AbstractionThreaded,
    BaselineAccelerated,
    AbstractionAccelerated,
    AlternateAbstraction,
}

impl VariantFamily {
    pub fn requires_threads(&self) -> bool {
        matches!(
            self,
            VariantFamily::BaselineThreaded | VariantFamily::AbstractionThreaded
        )
    }

    pub fn requires_accelerator(&self) -> bool {
        matches!(
            self,
            VariantFamily::BaselineAccelerated | VariantFamily::AbstractionAccelerated
        )
    }

    pub fn is_available(&self, host: &HostCapabilities) -> bool {
        (!self.requires_threads() || host.threads)
            && (!self.requires_accelerator() || host.accelerator)
    }
}

/// Position of a tuning under its variant. Index 0 is the `default` tuning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TuningIndex(pub usize);

impl TuningIndex {
    pub const DEFAULT: TuningIndex = TuningIndex(0);

    pub fn get(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TuningIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution resources present in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    pub threads: bool,
    pub accelerator: bool,
}

impl HostCapabilities {
    pub fn sequential_only() -> Self {
        Self {
            threads: false,
            accelerator: false,
        }
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            threads: cfg!(feature = "threads"),
            accelerator: false,
        }
    }
}
