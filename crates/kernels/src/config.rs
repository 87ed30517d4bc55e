//! Problem sizing, run parameters and static cost metadata.

use crate::error::KernelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Host floating-point type for every kernel buffer.
pub type Real = f64;
/// Host index type for index-valued outputs.
pub type Index = i64;

/// Symbolic problem scale, ordered from smallest to largest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum SizeClass {
    Mini,
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

impl SizeClass {
    pub const ALL: [SizeClass; 5] = [
        SizeClass::Mini,
        SizeClass::Small,
        SizeClass::Medium,
        SizeClass::Large,
        SizeClass::ExtraLarge,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SizeClass::Mini => "Mini",
            SizeClass::Small => "Small",
            SizeClass::Medium => "Medium",
            SizeClass::Large => "Large",
            SizeClass::ExtraLarge => "ExtraLarge",
        }
    }

    /// Parse a size token. Anything unrecognised resolves to `Medium`.
    pub fn from_token(token: &str) -> Self {
        let normalized: String = token
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "mini" => SizeClass::Mini,
            "small" => SizeClass::Small,
            "medium" => SizeClass::Medium,
            "large" => SizeClass::Large,
            "extralarge" | "xl" => SizeClass::ExtraLarge,
            _ => {
                tracing::warn!(token, "unknown size class, using Medium");
                SizeClass::Medium
            }
        }
    }

    /// Scale a 1-D kernel's default length and repetition count.
    pub fn scale_linear(&self, default_len: usize, default_reps: usize) -> (usize, usize) {
        let (len, reps) = match self {
            SizeClass::Mini => (default_len / 100, default_reps * 10),
            SizeClass::Small => (default_len / 10, default_reps * 3),
            SizeClass::Medium => (default_len, default_reps),
            SizeClass::Large => (default_len * 4, default_reps / 2),
            SizeClass::ExtraLarge => (default_len * 16, default_reps / 4),
        };
        (len.max(1), reps.max(1))
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SizeClass {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SizeClass::from_token(s))
    }
}

/// Parameters applied to every kernel when resolving its problem size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub size_class: SizeClass,
    /// Multiplier on the resolved repetition count.
    pub reps_factor: f64,
    /// Replaces the resolved repetition count. `Some(0)` disables timing.
    pub reps_override: Option<usize>,
}

impl RunParams {
    pub fn new(size_class: SizeClass) -> Self {
        Self {
            size_class,
            ..Self::default()
        }
    }

    pub fn with_reps_factor(mut self, factor: f64) -> Self {
        self.reps_factor = factor;
        self
    }

    pub fn with_reps(mut self, reps: usize) -> Self {
        self.reps_override = Some(reps);
        self
    }

    pub fn apply_reps(&self, resolved: usize) -> Result<usize, KernelError> {
        if let Some(reps) = self.reps_override {
            return Ok(reps);
        }
        if !self.reps_factor.is_finite() || self.reps_factor <= 0.0 {
            return Err(KernelError::InvalidParams(format!(
                "reps factor must be positive, got {}",
                self.reps_factor
            )));
        }
        Ok(((resolved as f64 * self.reps_factor).round() as usize).max(1))
    }
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            size_class: SizeClass::Medium,
            reps_factor: 1.0,
            reps_override: None,
        }
    }
}

/// Concrete dimensions and repetition count for one kernel at one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSize {
    pub class: SizeClass,
    pub dims: Vec<usize>,
    pub reps: usize,
}

impl ProblemSize {
    pub fn new(class: SizeClass, dims: Vec<usize>, reps: usize) -> Self {
        Self { class, dims, reps }
    }

    pub fn linear(class: SizeClass, len: usize, reps: usize) -> Self {
        Self::new(class, vec![len], reps)
    }

    /// Dimension `axis`, or 0 when the kernel has fewer dimensions.
    pub fn dim(&self, axis: usize) -> usize {
        self.dims.get(axis).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KernelGroup {
    Basic,
    Polybench,
    Apps,
}

impl KernelGroup {
    pub fn name(&self) -> &'static str {
        match self {
            KernelGroup::Basic => "Basic",
            KernelGroup::Polybench => "Polybench",
            KernelGroup::Apps => "Apps",
        }
    }
}

impl fmt::Display for KernelGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kernel identity, fixed at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelInfo {
    pub name: String,
    pub group: KernelGroup,
    pub default_size: usize,
    pub default_reps: usize,
}

impl KernelInfo {
    pub fn new(
        name: impl Into<String>,
        group: KernelGroup,
        default_size: usize,
        default_reps: usize,
    ) -> Self {
        Self {
            name: name.into(),
            group,
            default_size,
            default_reps,
        }
    }
}

/// Work performed by one repetition at a resolved size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KernelCost {
    pub its_per_rep: u64,
    pub kernels_per_rep: u64,
    pub bytes_read_per_rep: u64,
    pub bytes_written_per_rep: u64,
    pub flops_per_rep: u64,
}

impl KernelCost {
    pub fn bytes_per_rep(&self) -> u64 {
        self.bytes_read_per_rep + self.bytes_written_per_rep
    }

    /// Flops when the kernel declares any, iterations otherwise.
    pub fn operations_per_rep(&self) -> u64 {
        if self.flops_per_rep > 0 {
            self.flops_per_rep
        } else {
            self.its_per_rep
        }
    }
}

/// Arithmetic precision a strategy computes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Precision {
    #[default]
    F64,
    F32,
}

impl Precision {
    pub fn unit_roundoff(&self) -> f64 {
        match self {
            Precision::F64 => f64::EPSILON / 2.0,
            Precision::F32 => f32::EPSILON as f64 / 2.0,
        }
    }

    /// The less precise of the two.
    pub fn coarser(self, other: Precision) -> Precision {
        self.max(other)
    }
}

/// How far a checksum may drift from the reference checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumTolerance {
    /// Integer-valued outputs; bit equality.
    Exact,
    /// `depth` is the longest reduction chain feeding one output element.
    Rounded { depth: usize },
}

impl ChecksumTolerance {
    pub const SAFETY_FACTOR: f64 = 64.0;

    pub fn allowed_relative_error(&self, precision: Precision) -> f64 {
        match self {
            ChecksumTolerance::Exact => 0.0,
            ChecksumTolerance::Rounded { depth } => {
                Self::SAFETY_FACTOR * precision.unit_roundoff() * ((*depth).max(1) as f64).sqrt()
            }
        }
    }

    pub fn accepts(&self, precision: Precision, reference: f64, candidate: f64) -> bool {
        if reference.is_nan() || candidate.is_nan() {
            return false;
        }
        match self {
            ChecksumTolerance::Exact => reference.to_bits() == candidate.to_bits(),
            ChecksumTolerance::Rounded { .. } => {
                if reference == candidate {
                    return true;
                }
                let scale = reference.abs().max(f64::MIN_POSITIVE);
                (candidate - reference).abs() <= self.allowed_relative_error(precision) * scale
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_size_token_falls_back_to_medium() {
        assert_eq!(SizeClass::from_token("huge"), SizeClass::Medium);
        assert_eq!(SizeClass::from_token(""), SizeClass::Medium);
        assert_eq!(SizeClass::from_token("extra_large"), SizeClass::ExtraLarge);
        assert_eq!("SMALL".parse::<SizeClass>(), Ok(SizeClass::Small));
    }

    #[test]
    fn linear_scaling_increases_total_work() {
        for reps in [1, 4, 50, 350] {
            let work: Vec<usize> = SizeClass::ALL
                .iter()
                .map(|class| {
                    let (len, reps) = class.scale_linear(1_000_000, reps);
                    len * reps
                })
                .collect();
            assert!(work.windows(2).all(|w| w[0] < w[1]), "reps={reps}: {work:?}");
        }
    }

    #[test]
    fn reps_override_wins_over_factor() -> anyhow::Result<()> {
        let params = RunParams::default().with_reps_factor(3.0).with_reps(0);
        assert_eq!(params.apply_reps(100)?, 0);
        let params = RunParams::default().with_reps_factor(0.001);
        assert_eq!(params.apply_reps(100)?, 1);
        assert!(RunParams::default().with_reps_factor(-1.0).apply_reps(10).is_err());
        Ok(())
    }

    #[test]
    fn operations_prefer_flops() {
        let cost = KernelCost {
            its_per_rep: 10,
            flops_per_rep: 30,
            ..KernelCost::default()
        };
        assert_eq!(cost.operations_per_rep(), 30);
        let cost = KernelCost {
            its_per_rep: 10,
            ..KernelCost::default()
        };
        assert_eq!(cost.operations_per_rep(), 10);
    }

    #[test]
    fn tolerance_rejects_nan_and_scales_with_precision() {
        let tol = ChecksumTolerance::Rounded { depth: 100 };
        assert!(!tol.accepts(Precision::F64, f64::NAN, 1.0));
        assert!(!tol.accepts(Precision::F64, 1.0, f64::NAN));
        assert!(tol.accepts(Precision::F64, 1000.0, 1000.0 + 1e-11));
        assert!(!tol.accepts(Precision::F64, 1000.0, 1000.001));
        assert!(tol.accepts(Precision::F32, 1000.0, 1000.001));
        assert!(!ChecksumTolerance::Exact.accepts(Precision::F64, 3.0, 3.0 + 1e-15 * 3.0));
        assert!(ChecksumTolerance::Exact.accepts(Precision::F64, 3.0, 3.0));
    }
}
