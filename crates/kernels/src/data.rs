//! Buffer allocation, deterministic fills and checksum accumulation.
//!
//! Fill seeds depend only on the kernel name and the buffer slot, so every
//! variant of a kernel sees identical inputs.

use crate::config::{Index, Real};
use crate::error::KernelError;
use fastrand::Rng;

/// Allocate `len` copies of `value`, reporting allocation failure instead of
/// aborting.
pub fn try_alloc<T: Clone>(
    buffer: &'static str,
    len: usize,
    value: T,
) -> Result<Vec<T>, KernelError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| KernelError::Allocation {
            buffer,
            elements: len,
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    data.resize(len, value);
    Ok(data)
}

/// Derives per-buffer fill seeds for one kernel.
#[derive(Debug, Clone, Copy)]
pub struct DataSeeder {
    base: u64,
}

impl DataSeeder {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    pub fn new(kernel: &str) -> Self {
        let base = kernel.bytes().fold(Self::FNV_OFFSET, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(Self::FNV_PRIME)
        });
        Self { base }
    }

    pub fn seed(&self, slot: u64) -> u64 {
        let mut hash = self.base;
        for byte in slot.to_le_bytes() {
            hash = (hash ^ byte as u64).wrapping_mul(Self::FNV_PRIME);
        }
        hash
    }

    pub fn rng(&self, slot: u64) -> Rng {
        Rng::with_seed(self.seed(slot))
    }
}

/// Uniform values in `[0, 1)`.
pub fn alloc_and_init(
    buffer: &'static str,
    len: usize,
    rng: &mut Rng,
) -> Result<Vec<Real>, KernelError> {
    let mut data = try_alloc(buffer, len, 0.0)?;
    data.iter_mut().for_each(|value| *value = rng.f64());
    Ok(data)
}

pub fn alloc_and_init_const(
    buffer: &'static str,
    len: usize,
    value: Real,
) -> Result<Vec<Real>, KernelError> {
    try_alloc(buffer, len, value)
}

/// Random sign with magnitude in `[0.5, 1)`; never zero.
pub fn alloc_and_init_rand_sign(
    buffer: &'static str,
    len: usize,
    rng: &mut Rng,
) -> Result<Vec<Real>, KernelError> {
    let mut data = try_alloc(buffer, len, 0.0)?;
    data.iter_mut().for_each(|value| {
        let magnitude = 0.5 + 0.5 * rng.f64();
        *value = if rng.bool() { magnitude } else { -magnitude };
    });
    Ok(data)
}

/// Order-sensitive, index-weighted checksum: `sum((i + 1) * x[i])` over every
/// buffer added, plus any scalars. Uses compensated summation so large
/// buffers do not lose the low-order contributions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumAccumulator {
    sum: f64,
    compensation: f64,
}

impl ChecksumAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_slice(&mut self, data: &[Real]) -> &mut Self {
        for (i, &value) in data.iter().enumerate() {
            self.add((i + 1) as f64 * value);
        }
        self
    }

    pub fn add_indices(&mut self, data: &[Index]) -> &mut Self {
        for (i, &value) in data.iter().enumerate() {
            self.add((i + 1) as f64 * value as f64);
        }
        self
    }

    pub fn add_scalar(&mut self, value: f64) -> &mut Self {
        self.add(value);
        self
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }

    fn add(&mut self, term: f64) {
        let total = self.sum + term;
        if self.sum.abs() >= term.abs() {
            self.compensation += (self.sum - total) + term;
        } else {
            self.compensation += (term - total) + self.sum;
        }
        self.sum = total;
    }
}
