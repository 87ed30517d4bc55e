//! `Basic_INDEXLIST`: stable compaction of the indices whose input is
//! positive.

use crate::capability::VariantCapabilities;
use crate::config::{
    ChecksumTolerance, Index, KernelCost, KernelGroup, KernelInfo, ProblemSize, Real, SizeClass,
};
use crate::data::{alloc_and_init_rand_sign, try_alloc, ChecksumAccumulator, DataSeeder};
use crate::error::KernelError;
use crate::kernel::KernelSpec;
use crate::strategy::{sequential, threaded};
use crate::variant::VariantId;
use kernelsuite_backend_cpu::{stream_compact, ExecPolicy};
use rayon::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct IndexListData {
    pub x: Vec<Real>,
    pub list: Vec<Index>,
    pub len: Index,
}

impl IndexListData {
    /// The compacted prefix of `list`.
    pub fn indices(&self) -> &[Index] {
        let len = usize::try_from(self.len).unwrap_or(0).min(self.list.len());
        &self.list[..len]
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexList {
    input: Option<Arc<[Real]>>,
}

impl IndexList {
    pub const NAME: &'static str = "Basic_INDEXLIST";
    const DEFAULT_SIZE: usize = 1_000_000;
    const DEFAULT_REPS: usize = 100;

    pub fn new() -> Self {
        Self::default()
    }

    /// Run over `values` instead of generated data; the length is fixed for
    /// every size class.
    pub fn with_input(values: Vec<Real>) -> Self {
        Self {
            input: Some(values.into()),
        }
    }
}

fn base_seq(data: &mut IndexListData) {
    let mut count = 0;
    for i in 0..data.x.len() {
        if data.x[i] > 0.0 {
            data.list[count] = i as Index;
            count += 1;
        }
    }
    data.len = count as Index;
}

fn lambda_seq(data: &mut IndexListData) {
    let IndexListData { x, list, len } = data;
    let mut count = 0usize;
    let mut body = |i: usize| {
        if x[i] > 0.0 {
            list[count] = i as Index;
            count += 1;
        }
    };
    for i in 0..x.len() {
        body(i);
    }
    *len = count as Index;
}

/// One block of indices per pool thread; each block gathers its own kept
/// indices through the per-index closure, then blocks are joined in order.
fn lambda_threads(data: &mut IndexListData) {
    let IndexListData { x, list, len } = data;
    let x = x.as_slice();
    let keep = |i: usize| x[i] > 0.0;
    let chunk = x.len().div_ceil(rayon::current_num_threads().max(1)).max(1);
    let blocks: Vec<Vec<Index>> = (0..x.len().div_ceil(chunk))
        .into_par_iter()
        .map(|block| {
            let start = block * chunk;
            let end = (start + chunk).min(x.len());
            let mut kept = Vec::new();
            let mut body = |i: usize| {
                if keep(i) {
                    kept.push(i as Index);
                }
            };
            for i in start..end {
                body(i);
            }
            kept
        })
        .collect();

    let mut count = 0;
    for block in &blocks {
        list[count..count + block.len()].copy_from_slice(block);
        count += block.len();
    }
    *len = count as Index;
}

fn compact(policy: ExecPolicy) -> impl Fn(&mut IndexListData) + Send + Sync + 'static {
    move |data: &mut IndexListData| {
        let x = &data.x;
        let count = stream_compact(policy, x.len(), &mut data.list, |i| x[i] > 0.0, |i| i as Index);
        data.len = count as Index;
    }
}

fn base_threads(data: &mut IndexListData) {
    let kept: Vec<Index> = data
        .x
        .par_iter()
        .enumerate()
        .filter(|(_, value)| **value > 0.0)
        .map(|(i, _)| i as Index)
        .collect();
    data.list[..kept.len()].copy_from_slice(&kept);
    data.len = kept.len() as Index;
}

fn iter_alt(data: &mut IndexListData) {
    let kept = data
        .x
        .iter()
        .enumerate()
        .filter_map(|(i, value)| (*value > 0.0).then_some(i as Index));
    let mut count = 0;
    for (slot, index) in data.list.iter_mut().zip(kept) {
        *slot = index;
        count += 1;
    }
    data.len = count;
}

impl KernelSpec for IndexList {
    type Data = IndexListData;

    fn info(&self) -> KernelInfo {
        KernelInfo::new(Self::NAME, KernelGroup::Basic, Self::DEFAULT_SIZE, Self::DEFAULT_REPS)
    }

    fn resolve(&self, class: SizeClass) -> ProblemSize {
        let (len, reps) = class.scale_linear(Self::DEFAULT_SIZE, Self::DEFAULT_REPS);
        let len = self.input.as_ref().map_or(len, |values| values.len());
        ProblemSize::linear(class, len, reps)
    }

    fn cost(&self, size: &ProblemSize) -> KernelCost {
        let len = size.dim(0) as u64;
        let word = std::mem::size_of::<Real>() as u64;
        let index = std::mem::size_of::<Index>() as u64;
        KernelCost {
            its_per_rep: len,
            kernels_per_rep: 1,
            bytes_read_per_rep: word * len,
            bytes_written_per_rep: index * (len / 2) + index,
            flops_per_rep: 0,
        }
    }

    fn tolerance(&self, _size: &ProblemSize) -> ChecksumTolerance {
        ChecksumTolerance::Exact
    }

    fn declare(&self, caps: &mut VariantCapabilities<IndexListData>) {
        caps.declare(VariantId::BaseSeq, "default", sequential(base_seq))
            .declare(VariantId::LambdaSeq, "default", sequential(lambda_seq))
            .declare(VariantId::ForallSeq, "default", sequential(compact(ExecPolicy::Seq)))
            .declare(VariantId::BaseThreads, "default", threaded(base_threads))
            .declare(VariantId::LambdaThreads, "default", threaded(lambda_threads))
            .declare(VariantId::ForallThreads, "default", threaded(compact(ExecPolicy::par())))
            .declare(
                VariantId::ForallThreads,
                "chunk_4096",
                threaded(compact(ExecPolicy::par_chunked(4096))),
            )
            .declare(VariantId::IterAlt, "default", sequential(iter_alt));
    }

    fn allocate(&self, size: &ProblemSize) -> Result<IndexListData, KernelError> {
        let len = size.dim(0);
        let x = match &self.input {
            Some(values) => {
                let mut x = try_alloc("x", len, 0.0)?;
                x.iter_mut().zip(values.iter()).for_each(|(dst, src)| *dst = *src);
                x
            }
            None => alloc_and_init_rand_sign("x", len, &mut DataSeeder::new(Self::NAME).rng(0))?,
        };
        Ok(IndexListData {
            x,
            list: try_alloc("list", len, 0)?,
            len: 0,
        })
    }

    fn checksum(&self, data: &IndexListData) -> f64 {
        ChecksumAccumulator::new()
            .add_indices(data.indices())
            .add_scalar(data.len as f64)
            .value()
    }
}
