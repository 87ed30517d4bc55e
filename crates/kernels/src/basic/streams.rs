//! Two-input, three-output streaming kernels.
//!
//! `Basic_MULADDSUB` and `Basic_INIT3` share buffers, fills, checksum and the
//! full set of variants; each supplies only its per-element body.

use crate::capability::VariantCapabilities;
use crate::config::{KernelCost, Real};
use crate::data::{alloc_and_init, alloc_and_init_const, ChecksumAccumulator, DataSeeder};
use crate::error::KernelError;
use crate::strategy::{sequential, threaded};
use crate::variant::VariantId;
use kernelsuite_backend_cpu::{forall_mut3, ExecPolicy};
use rayon::prelude::*;

/// `(in1[i], in2[i]) -> (out1[i], out2[i], out3[i])`.
pub type StreamBody = fn(Real, Real) -> (Real, Real, Real);

pub const THREAD_CHUNK: usize = 4096;

#[derive(Debug, Clone)]
pub struct StreamData {
    pub in1: Vec<Real>,
    pub in2: Vec<Real>,
    pub out1: Vec<Real>,
    pub out2: Vec<Real>,
    pub out3: Vec<Real>,
}

impl StreamData {
    pub fn allocate(kernel: &str, len: usize) -> Result<Self, KernelError> {
        let seeder = DataSeeder::new(kernel);
        Ok(Self {
            in1: alloc_and_init("in1", len, &mut seeder.rng(0))?,
            in2: alloc_and_init("in2", len, &mut seeder.rng(1))?,
            out1: alloc_and_init_const("out1", len, 0.0)?,
            out2: alloc_and_init_const("out2", len, 0.0)?,
            out3: alloc_and_init_const("out3", len, 0.0)?,
        })
    }

    pub fn checksum(&self) -> f64 {
        ChecksumAccumulator::new()
            .add_slice(&self.out1)
            .add_slice(&self.out2)
            .add_slice(&self.out3)
            .value()
    }
}

pub fn stream_cost(len: usize, flops_per_element: u64) -> KernelCost {
    let len = len as u64;
    let word = std::mem::size_of::<Real>() as u64;
    KernelCost {
        its_per_rep: len,
        kernels_per_rep: 1,
        bytes_read_per_rep: 2 * word * len,
        bytes_written_per_rep: 3 * word * len,
        flops_per_rep: flops_per_element * len,
    }
}

pub(crate) fn base_loop(data: &mut StreamData, body: StreamBody) {
    for i in 0..data.in1.len() {
        let (x, y, z) = body(data.in1[i], data.in2[i]);
        data.out1[i] = x;
        data.out2[i] = y;
        data.out3[i] = z;
    }
}

fn lambda_loop(data: &mut StreamData, body: StreamBody) {
    let StreamData {
        in1,
        in2,
        out1,
        out2,
        out3,
    } = data;
    let mut element = |i: usize| {
        let (x, y, z) = body(in1[i], in2[i]);
        out1[i] = x;
        out2[i] = y;
        out3[i] = z;
    };
    for i in 0..in1.len() {
        element(i);
    }
}

/// Static schedule: one contiguous block of indices per pool thread unless
/// `chunk` is given, each block running the per-index closure in order.
fn lambda_threads(data: &mut StreamData, body: StreamBody, chunk: Option<usize>) {
    let StreamData {
        in1,
        in2,
        out1,
        out2,
        out3,
    } = data;
    let (in1, in2) = (in1.as_slice(), in2.as_slice());
    let element = |i: usize| body(in1[i], in2[i]);
    let chunk = chunk
        .unwrap_or_else(|| out1.len().div_ceil(rayon::current_num_threads().max(1)))
        .max(1);
    out1.par_chunks_mut(chunk)
        .zip(out2.par_chunks_mut(chunk))
        .zip(out3.par_chunks_mut(chunk))
        .enumerate()
        .for_each(|(block, ((x, y), z))| {
            let start = block * chunk;
            for j in 0..x.len() {
                (x[j], y[j], z[j]) = element(start + j);
            }
        });
}

fn forall_loop(data: &mut StreamData, body: StreamBody, policy: ExecPolicy) {
    let StreamData {
        in1,
        in2,
        out1,
        out2,
        out3,
    } = data;
    forall_mut3(policy, out1, out2, out3, |i, x, y, z| {
        (*x, *y, *z) = body(in1[i], in2[i]);
    });
}

fn base_threads(data: &mut StreamData, body: StreamBody, min_len: usize) {
    let StreamData {
        in1,
        in2,
        out1,
        out2,
        out3,
    } = data;
    out1.par_iter_mut()
        .zip(out2.par_iter_mut())
        .zip(out3.par_iter_mut())
        .zip(in1.par_iter().zip(in2.par_iter()))
        .with_min_len(min_len)
        .for_each(|(((x, y), z), (a, b))| {
            (*x, *y, *z) = body(*a, *b);
        });
}

fn iter_alt(data: &mut StreamData, body: StreamBody) {
    let outputs = data
        .out1
        .iter_mut()
        .zip(data.out2.iter_mut())
        .zip(data.out3.iter_mut());
    let inputs = data.in1.iter().zip(data.in2.iter());
    for (((x, y), z), (a, b)) in outputs.zip(inputs) {
        (*x, *y, *z) = body(*a, *b);
    }
}

/// Declare every host variant, plus the accelerated ones when built with the
/// `gpu` feature. `gpu_body` is the same body in WGSL.
pub fn declare_stream_variants(
    caps: &mut VariantCapabilities<StreamData>,
    label: &'static str,
    body: StreamBody,
    gpu_body: &'static str,
) {
    caps.declare(VariantId::BaseSeq, "default", sequential(move |d| base_loop(d, body)))
        .declare(VariantId::LambdaSeq, "default", sequential(move |d| lambda_loop(d, body)))
        .declare(
            VariantId::ForallSeq,
            "default",
            sequential(move |d| forall_loop(d, body, ExecPolicy::Seq)),
        )
        .declare(VariantId::BaseThreads, "default", threaded(move |d| base_threads(d, body, 1)))
        .declare(
            VariantId::BaseThreads,
            "chunk_4096",
            threaded(move |d| base_threads(d, body, THREAD_CHUNK)),
        )
        .declare(
            VariantId::LambdaThreads,
            "default",
            threaded(move |d| lambda_threads(d, body, None)),
        )
        .declare(
            VariantId::LambdaThreads,
            "chunk_4096",
            threaded(move |d| lambda_threads(d, body, Some(THREAD_CHUNK))),
        )
        .declare(
            VariantId::ForallThreads,
            "default",
            threaded(move |d| forall_loop(d, body, ExecPolicy::par())),
        )
        .declare(
            VariantId::ForallThreads,
            "chunk_4096",
            threaded(move |d| forall_loop(d, body, ExecPolicy::par_chunked(THREAD_CHUNK))),
        )
        .declare(VariantId::IterAlt, "default", sequential(move |d| iter_alt(d, body)));

    declare_gpu(caps, label, gpu_body);
}

#[cfg(feature = "gpu")]
fn declare_gpu(
    caps: &mut VariantCapabilities<StreamData>,
    label: &'static str,
    gpu_body: &'static str,
) {
    use crate::gpu::ElementwiseGpu;
    for variant in [VariantId::BaseGpu, VariantId::ForallGpu] {
        caps.declare(variant, "block_64", ElementwiseGpu::new(label, gpu_body, 64))
            .declare(variant, "block_256", ElementwiseGpu::new(label, gpu_body, 256));
    }
}

#[cfg(not(feature = "gpu"))]
fn declare_gpu(
    _caps: &mut VariantCapabilities<StreamData>,
    _label: &'static str,
    _gpu_body: &'static str,
) {
}

#[cfg(feature = "gpu")]
impl crate::gpu::DeviceBuffers for StreamData {
    const INPUTS: &'static [&'static str] = &["in1", "in2"];
    const OUTPUTS: &'static [&'static str] = &["out1", "out2", "out3"];

    fn element_count(&self) -> usize {
        self.in1.len()
    }

    fn inputs(&self) -> Vec<&[Real]> {
        vec![self.in1.as_slice(), self.in2.as_slice()]
    }

    fn outputs(&self) -> Vec<&[Real]> {
        vec![self.out1.as_slice(), self.out2.as_slice(), self.out3.as_slice()]
    }

    fn outputs_mut(&mut self) -> Vec<&mut [Real]> {
        vec![
            self.out1.as_mut_slice(),
            self.out2.as_mut_slice(),
            self.out3.as_mut_slice(),
        ]
    }
}
