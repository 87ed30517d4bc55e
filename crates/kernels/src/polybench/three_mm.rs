//! `Polybench_3MM`: `E = A*B; F = C*D; G = E*F`.
//!
//! Every host strategy accumulates each dot product in `k` order, so their
//! checksums agree bit for bit; only the ndarray and GPU paths reorder.

use crate::capability::VariantCapabilities;
use crate::config::{
    ChecksumTolerance, KernelCost, KernelGroup, KernelInfo, ProblemSize, Real, SizeClass,
};
use crate::data::{alloc_and_init, alloc_and_init_const, ChecksumAccumulator, DataSeeder};
use crate::error::KernelError;
use crate::kernel::KernelSpec;
use crate::strategy::{sequential, threaded, try_sequential};
use crate::variant::VariantId;
use kernelsuite_backend_cpu::{forall_rows, ExecPolicy};
use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreeMmDims {
    pub ni: usize,
    pub nj: usize,
    pub nk: usize,
    pub nl: usize,
    pub nm: usize,
}

impl ThreeMmDims {
    pub fn for_class(class: SizeClass) -> (Self, usize) {
        let (dims, reps) = match class {
            SizeClass::Mini => ([16, 18, 20, 22, 24], 10_000),
            SizeClass::Small => ([40, 50, 60, 70, 80], 1_000),
            SizeClass::Medium => ([180, 190, 200, 210, 220], 100),
            SizeClass::Large => ([800, 900, 1000, 1100, 1200], 2),
            SizeClass::ExtraLarge => ([1600, 1800, 2000, 2200, 2400], 1),
        };
        let [ni, nj, nk, nl, nm] = dims;
        (Self { ni, nj, nk, nl, nm }, reps)
    }

    fn from_size(size: &ProblemSize) -> Self {
        Self {
            ni: size.dim(0),
            nj: size.dim(1),
            nk: size.dim(2),
            nl: size.dim(3),
            nm: size.dim(4),
        }
    }
}

/// Row-major matrices: `A ni x nk`, `B nk x nj`, `C nj x nm`, `D nm x nl`,
/// `E ni x nj`, `F nj x nl`, `G ni x nl`.
#[derive(Debug, Clone)]
pub struct ThreeMmData {
    pub dims: ThreeMmDims,
    pub a: Vec<Real>,
    pub b: Vec<Real>,
    pub c: Vec<Real>,
    pub d: Vec<Real>,
    pub e: Vec<Real>,
    pub f: Vec<Real>,
    pub g: Vec<Real>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeMm;

impl ThreeMm {
    pub const NAME: &'static str = "Polybench_3MM";

    pub fn new() -> Self {
        Self
    }
}

/// `out_row[j] = sum_k lhs_row[k] * rhs[k][j]`.
#[inline]
fn dot_row(out_row: &mut [Real], lhs_row: &[Real], rhs: &[Real]) {
    let cols = out_row.len();
    for (j, out) in out_row.iter_mut().enumerate() {
        let mut dot = 0.0;
        for (k, lhs) in lhs_row.iter().enumerate() {
            dot += lhs * rhs[k * cols + j];
        }
        *out = dot;
    }
}

fn base_seq(data: &mut ThreeMmData) {
    let ThreeMmDims { ni, nj, nk, nl, nm } = data.dims;
    for i in 0..ni {
        for j in 0..nj {
            let mut dot = 0.0;
            for k in 0..nk {
                dot += data.a[i * nk + k] * data.b[k * nj + j];
            }
            data.e[i * nj + j] = dot;
        }
    }
    for i in 0..nj {
        for j in 0..nl {
            let mut dot = 0.0;
            for k in 0..nm {
                dot += data.c[i * nm + k] * data.d[k * nl + j];
            }
            data.f[i * nl + j] = dot;
        }
    }
    for i in 0..ni {
        for j in 0..nl {
            let mut dot = 0.0;
            for k in 0..nj {
                dot += data.e[i * nj + k] * data.f[k * nl + j];
            }
            data.g[i * nl + j] = dot;
        }
    }
}

fn blocked_product(
    out: &mut [Real],
    lhs: &[Real],
    rhs: &[Real],
    rows: usize,
    cols: usize,
    inner: usize,
    block: usize,
) {
    for i0 in (0..rows).step_by(block) {
        for j0 in (0..cols).step_by(block) {
            for i in i0..(i0 + block).min(rows) {
                for j in j0..(j0 + block).min(cols) {
                    let mut dot = 0.0;
                    for k in 0..inner {
                        dot += lhs[i * inner + k] * rhs[k * cols + j];
                    }
                    out[i * cols + j] = dot;
                }
            }
        }
    }
}

fn blocked_seq(data: &mut ThreeMmData, block: usize) {
    let ThreeMmDims { ni, nj, nk, nl, nm } = data.dims;
    blocked_product(&mut data.e, &data.a, &data.b, ni, nj, nk, block);
    blocked_product(&mut data.f, &data.c, &data.d, nj, nl, nm, block);
    blocked_product(&mut data.g, &data.e, &data.f, ni, nl, nj, block);
}

fn lambda_seq(data: &mut ThreeMmData) {
    let ThreeMmDims { ni, nj, nk, nl, nm } = data.dims;
    let product = |lhs: &[Real], rhs: &[Real], inner: usize, cols: usize, i: usize, j: usize| {
        let mut dot = 0.0;
        for k in 0..inner {
            dot += lhs[i * inner + k] * rhs[k * cols + j];
        }
        dot
    };
    for i in 0..ni {
        for j in 0..nj {
            data.e[i * nj + j] = product(&data.a, &data.b, nk, nj, i, j);
        }
    }
    for i in 0..nj {
        for j in 0..nl {
            data.f[i * nl + j] = product(&data.c, &data.d, nm, nl, i, j);
        }
    }
    for i in 0..ni {
        for j in 0..nl {
            data.g[i * nl + j] = product(&data.e, &data.f, nj, nl, i, j);
        }
    }
}

fn forall(data: &mut ThreeMmData, policy: ExecPolicy) {
    let ThreeMmDims { nj, nk, nl, nm, .. } = data.dims;
    let ThreeMmData { a, b, c, d, e, f, g, .. } = data;
    let (a, b, c, d) = (a.as_slice(), b.as_slice(), c.as_slice(), d.as_slice());
    forall_rows(policy, e, nj, |i, row| dot_row(row, &a[i * nk..(i + 1) * nk], b));
    forall_rows(policy, f, nl, |i, row| dot_row(row, &c[i * nm..(i + 1) * nm], d));
    let (e, f) = (e.as_slice(), f.as_slice());
    forall_rows(policy, g, nl, |i, row| dot_row(row, &e[i * nj..(i + 1) * nj], f));
}

fn base_threads(data: &mut ThreeMmData) {
    let ThreeMmDims { nj, nk, nl, nm, .. } = data.dims;
    let ThreeMmData { a, b, c, d, e, f, g, .. } = data;
    let (a, b, c, d) = (a.as_slice(), b.as_slice(), c.as_slice(), d.as_slice());
    e.par_chunks_mut(nj)
        .zip(a.par_chunks(nk))
        .for_each(|(row, lhs)| dot_row(row, lhs, b));
    f.par_chunks_mut(nl)
        .zip(c.par_chunks(nm))
        .for_each(|(row, lhs)| dot_row(row, lhs, d));
    let (e, f) = (e.as_slice(), f.as_slice());
    g.par_chunks_mut(nl)
        .zip(e.par_chunks(nj))
        .for_each(|(row, lhs)| dot_row(row, lhs, f));
}

fn view(data: &[Real], rows: usize, cols: usize) -> Result<ArrayView2<'_, Real>, KernelError> {
    Ok(ArrayView2::from_shape((rows, cols), data).map_err(anyhow::Error::from)?)
}

fn view_mut(
    data: &mut [Real],
    rows: usize,
    cols: usize,
) -> Result<ArrayViewMut2<'_, Real>, KernelError> {
    Ok(ArrayViewMut2::from_shape((rows, cols), data).map_err(anyhow::Error::from)?)
}

fn iter_alt(data: &mut ThreeMmData) -> Result<(), KernelError> {
    let ThreeMmDims { ni, nj, nk, nl, nm } = data.dims;
    general_mat_mul(
        1.0,
        &view(&data.a, ni, nk)?,
        &view(&data.b, nk, nj)?,
        0.0,
        &mut view_mut(&mut data.e, ni, nj)?,
    );
    general_mat_mul(
        1.0,
        &view(&data.c, nj, nm)?,
        &view(&data.d, nm, nl)?,
        0.0,
        &mut view_mut(&mut data.f, nj, nl)?,
    );
    general_mat_mul(
        1.0,
        &view(&data.e, ni, nj)?,
        &view(&data.f, nj, nl)?,
        0.0,
        &mut view_mut(&mut data.g, ni, nl)?,
    );
    Ok(())
}

impl KernelSpec for ThreeMm {
    type Data = ThreeMmData;

    fn info(&self) -> KernelInfo {
        let (dims, reps) = ThreeMmDims::for_class(SizeClass::Medium);
        KernelInfo::new(Self::NAME, KernelGroup::Polybench, dims.ni * dims.nl, reps)
    }

    fn resolve(&self, class: SizeClass) -> ProblemSize {
        let (dims, reps) = ThreeMmDims::for_class(class);
        ProblemSize::new(class, vec![dims.ni, dims.nj, dims.nk, dims.nl, dims.nm], reps)
    }

    fn cost(&self, size: &ProblemSize) -> KernelCost {
        let ThreeMmDims { ni, nj, nk, nl, nm } = ThreeMmDims::from_size(size);
        let [ni, nj, nk, nl, nm] = [ni, nj, nk, nl, nm].map(|d| d as u64);
        let word = std::mem::size_of::<Real>() as u64;
        KernelCost {
            its_per_rep: ni * nj + nj * nl + ni * nl,
            kernels_per_rep: 3,
            bytes_read_per_rep: word * (ni * nk + nk * nj + nj * nm + nm * nl + ni * nj + nj * nl),
            bytes_written_per_rep: word * (ni * nj + nj * nl + ni * nl),
            flops_per_rep: 2 * (ni * nj * nk + nj * nl * nm + ni * nl * nj),
        }
    }

    fn tolerance(&self, size: &ProblemSize) -> ChecksumTolerance {
        let dims = ThreeMmDims::from_size(size);
        ChecksumTolerance::Rounded {
            depth: dims.nj + dims.nk.max(dims.nm),
        }
    }

    fn declare(&self, caps: &mut VariantCapabilities<ThreeMmData>) {
        caps.declare(VariantId::BaseSeq, "default", sequential(base_seq))
            .declare(VariantId::BaseSeq, "blocked_32", sequential(|d| blocked_seq(d, 32)))
            .declare(VariantId::LambdaSeq, "default", sequential(lambda_seq))
            .declare(VariantId::ForallSeq, "default", sequential(|d| forall(d, ExecPolicy::Seq)))
            .declare(VariantId::BaseThreads, "default", threaded(base_threads))
            .declare(
                VariantId::ForallThreads,
                "default",
                threaded(|d| forall(d, ExecPolicy::par())),
            )
            .declare(VariantId::IterAlt, "default", try_sequential(iter_alt));
        declare_gpu(caps);
    }

    fn allocate(&self, size: &ProblemSize) -> Result<ThreeMmData, KernelError> {
        let dims = ThreeMmDims::from_size(size);
        let ThreeMmDims { ni, nj, nk, nl, nm } = dims;
        let seeder = DataSeeder::new(Self::NAME);
        Ok(ThreeMmData {
            dims,
            a: alloc_and_init("A", ni * nk, &mut seeder.rng(0))?,
            b: alloc_and_init("B", nk * nj, &mut seeder.rng(1))?,
            c: alloc_and_init("C", nj * nm, &mut seeder.rng(2))?,
            d: alloc_and_init("D", nm * nl, &mut seeder.rng(3))?,
            e: alloc_and_init_const("E", ni * nj, 0.0)?,
            f: alloc_and_init_const("F", nj * nl, 0.0)?,
            g: alloc_and_init_const("G", ni * nl, 0.0)?,
        })
    }

    fn checksum(&self, data: &ThreeMmData) -> f64 {
        ChecksumAccumulator::new().add_slice(&data.g).value()
    }
}

#[cfg(feature = "gpu")]
fn declare_gpu(caps: &mut VariantCapabilities<ThreeMmData>) {
    for variant in [VariantId::BaseGpu, VariantId::ForallGpu] {
        caps.declare(variant, "tile_8", gpu::MatmulChainGpu::new(8))
            .declare(variant, "tile_16", gpu::MatmulChainGpu::new(16));
    }
}

#[cfg(not(feature = "gpu"))]
fn declare_gpu(_caps: &mut VariantCapabilities<ThreeMmData>) {}

#[cfg(feature = "gpu")]
mod gpu {
    use super::ThreeMmData;
    use crate::config::Precision;
    use crate::error::KernelError;
    use crate::gpu::{matmul_program, MatmulStep};
    use crate::strategy::{ExecContext, Launch, Strategy};
    use kernelsuite_backend_gpu::{DeviceBuffer, GpuContext};

    /// The three products as three dispatches on one queue.
    pub struct MatmulChainGpu {
        tile: u32,
    }

    impl MatmulChainGpu {
        pub fn new(tile: u32) -> Self {
            Self { tile }
        }
    }

    impl Strategy<ThreeMmData> for MatmulChainGpu {
        fn precision(&self) -> Precision {
            Precision::F32
        }

        fn launch<'a>(
            &'a self,
            ctx: &'a ExecContext,
            data: &'a mut ThreeMmData,
        ) -> Result<Box<dyn Launch + 'a>, KernelError> {
            let gpu = ctx.gpu().ok_or(KernelError::GpuUnavailable)?;
            let dims = data.dims;
            let a = gpu.upload("A", &data.a)?;
            let b = gpu.upload("B", &data.b)?;
            let c = gpu.upload("C", &data.c)?;
            let d = gpu.upload("D", &data.d)?;
            let e = gpu.upload("E", &data.e)?;
            let f = gpu.upload("F", &data.f)?;
            let g = gpu.upload("G", &data.g)?;

            let program = matmul_program(gpu, self.tile)?;
            let steps = [
                MatmulStep::new(gpu, &program, &a, &b, &e, dims.ni, dims.nj, dims.nk, self.tile)?,
                MatmulStep::new(gpu, &program, &c, &d, &f, dims.nj, dims.nl, dims.nm, self.tile)?,
                MatmulStep::new(gpu, &program, &e, &f, &g, dims.ni, dims.nl, dims.nj, self.tile)?,
            ];

            Ok(Box::new(MatmulChainLaunch {
                gpu,
                data,
                steps,
                outputs: [e, f, g],
                _inputs: [a, b, c, d],
            }))
        }
    }

    struct MatmulChainLaunch<'a> {
        gpu: &'a GpuContext,
        data: &'a mut ThreeMmData,
        steps: [MatmulStep; 3],
        outputs: [DeviceBuffer; 3],
        _inputs: [DeviceBuffer; 4],
    }

    impl<'a> Launch for MatmulChainLaunch<'a> {
        fn run_rep(&mut self) -> Result<(), KernelError> {
            for step in &self.steps {
                step.dispatch(self.gpu);
            }
            Ok(())
        }

        fn synchronize(&mut self) -> Result<(), KernelError> {
            self.gpu.synchronize();
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<(), KernelError> {
            let this = *self;
            let [e, f, g] = &this.outputs;
            let (gpu, data) = (this.gpu, this.data);
            data.e.copy_from_slice(&gpu.read_back(e, data.e.len())?);
            data.f.copy_from_slice(&gpu.read_back(f, data.f.len())?);
            data.g.copy_from_slice(&gpu.read_back(g, data.g.len())?);
            Ok(())
        }
    }
}
