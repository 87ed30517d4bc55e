//! `Apps_MASS3DPA`: partial-assembly action of a high-order 3D mass matrix.
//!
//! Each element interpolates its `D1D^3` degrees of freedom to a `Q1D^3`
//! quadrature grid with the 1D basis `B`, scales by the quadrature data `D`
//! and projects back with `Bt`, adding the result into `Y`. Elements are
//! independent, which is the unit every parallel strategy splits on.

use crate::capability::VariantCapabilities;
use crate::config::{
    ChecksumTolerance, KernelCost, KernelGroup, KernelInfo, ProblemSize, Real, SizeClass,
};
use crate::data::{alloc_and_init, alloc_and_init_const, try_alloc, ChecksumAccumulator, DataSeeder};
use crate::error::KernelError;
use crate::kernel::KernelSpec;
use crate::strategy::{sequential, threaded};
use crate::variant::VariantId;
use kernelsuite_backend_cpu::{forall_rows, ExecPolicy};
use rayon::prelude::*;

/// Degrees of freedom per element edge.
pub const D1D: usize = 4;
/// Quadrature points per element edge.
pub const Q1D: usize = 5;

const DOFS: usize = D1D * D1D * D1D;
const QPTS: usize = Q1D * Q1D * Q1D;

#[derive(Debug, Clone)]
pub struct Mass3dpaData {
    pub elements: usize,
    /// `B[q][d]`, `Q1D x D1D`.
    pub b: Vec<Real>,
    /// `Bt[d][q]`, the transpose of `b`.
    pub bt: Vec<Real>,
    /// Quadrature data, `Q1D^3` per element.
    pub d: Vec<Real>,
    pub x: Vec<Real>,
    pub y: Vec<Real>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mass3dpa;

impl Mass3dpa {
    pub const NAME: &'static str = "Apps_MASS3DPA";
    const DEFAULT_LEN: usize = 1_000_000;
    const DEFAULT_REPS: usize = 50;

    pub fn new() -> Self {
        Self
    }
}

/// `y_e += Bt^3 (D_e * B^3 x_e)` for one element.
pub fn apply_element(b: &[Real], bt: &[Real], d_e: &[Real], x_e: &[Real], y_e: &mut [Real]) {
    let mut ddq = [[[0.0; Q1D]; D1D]; D1D];
    for dz in 0..D1D {
        for dy in 0..D1D {
            for qx in 0..Q1D {
                let mut sum = 0.0;
                for dx in 0..D1D {
                    sum += x_e[(dz * D1D + dy) * D1D + dx] * b[qx * D1D + dx];
                }
                ddq[dz][dy][qx] = sum;
            }
        }
    }

    let mut dqq = [[[0.0; Q1D]; Q1D]; D1D];
    for dz in 0..D1D {
        for qy in 0..Q1D {
            for qx in 0..Q1D {
                let mut sum = 0.0;
                for dy in 0..D1D {
                    sum += ddq[dz][dy][qx] * b[qy * D1D + dy];
                }
                dqq[dz][qy][qx] = sum;
            }
        }
    }

    let mut qqq = [[[0.0; Q1D]; Q1D]; Q1D];
    for qz in 0..Q1D {
        for qy in 0..Q1D {
            for qx in 0..Q1D {
                let mut sum = 0.0;
                for dz in 0..D1D {
                    sum += dqq[dz][qy][qx] * b[qz * D1D + dz];
                }
                qqq[qz][qy][qx] = sum * d_e[(qz * Q1D + qy) * Q1D + qx];
            }
        }
    }

    let mut qqd = [[[0.0; D1D]; Q1D]; Q1D];
    for qz in 0..Q1D {
        for qy in 0..Q1D {
            for dx in 0..D1D {
                let mut sum = 0.0;
                for qx in 0..Q1D {
                    sum += qqq[qz][qy][qx] * bt[dx * Q1D + qx];
                }
                qqd[qz][qy][dx] = sum;
            }
        }
    }

    let mut qdd = [[[0.0; D1D]; D1D]; Q1D];
    for qz in 0..Q1D {
        for dy in 0..D1D {
            for dx in 0..D1D {
                let mut sum = 0.0;
                for qy in 0..Q1D {
                    sum += qqd[qz][qy][dx] * bt[dy * Q1D + qy];
                }
                qdd[qz][dy][dx] = sum;
            }
        }
    }

    for dz in 0..D1D {
        for dy in 0..D1D {
            for dx in 0..D1D {
                let mut sum = 0.0;
                for qz in 0..Q1D {
                    sum += qdd[qz][dy][dx] * bt[dz * Q1D + qz];
                }
                y_e[(dz * D1D + dy) * D1D + dx] += sum;
            }
        }
    }
}

fn base_seq(data: &mut Mass3dpaData) {
    for e in 0..data.elements {
        apply_element(
            &data.b,
            &data.bt,
            &data.d[e * QPTS..(e + 1) * QPTS],
            &data.x[e * DOFS..(e + 1) * DOFS],
            &mut data.y[e * DOFS..(e + 1) * DOFS],
        );
    }
}

fn forall(data: &mut Mass3dpaData, policy: ExecPolicy) {
    let Mass3dpaData { b, bt, d, x, y, .. } = data;
    let (b, bt, d, x) = (b.as_slice(), bt.as_slice(), d.as_slice(), x.as_slice());
    forall_rows(policy, y, DOFS, |e, y_e| {
        apply_element(b, bt, &d[e * QPTS..(e + 1) * QPTS], &x[e * DOFS..(e + 1) * DOFS], y_e)
    });
}

fn base_threads(data: &mut Mass3dpaData) {
    let Mass3dpaData { b, bt, d, x, y, .. } = data;
    let (b, bt) = (b.as_slice(), bt.as_slice());
    y.par_chunks_mut(DOFS)
        .zip(x.par_chunks(DOFS))
        .zip(d.par_chunks(QPTS))
        .for_each(|((y_e, x_e), d_e)| apply_element(b, bt, d_e, x_e, y_e));
}

impl KernelSpec for Mass3dpa {
    type Data = Mass3dpaData;

    fn info(&self) -> KernelInfo {
        KernelInfo::new(Self::NAME, KernelGroup::Apps, Self::DEFAULT_LEN, Self::DEFAULT_REPS)
    }

    fn resolve(&self, class: SizeClass) -> ProblemSize {
        let (len, reps) = class.scale_linear(Self::DEFAULT_LEN, Self::DEFAULT_REPS);
        ProblemSize::new(class, vec![(len / QPTS).max(1)], reps)
    }

    fn cost(&self, size: &ProblemSize) -> KernelCost {
        let ne = size.dim(0) as u64;
        let (d1, q1) = (D1D as u64, Q1D as u64);
        let word = std::mem::size_of::<Real>() as u64;
        let flops_per_element = 2 * d1 * d1 * d1 * q1
            + 2 * d1 * d1 * q1 * q1
            + 2 * d1 * q1 * q1 * q1
            + q1 * q1 * q1
            + 2 * q1 * q1 * q1 * d1
            + 2 * q1 * q1 * d1 * d1
            + 2 * q1 * d1 * d1 * d1
            + d1 * d1 * d1;
        KernelCost {
            its_per_rep: ne,
            kernels_per_rep: 1,
            bytes_read_per_rep: word * (2 * q1 * d1 + ne * (2 * d1 * d1 * d1 + q1 * q1 * q1)),
            bytes_written_per_rep: word * ne * d1 * d1 * d1,
            flops_per_rep: ne * flops_per_element,
        }
    }

    fn tolerance(&self, _size: &ProblemSize) -> ChecksumTolerance {
        ChecksumTolerance::Rounded { depth: 6 * Q1D }
    }

    fn declare(&self, caps: &mut VariantCapabilities<Mass3dpaData>) {
        caps.declare(VariantId::BaseSeq, "default", sequential(base_seq))
            .declare(VariantId::ForallSeq, "default", sequential(|d| forall(d, ExecPolicy::Seq)))
            .declare(VariantId::BaseThreads, "default", threaded(base_threads))
            .declare(
                VariantId::ForallThreads,
                "default",
                threaded(|d| forall(d, ExecPolicy::par())),
            );
    }

    fn allocate(&self, size: &ProblemSize) -> Result<Mass3dpaData, KernelError> {
        let elements = size.dim(0);
        let seeder = DataSeeder::new(Self::NAME);
        let b = alloc_and_init("B", Q1D * D1D, &mut seeder.rng(0))?;
        let mut bt = try_alloc("Bt", D1D * Q1D, 0.0)?;
        for q in 0..Q1D {
            for d in 0..D1D {
                bt[d * Q1D + q] = b[q * D1D + d];
            }
        }
        Ok(Mass3dpaData {
            elements,
            b,
            bt,
            d: alloc_and_init("D", elements.saturating_mul(QPTS), &mut seeder.rng(1))?,
            x: alloc_and_init("X", elements.saturating_mul(DOFS), &mut seeder.rng(2))?,
            y: alloc_and_init_const("Y", elements.saturating_mul(DOFS), 0.0)?,
        })
    }

    fn checksum(&self, data: &Mass3dpaData) -> f64 {
        ChecksumAccumulator::new().add_slice(&data.y).value()
    }
}
