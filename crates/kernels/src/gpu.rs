//! wgpu strategies shared by the accelerated variants.
//!
//! Host data is narrowed to `f32` on upload, so every strategy here reports
//! [`Precision::F32`].

use crate::config::{Precision, Real};
use crate::error::KernelError;
use crate::strategy::{ExecContext, Launch, Strategy};
use kernelsuite_backend_gpu::{
    elementwise_shader_source, matmul_shader_source, BindingKind, BoundProgram, ComputeProgram,
    DeviceBuffer, GpuContext, GpuLaunchPlan, GpuPlanner, LinearParams, MatmulParams,
};
use std::sync::Arc;

/// Kernel data that element-wise GPU strategies can stage on the device.
/// Every listed buffer has [`DeviceBuffers::element_count`] elements.
pub trait DeviceBuffers: Send + 'static {
    const INPUTS: &'static [&'static str];
    const OUTPUTS: &'static [&'static str];

    fn element_count(&self) -> usize;
    fn inputs(&self) -> Vec<&[Real]>;
    fn outputs(&self) -> Vec<&[Real]>;
    fn outputs_mut(&mut self) -> Vec<&mut [Real]>;
}

/// One invocation per element; `body` is WGSL using `i` and the buffer names.
pub struct ElementwiseGpu {
    label: &'static str,
    body: &'static str,
    block: u32,
}

impl ElementwiseGpu {
    pub fn new(label: &'static str, body: &'static str, block: u32) -> Self {
        Self { label, body, block }
    }
}

impl<D: DeviceBuffers> Strategy<D> for ElementwiseGpu {
    fn precision(&self) -> Precision {
        Precision::F32
    }

    fn launch<'a>(
        &'a self,
        ctx: &'a ExecContext,
        data: &'a mut D,
    ) -> Result<Box<dyn Launch + 'a>, KernelError> {
        let gpu = ctx.gpu().ok_or(KernelError::GpuUnavailable)?;
        let len = data.element_count();

        let inputs = D::INPUTS
            .iter()
            .zip(data.inputs())
            .map(|(name, values)| gpu.upload(name, values))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let outputs = D::OUTPUTS
            .iter()
            .zip(data.outputs())
            .map(|(name, values)| gpu.upload(name, values))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let plan = GpuPlanner::new().plan_linear(len, self.block)?;
        let params = gpu.uniform("params", &LinearParams::new(len, &plan));

        let mut kinds = vec![BindingKind::ReadOnly; inputs.len()];
        kinds.extend(std::iter::repeat(BindingKind::ReadWrite).take(outputs.len()));
        kinds.push(BindingKind::Uniform);
        let source = elementwise_shader_source(D::INPUTS, D::OUTPUTS, self.body, self.block);
        let program = gpu.program(self.label, &source, &kinds)?;

        let buffers: Vec<&DeviceBuffer> = inputs
            .iter()
            .chain(outputs.iter())
            .chain(std::iter::once(&params))
            .collect();
        let bound = gpu.bind(&program, &buffers)?;

        Ok(Box::new(ElementwiseLaunch {
            gpu,
            data,
            bound,
            plan,
            len,
            outputs,
            _inputs: inputs,
            _params: params,
        }))
    }
}

struct ElementwiseLaunch<'a, D> {
    gpu: &'a GpuContext,
    data: &'a mut D,
    bound: BoundProgram,
    plan: GpuLaunchPlan,
    len: usize,
    outputs: Vec<DeviceBuffer>,
    _inputs: Vec<DeviceBuffer>,
    _params: DeviceBuffer,
}

impl<'a, D: DeviceBuffers> Launch for ElementwiseLaunch<'a, D> {
    fn run_rep(&mut self) -> Result<(), KernelError> {
        self.gpu.dispatch(&self.bound, &self.plan);
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), KernelError> {
        self.gpu.synchronize();
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), KernelError> {
        let this = *self;
        for (buffer, host) in this.outputs.iter().zip(this.data.outputs_mut()) {
            let values = this.gpu.read_back(buffer, this.len)?;
            host.copy_from_slice(&values);
        }
        Ok(())
    }
}

/// Row-major `out (rows x cols) = lhs (rows x inner) * rhs (inner x cols)`
/// staged for repeated dispatch.
pub struct MatmulStep {
    bound: BoundProgram,
    plan: GpuLaunchPlan,
    _params: DeviceBuffer,
}

impl MatmulStep {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gpu: &GpuContext,
        program: &Arc<ComputeProgram>,
        lhs: &DeviceBuffer,
        rhs: &DeviceBuffer,
        out: &DeviceBuffer,
        rows: usize,
        cols: usize,
        inner: usize,
        tile: u32,
    ) -> Result<Self, KernelError> {
        let params = gpu.uniform(
            "matmul_params",
            &MatmulParams {
                rows: to_u32(rows)?,
                cols: to_u32(cols)?,
                inner: to_u32(inner)?,
                _pad: 0,
            },
        );
        let bound = gpu.bind(program, &[lhs, rhs, out, &params])?;
        let plan = GpuPlanner::new().plan_tiled(rows, cols, tile)?;
        Ok(Self {
            bound,
            plan,
            _params: params,
        })
    }

    pub fn dispatch(&self, gpu: &GpuContext) {
        gpu.dispatch(&self.bound, &self.plan);
    }
}

pub fn matmul_program(gpu: &GpuContext, tile: u32) -> Result<Arc<ComputeProgram>, KernelError> {
    let source = matmul_shader_source(tile);
    Ok(gpu.program(
        "matmul",
        &source,
        &[
            BindingKind::ReadOnly,
            BindingKind::ReadOnly,
            BindingKind::ReadWrite,
            BindingKind::Uniform,
        ],
    )?)
}

fn to_u32(value: usize) -> Result<u32, KernelError> {
    u32::try_from(value).map_err(|_| {
        KernelError::Backend(anyhow::anyhow!("dimension {value} exceeds the GPU index range"))
    })
}
