//! GPU runtime on wgpu (Metal on macOS, Vulkan/DX12 elsewhere).
//!
//! Kernels drive the device through three steps: upload host data into
//! storage buffers, dispatch a compiled WGSL program any number of times, and
//! read results back after [`GpuContext::synchronize`]. All device data is
//! `f32`; host `f64` buffers are narrowed on upload and widened on read-back.

use crate::planner::GpuLaunchPlan;
use anyhow::{anyhow, Result};
use bytemuck::{cast_slice, Pod};
use pollster::block_on;
use std::fmt;
use std::sync::{mpsc, Arc};
use tracing::{debug, info};
use wgpu::util::DeviceExt;

pub use wgpu::Buffer as DeviceBuffer;

/// Information about the GPU device.
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    pub name: String,
    pub backend: String,
    pub max_storage_buffer_binding_size: u32,
}

/// How a program binding is declared in the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    ReadOnly,
    ReadWrite,
    Uniform,
}

/// A compiled compute pipeline plus the layout its bind groups must follow.
pub struct ComputeProgram {
    label: String,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    bindings: Vec<BindingKind>,
}

/// A program with concrete buffers attached, ready to dispatch repeatedly.
pub struct BoundProgram {
    program: Arc<ComputeProgram>,
    bind_group: wgpu::BindGroup,
}

pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    device_info: GpuDeviceInfo,
}

impl GpuContext {
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no suitable GPU adapter found"))?;

        let adapter_info = adapter.get_info();
        let limits = wgpu::Limits::default();

        let (device, queue) = block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("kernelsuite GPU device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits.clone(),
            },
            None,
        ))?;

        let device_info = GpuDeviceInfo {
            name: adapter_info.name.clone(),
            backend: format!("{:?}", adapter_info.backend),
            max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size,
        };
        info!(
            device = %device_info.name,
            backend = %device_info.backend,
            "gpu context ready"
        );

        Ok(Self {
            device,
            queue,
            device_info,
        })
    }


    /// Storage buffer initialised from host data, narrowed to `f32`.
    pub fn upload(&self, label: &str, data: &[f64]) -> Result<DeviceBuffer> {
        let narrowed: Vec<f32> = data.iter().map(|&v| v as f32).collect();
        self.check_binding_size(label, narrowed.len())?;
        // Zero-length bindings are invalid; keep one padding element.
        let contents: &[f32] = if narrowed.is_empty() { &[0.0] } else { &narrowed };
        Ok(self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: cast_slice(contents),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            }))
    }

    pub fn uniform<T: Pod>(&self, label: &str, value: &T) -> DeviceBuffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: cast_slice(std::slice::from_ref(value)),
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }

    /// Compile `source` (entry point `main`) against the given binding list.
    /// Binding `i` in the list is `@group(0) @binding(i)` in the shader.
    pub fn program(
        &self,
        label: &str,
        source: &str,
        bindings: &[BindingKind],
    ) -> Result<Arc<ComputeProgram>> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
            .iter()
            .enumerate()
            .map(|(idx, kind)| wgpu::BindGroupLayoutEntry {
                binding: idx as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: match kind {
                        BindingKind::ReadOnly => {
                            wgpu::BufferBindingType::Storage { read_only: true }
                        }
                        BindingKind::ReadWrite => {
                            wgpu::BufferBindingType::Storage { read_only: false }
                        }
                        BindingKind::Uniform => wgpu::BufferBindingType::Uniform,
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &entries,
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: "main",
            });

        if let Some(err) = block_on(self.device.pop_error_scope()) {
            return Err(anyhow!("failed to build GPU program `{label}`: {err}"));
        }
        debug!(program = label, bindings = bindings.len(), "compiled gpu program");

        Ok(Arc::new(ComputeProgram {
            label: label.to_string(),
            pipeline,
            layout,
            bindings: bindings.to_vec(),
        }))
    }

    pub fn bind(
        &self,
        program: &Arc<ComputeProgram>,
        buffers: &[&DeviceBuffer],
    ) -> Result<BoundProgram> {
        if buffers.len() != program.bindings.len() {
            return Err(anyhow!(
                "program `{}` expects {} bindings, got {}",
                program.label,
                program.bindings.len(),
                buffers.len()
            ));
        }
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(idx, buffer)| wgpu::BindGroupEntry {
                binding: idx as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.label),
            layout: &program.layout,
            entries: &entries,
        });
        Ok(BoundProgram {
            program: Arc::clone(program),
            bind_group,
        })
    }

    /// Queue one dispatch. Returns without waiting for the device.
    pub fn dispatch(&self, bound: &BoundProgram, plan: &GpuLaunchPlan) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&bound.program.label),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&bound.program.label),
                timestamp_writes: None,
            });
            pass.set_pipeline(&bound.program.pipeline);
            pass.set_bind_group(0, &bound.bind_group, &[]);
            let [x, y, z] = plan.workgroups;
            pass.dispatch_workgroups(x, y, z);
        }
        self.queue.submit(Some(encoder.finish()));
    }

    /// Block until every submitted dispatch has completed.
    pub fn synchronize(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Copy `len` elements of `buffer` back to the host, widened to `f64`.
    pub fn read_back(&self, buffer: &DeviceBuffer, len: usize) -> Result<Vec<f64>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let size = (len * std::mem::size_of::<f32>()) as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("read_back"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = sender.send(res);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| anyhow!("failed to receive GPU map signal"))??;

        let data = slice.get_mapped_range();
        let values: Vec<f64> = cast_slice::<u8, f32>(&data).iter().map(|&v| v as f64).collect();
        drop(data);
        staging.unmap();
        Ok(values)
    }

    fn check_binding_size(&self, label: &str, elements: usize) -> Result<()> {
        let bytes = elements.saturating_mul(std::mem::size_of::<f32>());
        if bytes > self.device_info.max_storage_buffer_binding_size as usize {
            return Err(anyhow!(
                "buffer `{label}` needs {bytes} bytes, above the {} byte binding limit",
                self.device_info.max_storage_buffer_binding_size
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuContext")
            .field("device", &self.device_info.name)
            .field("backend", &self.device_info.backend)
            .finish()
    }
}

/// Uniform block shared by the 1-D shaders: element count and the row stride
/// from [`GpuLaunchPlan`].
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LinearParams {
    pub len: u32,
    pub row_stride: u32,
    pub _pad: [u32; 2],
}

impl LinearParams {
    pub fn new(len: usize, plan: &GpuLaunchPlan) -> Self {
        Self {
            len: len as u32,
            row_stride: plan.row_stride,
            _pad: [0; 2],
        }
    }
}

/// Uniform block for the dense matrix-multiply shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MatmulParams {
    pub rows: u32,
    pub cols: u32,
    pub inner: u32,
    pub _pad: u32,
}

/// Element-wise shader over `inputs` read-only and `outputs` read-write
/// arrays. `body` is WGSL statements that may use `i` and the declared
/// array names.
pub fn elementwise_shader_source(
    inputs: &[&str],
    outputs: &[&str],
    body: &str,
    workgroup_size: u32,
) -> String {
    let mut src = String::new();
    src.push_str(
        "struct Params {\n  len: u32,\n  row_stride: u32,\n  _pad0: u32,\n  _pad1: u32,\n}\n",
    );
    let mut binding = 0;
    for name in inputs {
        src.push_str(&format!(
            "@group(0) @binding({binding})\nvar<storage, read> {name}: array<f32>;\n"
        ));
        binding += 1;
    }
    for name in outputs {
        src.push_str(&format!(
            "@group(0) @binding({binding})\nvar<storage, read_write> {name}: array<f32>;\n"
        ));
        binding += 1;
    }
    src.push_str(&format!(
        "@group(0) @binding({binding})\nvar<uniform> params: Params;\n\n"
    ));
    src.push_str(&format!(
        r#"@compute @workgroup_size({workgroup_size}, 1, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
  let i = gid.y * params.row_stride + gid.x;
  if (i >= params.len) {{
    return;
  }}
  {body}
}}
"#
    ));
    src
}

/// Row-major `out = lhs * rhs` with one invocation per output element.
pub fn matmul_shader_source(tile: u32) -> String {
    format!(
        r#"
struct Params {{
  rows: u32,
  cols: u32,
  inner: u32,
  _padding: u32,
}}

@group(0) @binding(0)
var<storage, read> lhs: array<f32>;
@group(0) @binding(1)
var<storage, read> rhs: array<f32>;
@group(0) @binding(2)
var<storage, read_write> out: array<f32>;
@group(0) @binding(3)
var<uniform> params: Params;

@compute @workgroup_size({tile}, {tile}, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
  let row = gid.x;
  let col = gid.y;
  if (row >= params.rows || col >= params.cols) {{
    return;
  }}

  var acc: f32 = 0.0;
  for (var k: u32 = 0u; k < params.inner; k = k + 1u) {{
    acc = acc + lhs[row * params.inner + k] * rhs[k * params.cols + col];
  }}
  out[row * params.cols + col] = acc;
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elementwise_source_declares_bindings_in_order() {
        let src = elementwise_shader_source(&["a", "b"], &["c"], "c[i] = a[i] + b[i];", 128);
        let a = src.find("@binding(0)\nvar<storage, read> a").expect("binding 0");
        let c = src.find("@binding(2)\nvar<storage, read_write> c").expect("binding 2");
        assert!(a < c);
        assert!(src.contains("@binding(3)\nvar<uniform> params"));
        assert!(src.contains("@workgroup_size(128, 1, 1)"));
        assert!(src.contains("c[i] = a[i] + b[i];"));
    }

    #[test]
    fn matmul_source_uses_tile_as_workgroup() {
        let src = matmul_shader_source(8);
        assert!(src.contains("@workgroup_size(8, 8, 1)"));
        assert!(src.contains("var<storage, read_write> out"));
    }

    #[test]
    fn params_are_uniform_sized() {
        assert_eq!(std::mem::size_of::<LinearParams>(), 16);
        assert_eq!(std::mem::size_of::<MatmulParams>(), 16);
    }
}
