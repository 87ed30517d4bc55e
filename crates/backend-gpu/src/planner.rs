//! GPU launch planning: workgroup counts for 1-D and 2-D index spaces.

use anyhow::{bail, ensure, Result};

/// Per-dimension dispatch limit guaranteed by `wgpu::Limits::default()`.
pub const MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuLaunchPlan {
    pub workgroups: [u32; 3],
    /// Invocations per row of the dispatch grid. 1-D kernels fold the
    /// `y` workgroup index into their linear index with this stride.
    pub row_stride: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GpuPlanner;

impl GpuPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Cover `len` elements with workgroups of `block` invocations, folding
    /// into a second grid dimension once the first one is exhausted.
    pub fn plan_linear(&self, len: usize, block: u32) -> Result<GpuLaunchPlan> {
        ensure!(block > 0, "workgroup size must be positive");
        let len = u32::try_from(len)
            .map_err(|_| anyhow::anyhow!("{len} elements exceed the u32 GPU index space"))?;
        let groups = len.div_ceil(block).max(1);
        let groups_x = groups.min(MAX_WORKGROUPS_PER_DIM);
        let groups_y = groups.div_ceil(groups_x);
        if groups_y > MAX_WORKGROUPS_PER_DIM {
            bail!("{len} elements need {groups} workgroups of {block}, above the dispatch limit");
        }
        Ok(GpuLaunchPlan {
            workgroups: [groups_x, groups_y, 1],
            row_stride: groups_x * block,
        })
    }

    /// Cover a `rows x cols` output with square `tile x tile` workgroups.
    pub fn plan_tiled(&self, rows: usize, cols: usize, tile: u32) -> Result<GpuLaunchPlan> {
        ensure!(tile > 0, "tile size must be positive");
        let groups_x = u32::try_from(rows.div_ceil(tile as usize))?.max(1);
        let groups_y = u32::try_from(cols.div_ceil(tile as usize))?.max(1);
        if groups_x > MAX_WORKGROUPS_PER_DIM || groups_y > MAX_WORKGROUPS_PER_DIM {
            bail!(
                "{rows}x{cols} output needs more than {MAX_WORKGROUPS_PER_DIM} tiles per dimension"
            );
        }
        Ok(GpuLaunchPlan {
            workgroups: [groups_x, groups_y, 1],
            row_stride: groups_x * tile,
        })
    }
}
