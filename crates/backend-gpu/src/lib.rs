//! wgpu compute backend for accelerator variants.

pub mod planner;
pub mod runtime;

pub use planner::*;
pub use runtime::*;
