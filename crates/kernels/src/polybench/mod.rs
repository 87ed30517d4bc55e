//! Polyhedral benchmark kernels.

pub mod three_mm;

pub use three_mm::{ThreeMm, ThreeMmData, ThreeMmDims};
