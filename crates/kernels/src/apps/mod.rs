//! Application-derived kernels.

pub mod mass3dpa;

pub use mass3dpa::{Mass3dpa, Mass3dpaData};
