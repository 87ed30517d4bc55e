//! CPU execution backend for kernelsuite: loop policies and the worker pool.

pub mod policy;
pub mod runtime;

pub use policy::*;
pub use runtime::*;
