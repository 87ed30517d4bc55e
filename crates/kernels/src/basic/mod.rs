//! Basic kernels: short streaming loops and compactions.

pub mod indexlist;
pub mod init3;
pub mod muladdsub;
pub mod streams;

pub use indexlist::{IndexList, IndexListData};
pub use init3::Init3;
pub use muladdsub::MulAddSub;
pub use streams::StreamData;
