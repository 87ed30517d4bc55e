//! Suite session and command-line front end for kernelsuite.

#[cfg(feature = "cli")]
pub mod cli;
pub mod options;
pub mod session;

#[cfg(feature = "cli")]
pub use cli::{run_cli, Cli, Command};
pub use options::SuiteOptions;
pub use session::SuiteSession;
