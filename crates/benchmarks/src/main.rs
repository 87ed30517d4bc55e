//! Benchmark suite executable for kernelsuite.

use anyhow::Result;
use clap::Parser;
use kernelsuite_suite::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}
