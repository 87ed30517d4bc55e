//! CLI wiring for the kernelsuite binary.

use crate::options::SuiteOptions;
use crate::session::SuiteSession;
use anyhow::Result;
use clap::{Parser, Subcommand};
use kernelsuite_harness::SuiteReport;
use kernelsuite_kernels::TuningIndex;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kernelsuite", about = "Run numerical kernels under every execution variant")]
pub struct Cli {
    /// Worker threads for threaded variants.
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the selected kernels and print the report.
    Run {
        /// Load options from a JSON file; flags below override it.
        #[arg(long)]
        options: Option<PathBuf>,
        #[arg(long)]
        size: Option<String>,
        #[arg(long, value_delimiter = ',')]
        kernels: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        exclude_kernels: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        variants: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        exclude_variants: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        tunings: Vec<String>,
        /// Repetitions per run; 0 disables timing.
        #[arg(long)]
        reps: Option<usize>,
        #[arg(long)]
        reps_factor: Option<f64>,
        #[arg(long)]
        passes: Option<usize>,
        /// Reference variant for checksum validation and speedup.
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        reference_tuning: Option<usize>,
        #[arg(long, default_value_t = false)]
        history: bool,
        #[arg(long, default_value_t = false)]
        no_gpu: bool,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        baseline: Option<PathBuf>,
    },
    /// List kernels with the variants and tunings available on this host.
    List,
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let Cli { threads, command } = cli;

    match command {
        Command::Run {
            options,
            size,
            kernels,
            exclude_kernels,
            variants,
            exclude_variants,
            tunings,
            reps,
            reps_factor,
            passes,
            reference,
            reference_tuning,
            history,
            no_gpu,
            output,
            baseline,
        } => {
            let mut suite_options = match options {
                Some(path) => SuiteOptions::load(path)?,
                None => SuiteOptions::default(),
            };
            if let Some(size) = size {
                suite_options.size = size;
            }
            let lists = [
                (kernels, &mut suite_options.kernels),
                (exclude_kernels, &mut suite_options.exclude_kernels),
                (variants, &mut suite_options.variants),
                (exclude_variants, &mut suite_options.exclude_variants),
                (tunings, &mut suite_options.tunings),
            ];
            for (values, slot) in lists {
                if !values.is_empty() {
                    *slot = values;
                }
            }
            if reps.is_some() {
                suite_options.reps = reps;
            }
            if let Some(factor) = reps_factor {
                suite_options.reps_factor = factor;
            }
            if let Some(passes) = passes {
                suite_options.passes = passes;
            }
            if threads.is_some() {
                suite_options.threads = threads;
            }
            if let Some(reference) = reference {
                suite_options.reference_variant = reference;
            }
            if let Some(tuning) = reference_tuning {
                suite_options.reference_tuning = tuning;
            }
            suite_options.history |= history;
            if no_gpu {
                suite_options.gpu = false;
            }

            let session = SuiteSession::new(suite_options)?;
            let report = session.run_report()?;

            println!(
                "size={}, rows={}, discrepancies={}, generated_at={}",
                report.size_class,
                report.rows.len(),
                report.discrepancies.len(),
                report.generated_at_unix_ms
            );
            print!("{}", report.summary_table());

            if let Some(path) = baseline {
                if path.exists() {
                    let baseline_report = SuiteReport::load(&path)?;
                    for (label, delta) in report.diff(&baseline_report) {
                        match delta.ops_per_s_delta {
                            Some(ops) => println!(
                                "Δ {}: elapsed_s={:+.6} Mops/s={:+.3}",
                                label,
                                delta.elapsed_s_delta,
                                ops / 1.0e6
                            ),
                            None => {
                                println!("Δ {}: elapsed_s={:+.6}", label, delta.elapsed_s_delta)
                            }
                        }
                    }
                } else {
                    info!(path = %path.display(), "baseline report not found; skipping diff");
                }
            }

            if let Some(path) = output {
                report.save(&path)?;
                info!(path = %path.display(), "report written");
            }
        }
        Command::List => {
            let options = SuiteOptions {
                threads,
                ..SuiteOptions::default()
            };
            let session = SuiteSession::new(options)?;
            for kernel in session.registry().kernels() {
                println!("{} ({})", kernel.name(), kernel.info().group);
                for variant in kernel.variants() {
                    let tunings: Vec<String> = kernel
                        .tunings(variant)
                        .iter()
                        .enumerate()
                        .map(|(index, name)| format!("{}:{}", TuningIndex(index), name))
                        .collect();
                    println!("  {:<15} {}", variant.name(), tunings.join(" "));
                }
            }
        }
    }
    Ok(())
}
