use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "portbench",
    version,
    about = "Benchmark every model in a directory on every available backend"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Benchmark all models in a directory and write a CSV report
    Run {
        /// Directory holding the model files
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Report path (default: <DIR>/benchmark_results.csv)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Backend names or classes to test, comma separated; `all` tests everything
        #[arg(long, value_delimiter = ',')]
        backends: Option<Vec<String>>,

        /// Timed inferences per model and backend
        #[arg(long)]
        runs: Option<usize>,

        /// Seed for synthesized inputs
        #[arg(long)]
        seed: Option<u64>,

        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log level (RUST_LOG)
        #[arg(long, default_value = "info")]
        log: String,
    },

    /// List the backends the engine can compile for
    Backends {
        /// Log level (RUST_LOG)
        #[arg(long, default_value = "warn")]
        log: String,
    },

    /// Run one model once and print its input and output shapes
    Probe {
        /// Path to the model file
        model: PathBuf,

        /// Backend name (default: NPU, then GPU, then CPU)
        #[arg(long)]
        backend: Option<String>,

        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log level (RUST_LOG)
        #[arg(long, default_value = "info")]
        log: String,
    },
}
