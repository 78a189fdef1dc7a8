mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use portbench_backend_ort::OrtEngine;
use portbench_core::{InferenceEngine, ModelArtifact};
use portbench_runtime::{Harness, HarnessConfig, RunSummary, DEFAULT_REPORT};
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            dir,
            output,
            backends,
            runs,
            seed,
            config,
            log,
        } => {
            init_tracing(&log);
            let mut config = load_config(config.as_deref())?;
            if let Some(backends) = backends {
                config.backends = backends;
            }
            if let Some(runs) = runs {
                config.runs = runs;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            config.validate()?;

            let output = output.unwrap_or_else(|| dir.join(DEFAULT_REPORT));
            run(&dir, output, config)
        }
        Command::Backends { log } => {
            init_tracing(&log);
            list_backends()
        }
        Command::Probe {
            model,
            backend,
            config,
            log,
        } => {
            init_tracing(&log);
            let config = load_config(config.as_deref())?;
            probe(model, backend.as_deref(), &config)
        }
    }
}

/// RUST_LOG wins over `--log` when set.
fn init_tracing(log: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    match path {
        Some(path) => {
            let config = HarnessConfig::from_file(path)?;
            info!(config = %path.display(), "config loaded");
            Ok(config)
        }
        None => Ok(HarnessConfig::default()),
    }
}

fn run(dir: &Path, output: PathBuf, config: HarnessConfig) -> Result<()> {
    let engine = OrtEngine::new();
    let summary = Harness::new(&engine, config).write_report(dir, &output)?;

    println!("Resultados guardados en: {}", output.display());
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} models x {} backends: {} rows, {} ok, {} failed",
        summary.models,
        summary.backends,
        summary.rows(),
        summary.ok,
        summary.failed
    );
}

fn list_backends() -> Result<()> {
    let engine = OrtEngine::new();
    let backends = engine
        .available()
        .with_context(|| format!("{} backend discovery failed", engine.name()))?;
    if backends.is_empty() {
        println!("no backends available");
    }
    for backend in backends {
        println!("{:<16} {}", backend.name, backend.class.label());
    }
    Ok(())
}

fn probe(model: PathBuf, backend: Option<&str>, config: &HarnessConfig) -> Result<()> {
    let engine = OrtEngine::new();
    let artifact = ModelArtifact::new(model);
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let report = portbench_runtime::probe(&engine, &artifact, backend, config, &mut rng)?;

    println!("model:      {}", report.model);
    println!("backend:    {}", report.backend);
    println!("type:       {}", report.model_type);
    println!("input:      {}", report.used_shape);
    for out in &report.outputs {
        println!("output:     {} {} {}", out.name, out.dtype, out.shape);
    }
    Ok(())
}
