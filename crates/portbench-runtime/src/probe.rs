use anyhow::{Context, Result};
use portbench_core::{
    Backend, BackendClass, CompiledModel, InferenceEngine, LoadedModel, ModelArtifact, OutputDesc,
    StageError,
};
use rand::Rng;

use crate::{classify, resolved_shapes, runner, synthesize, HarnessConfig, ModelType};

/// Result of a single smoke inference.
#[derive(Clone, Debug)]
pub struct ProbeReport {
    pub model: String,
    pub backend: Backend,
    pub model_type: ModelType,
    pub used_shape: String,
    pub outputs: Vec<OutputDesc>,
}

/// NPU if there is one, then GPU, then CPU.
pub fn preferred_backend(backends: &[Backend]) -> Option<&Backend> {
    [BackendClass::Npu, BackendClass::Gpu, BackendClass::Cpu]
        .iter()
        .find_map(|class| backends.iter().find(|b| b.class == *class))
}

/// Load, compile and run one model once on one backend.
pub fn probe<E: InferenceEngine, R: Rng + ?Sized>(
    engine: &E,
    artifact: &ModelArtifact,
    backend: Option<&str>,
    config: &HarnessConfig,
    rng: &mut R,
) -> Result<ProbeReport> {
    let available = engine.available().context("backend discovery failed")?;
    let backend = match backend {
        Some(name) => available
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(name))
            .with_context(|| {
                let names = available.iter().map(|b| b.name.as_str()).collect::<Vec<_>>();
                format!("backend {name} is not available (have: {})", names.join(", "))
            })?,
        None => preferred_backend(&available).context("engine reports no backends")?,
    }
    .clone();

    let model = runner::load(engine, artifact)?;
    let inputs = &model.spec().inputs;
    let model_type = classify(artifact.path(), inputs, &config.classifier);
    let input = synthesize(inputs, &backend, model_type, &config.synthesis, rng)?;

    let mut compiled = runner::compile(engine, &model, &backend)?;
    let outputs = compiled
        .infer(&input.tensors)
        .map_err(|e| StageError::inference(&e))?;

    Ok(ProbeReport {
        model: artifact.file_name(),
        backend,
        model_type,
        used_shape: resolved_shapes(input.shapes()),
        outputs,
    })
}
