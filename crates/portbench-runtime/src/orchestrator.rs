use std::path::Path;

use anyhow::Result;
use portbench_core::{Backend, InferenceEngine, LoadedModel, ModelArtifact};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{error, info, warn};

use crate::{
    catalog, classify, declared_shapes, resolved_shapes, runner, synthesize,
    BenchmarkRecord, CsvSink, DiscoveryError, HarnessConfig, ModelType, Outcome, ResultSink,
};

/// What a run will iterate over. Building it is the only fatal step.
#[derive(Clone, Debug)]
pub struct Plan {
    pub backends: Vec<Backend>,
    pub models: Vec<ModelArtifact>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub models: usize,
    pub backends: usize,
    pub ok: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn rows(&self) -> usize {
        self.ok + self.failed
    }

    fn count(&mut self, record: &BenchmarkRecord) {
        match record.outcome {
            Outcome::Ok { .. } => self.ok += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Drives model × backend iteration. One failing pair never stops the run.
pub struct Harness<'e, E: InferenceEngine> {
    engine: &'e E,
    config: HarnessConfig,
    rng: StdRng,
}

impl<'e, E: InferenceEngine> Harness<'e, E> {
    pub fn new(engine: &'e E, config: HarnessConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            engine,
            config,
            rng,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Backends first, then models. Either being empty halts the run.
    pub fn prepare(&self, directory: &Path) -> Result<Plan, DiscoveryError> {
        let backends = crate::directory::working_backends(self.engine, &self.config.backends)?;
        info!(
            engine = self.engine.name(),
            backends = %backends.iter().map(|b| b.name.as_str()).collect::<Vec<_>>().join(", "),
            "backends selected"
        );

        let models = catalog::discover(directory, &self.config.extension)?;
        info!(count = models.len(), directory = %directory.display(), "models found");
        for model in &models {
            info!(model = %model.file_name(), "model");
        }

        Ok(Plan { backends, models })
    }

    /// Discovery then execution, for callers whose sink already exists.
    pub fn run(&mut self, directory: &Path, sink: &mut dyn ResultSink) -> Result<RunSummary> {
        let plan = self.prepare(directory)?;
        self.execute(&plan, sink)
    }

    /// Full run into a CSV report at `output`. The file is created only after
    /// discovery succeeds, so a fatal run leaves nothing behind.
    pub fn write_report(&mut self, directory: &Path, output: &Path) -> Result<RunSummary> {
        let plan = self.prepare(directory)?;
        let mut sink = CsvSink::create(output)?;
        info!(report = %sink.path().display(), "report created");
        self.execute(&plan, &mut sink)
    }

    /// Only a sink failure aborts; every stage failure becomes a row.
    pub fn execute(&mut self, plan: &Plan, sink: &mut dyn ResultSink) -> Result<RunSummary> {
        let mut summary = RunSummary {
            models: plan.models.len(),
            backends: plan.backends.len(),
            ..RunSummary::default()
        };

        for artifact in &plan.models {
            self.benchmark_model(artifact, &plan.backends, sink, &mut summary)?;
        }

        info!(
            ok = summary.ok,
            failed = summary.failed,
            "benchmark finished"
        );
        Ok(summary)
    }

    fn benchmark_model(
        &mut self,
        artifact: &ModelArtifact,
        backends: &[Backend],
        sink: &mut dyn ResultSink,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let name = artifact.file_name();
        info!(model = %name, "benchmarking model");

        let model = match runner::load(self.engine, artifact) {
            Ok(model) => model,
            Err(err) => {
                error!(model = %name, error = %err.detail(), "failed to load model");
                let record = BenchmarkRecord::load_failure(name, err);
                sink.record(&record)?;
                summary.count(&record);
                return Ok(());
            }
        };

        let inputs = &model.spec().inputs;
        let original_shape = declared_shapes(inputs);
        let model_type = classify(artifact.path(), inputs, &self.config.classifier);
        info!(model = %name, shape = %original_shape, %model_type, "model inspected");

        for backend in backends {
            let (used_shape, outcome) = self.benchmark_pair(&model, backend, model_type);
            match &outcome {
                Outcome::Ok { latency_ms } => {
                    info!(model = %name, %backend, "{latency_ms:.2} ms/inference")
                }
                Outcome::Failed(err) => {
                    warn!(model = %name, %backend, status = %err.status(), error = %err.detail(), "benchmark failed")
                }
            }

            let record = BenchmarkRecord {
                model: name.clone(),
                backend: Some(backend.name.clone()),
                outcome,
                original_shape: Some(original_shape.clone()),
                used_shape,
                model_type: Some(model_type),
            };
            sink.record(&record)?;
            summary.count(&record);
        }
        Ok(())
    }

    fn benchmark_pair(
        &mut self,
        model: &E::Model,
        backend: &Backend,
        model_type: ModelType,
    ) -> (Option<String>, Outcome) {
        let input = match synthesize(
            &model.spec().inputs,
            backend,
            model_type,
            &self.config.synthesis,
            &mut self.rng,
        ) {
            Ok(input) => input,
            Err(err) => return (None, Outcome::Failed(err)),
        };
        let used_shape = resolved_shapes(input.shapes());

        info!(%backend, used_shape = %used_shape, "compiling");
        let outcome = match runner::run(self.engine, model, backend, &input, self.config.runs) {
            Ok(m) => Outcome::Ok {
                latency_ms: m.latency_ms,
            },
            Err(err) => Outcome::Failed(err),
        };
        (Some(used_shape), outcome)
    }
}
