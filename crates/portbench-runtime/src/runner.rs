//! Stage-by-stage execution of one benchmark attempt.
//!
//! `load` → `compile` → [`warm_up`] → [`WarmedUp::measure`]. Every stage is
//! its own fault boundary and reports a [`StageError`] of its own kind, so
//! the orchestrator never sees engine error types.

use std::time::Instant;

use portbench_core::{
    Backend, CompiledModel, InferenceEngine, ModelArtifact, StageError,
};
use tracing::debug;

use crate::SynthesizedInput;

/// Timed calls per measurement.
pub const DEFAULT_RUNS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    /// Mean wall-clock latency of one call.
    pub latency_ms: f64,
    pub runs: usize,
}

pub fn load<E: InferenceEngine>(
    engine: &E,
    artifact: &ModelArtifact,
) -> Result<E::Model, StageError> {
    engine.load(artifact).map_err(|e| StageError::load(&e))
}

pub fn compile<E: InferenceEngine>(
    engine: &E,
    model: &E::Model,
    backend: &Backend,
) -> Result<E::Compiled, StageError> {
    engine
        .compile(model, backend)
        .map_err(|e| StageError::compile(&e))
}

/// A compiled model that has absorbed its first-call cost.
pub struct WarmedUp<'a, C: CompiledModel> {
    compiled: &'a mut C,
    input: &'a SynthesizedInput,
}

/// Exactly one untimed call.
pub fn warm_up<'a, C: CompiledModel>(
    compiled: &'a mut C,
    input: &'a SynthesizedInput,
) -> Result<WarmedUp<'a, C>, StageError> {
    compiled
        .infer(&input.tensors)
        .map_err(|e| StageError::inference(&e))?;
    Ok(WarmedUp { compiled, input })
}

impl<C: CompiledModel> WarmedUp<'_, C> {
    /// Wall-clock around the whole batch, divided by the call count.
    pub fn measure(self, runs: usize) -> Result<Measurement, StageError> {
        let runs = runs.max(1);
        let start = Instant::now();
        for _ in 0..runs {
            self.compiled
                .infer(&self.input.tensors)
                .map_err(|e| StageError::inference(&e))?;
        }
        let elapsed = start.elapsed();

        let latency_ms = elapsed.as_secs_f64() * 1000.0 / runs as f64;
        debug!(runs, total_ms = elapsed.as_secs_f64() * 1000.0, "measured");
        Ok(Measurement { latency_ms, runs })
    }
}

/// Compile for `backend`, warm up, then time `runs` calls.
pub fn run<E: InferenceEngine>(
    engine: &E,
    model: &E::Model,
    backend: &Backend,
    input: &SynthesizedInput,
    runs: usize,
) -> Result<Measurement, StageError> {
    let mut compiled = compile(engine, model, backend)?;
    warm_up(&mut compiled, input)?.measure(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use portbench_core::{IOName, OutputDesc, Tensor};

    struct Counting {
        calls: usize,
        fail_on: Option<usize>,
    }

    impl CompiledModel for Counting {
        fn infer(&mut self, _inputs: &[(IOName, Tensor)]) -> Result<Vec<OutputDesc>> {
            self.calls += 1;
            if Some(self.calls) == self.fail_on {
                bail!("kernel crashed on call {}", self.calls);
            }
            Ok(Vec::new())
        }
    }

    fn empty_input() -> SynthesizedInput {
        SynthesizedInput { tensors: Vec::new() }
    }

    #[test]
    fn one_warmup_then_timed_runs() {
        let mut model = Counting { calls: 0, fail_on: None };
        let input = empty_input();
        let m = warm_up(&mut model, &input).unwrap().measure(DEFAULT_RUNS).unwrap();
        assert_eq!(m.runs, 10);
        assert!(m.latency_ms >= 0.0);
        assert_eq!(model.calls, 11);
    }

    #[test]
    fn warmup_failure_is_inference_error() {
        let mut model = Counting { calls: 0, fail_on: Some(1) };
        let input = empty_input();
        let err = warm_up(&mut model, &input).err().unwrap();
        assert!(matches!(err, StageError::Inference(_)));
        assert!(err.detail().contains("call 1"));
    }

    #[test]
    fn timed_failure_stops_measurement() {
        let mut model = Counting { calls: 0, fail_on: Some(4) };
        let input = empty_input();
        let err = warm_up(&mut model, &input).unwrap().measure(10).unwrap_err();
        assert_eq!(err.status(), portbench_core::Status::InferenceError);
        assert_eq!(model.calls, 4);
    }
}
