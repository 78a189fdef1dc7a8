use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{IOName, ModelArtifact, ModelSpec, OutputDesc, Tensor};

/// Coarse hardware family of a backend. Allow-lists and shape overrides
/// match on this rather than on vendor provider names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendClass {
    Cpu,
    Gpu,
    Npu,
}

impl BackendClass {
    pub fn label(self) -> &'static str {
        match self {
            BackendClass::Cpu => "CPU",
            BackendClass::Gpu => "GPU",
            BackendClass::Npu => "NPU",
        }
    }
}

/// A compute target the engine can compile for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Backend {
    pub name: String,
    pub class: BackendClass,
}

impl Backend {
    pub fn new(name: impl Into<String>, class: BackendClass) -> Self {
        Self {
            name: name.into(),
            class,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The inference engine the harness benchmarks through.
///
/// Loading is shared by every backend of a model; compilation is per backend.
pub trait InferenceEngine {
    type Model: LoadedModel;
    type Compiled: CompiledModel;

    fn name(&self) -> &'static str;
    fn available(&self) -> Result<Vec<Backend>>;
    fn load(&self, artifact: &ModelArtifact) -> Result<Self::Model>;
    fn compile(&self, model: &Self::Model, backend: &Backend) -> Result<Self::Compiled>;
}

pub trait LoadedModel {
    fn spec(&self) -> &ModelSpec;
}

pub trait CompiledModel {
    /// Inputs are passed by reference so one synthesized set serves every run.
    fn infer(&mut self, inputs: &[(IOName, Tensor)]) -> Result<Vec<OutputDesc>>;
}
