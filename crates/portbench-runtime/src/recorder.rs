use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use portbench_core::{Shape, StageError, Status, TensorSpec};
use serde::Serialize;

use crate::ModelType;

pub const NOT_AVAILABLE: &str = "N/A";

pub const CSV_HEADER: [&str; 7] = [
    "model",
    "backend",
    "latency_ms",
    "status",
    "original_shape",
    "used_shape",
    "model_type",
];

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Ok { latency_ms: f64 },
    Failed(StageError),
}

/// One report row. `backend` is `None` when the model failed before any
/// backend was tried.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkRecord {
    pub model: String,
    pub backend: Option<String>,
    pub outcome: Outcome,
    pub original_shape: Option<String>,
    pub used_shape: Option<String>,
    pub model_type: Option<ModelType>,
}

impl BenchmarkRecord {
    pub fn load_failure(model: impl Into<String>, err: StageError) -> Self {
        Self {
            model: model.into(),
            backend: None,
            outcome: Outcome::Failed(err),
            original_shape: None,
            used_shape: None,
            model_type: None,
        }
    }

    pub fn status(&self) -> Status {
        match &self.outcome {
            Outcome::Ok { .. } => Status::Ok,
            Outcome::Failed(err) => err.status(),
        }
    }

    pub fn latency_ms(&self) -> Option<f64> {
        match self.outcome {
            Outcome::Ok { latency_ms } => Some(latency_ms),
            Outcome::Failed(_) => None,
        }
    }

    /// Status column text: `OK` or the stage message.
    pub fn status_text(&self) -> String {
        match &self.outcome {
            Outcome::Ok { .. } => Status::Ok.to_string(),
            Outcome::Failed(err) => err.to_string(),
        }
    }

    pub fn to_row(&self) -> CsvRow {
        let or_na = |v: Option<String>| v.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        CsvRow {
            model: self.model.clone(),
            backend: or_na(self.backend.clone()),
            latency_ms: or_na(self.latency_ms().map(|ms| format!("{ms:.2}"))),
            status: self.status_text(),
            original_shape: or_na(self.original_shape.clone()),
            used_shape: or_na(self.used_shape.clone()),
            model_type: or_na(self.model_type.map(|t| t.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    pub model: String,
    pub backend: String,
    pub latency_ms: String,
    pub status: String,
    pub original_shape: String,
    pub used_shape: String,
    pub model_type: String,
}

/// Single-input models render as a bare list, multi-input models as
/// `name: [..]; name: [..]`.
pub fn format_shapes<'a>(shapes: impl IntoIterator<Item = (&'a str, String)>) -> String {
    let shapes = shapes.into_iter().collect::<Vec<_>>();
    match shapes.as_slice() {
        [] => "[]".to_string(),
        [(_, shape)] => shape.clone(),
        many => many
            .iter()
            .map(|(name, shape)| format!("{name}: {shape}"))
            .collect::<Vec<_>>()
            .join("; "),
    }
}

pub fn declared_shapes(inputs: &[TensorSpec]) -> String {
    format_shapes(inputs.iter().map(|s| (s.name.0.as_str(), s.declared_shape())))
}

pub fn resolved_shapes<'a>(shapes: impl IntoIterator<Item = (&'a str, &'a Shape)>) -> String {
    format_shapes(shapes.into_iter().map(|(name, shape)| (name, shape.to_string())))
}

/// Where records go. Implementations must not hold rows back.
pub trait ResultSink {
    fn record(&mut self, record: &BenchmarkRecord) -> Result<()>;
}

impl ResultSink for Vec<BenchmarkRecord> {
    fn record(&mut self, record: &BenchmarkRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// CSV report file, truncated on open and flushed after every row.
pub struct CsvSink {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl CsvSink {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer
            .write_record(CSV_HEADER)
            .context("failed to write report header")?;
        writer.flush().context("failed to flush report")?;
        Ok(Self { writer, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for CsvSink {
    fn record(&mut self, record: &BenchmarkRecord) -> Result<()> {
        self.writer
            .serialize(record.to_row())
            .with_context(|| format!("failed to write row to {}", self.path.display()))?;
        self.writer
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}
