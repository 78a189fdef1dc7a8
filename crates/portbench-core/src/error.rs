use std::fmt;

/// Outcome class of one (model, backend) attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    LoadError,
    ShapeError,
    CompileError,
    InferenceError,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::LoadError => "load-error",
            Status::ShapeError => "shape-error",
            Status::CompileError => "compile-error",
            Status::InferenceError => "inference-error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure at one benchmark stage. The message is engine-agnostic text.
///
/// The display prefixes are the ones the report has always carried.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("Error al cargar: {0}")]
    Load(String),
    #[error("Error generando tensor: {0}")]
    Shape(String),
    #[error("Error al compilar: {0}")]
    Compile(String),
    #[error("Error en inferencia: {0}")]
    Inference(String),
}

impl StageError {
    pub fn status(&self) -> Status {
        match self {
            StageError::Load(_) => Status::LoadError,
            StageError::Shape(_) => Status::ShapeError,
            StageError::Compile(_) => Status::CompileError,
            StageError::Inference(_) => Status::InferenceError,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            StageError::Load(d)
            | StageError::Shape(d)
            | StageError::Compile(d)
            | StageError::Inference(d) => d,
        }
    }

    pub fn load(err: &anyhow::Error) -> Self {
        StageError::Load(format!("{err:#}"))
    }

    pub fn compile(err: &anyhow::Error) -> Self {
        StageError::Compile(format!("{err:#}"))
    }

    pub fn inference(err: &anyhow::Error) -> Self {
        StageError::Inference(format!("{err:#}"))
    }
}
