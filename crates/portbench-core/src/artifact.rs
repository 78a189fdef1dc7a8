use std::path::{Path, PathBuf};

/// A serialized model on disk. Identity is the path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelArtifact {
    path: PathBuf,
}

impl ModelArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used as the model identifier in reports.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
