use std::path::Path;

use portbench_core::ModelArtifact;

use crate::DiscoveryError;

/// Model files directly under `directory` with the given extension, ordered
/// by file name.
pub fn discover(directory: &Path, extension: &str) -> Result<Vec<ModelArtifact>, DiscoveryError> {
    let io_err = |source| DiscoveryError::Io {
        path: directory.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(directory).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        return Err(DiscoveryError::NoModels {
            directory: directory.to_path_buf(),
            extension: extension.to_string(),
        });
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths.into_iter().map(ModelArtifact::new).collect())
}
