use std::path::PathBuf;

/// Conditions that stop a run before any record is written.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("no .{extension} files found in {}", directory.display())]
    NoModels {
        directory: PathBuf,
        extension: String,
    },

    #[error("no backends to test (engine reports: {})", format_available(available))]
    NoBackends { available: Vec<String> },

    #[error("cannot read model directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backend discovery failed: {0:#}")]
    Engine(anyhow::Error),
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}
