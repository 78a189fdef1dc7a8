use portbench_core::{Backend, InferenceEngine};

use crate::DiscoveryError;

/// Allow-list keyword that disables backend filtering.
pub const ALL_BACKENDS: &str = "all";

/// Keeps backends whose name or class label is on the allow-list.
pub fn filter_backends(available: &[Backend], allow: &[String]) -> Vec<Backend> {
    if allow.iter().any(|a| a.eq_ignore_ascii_case(ALL_BACKENDS)) {
        return available.to_vec();
    }
    available
        .iter()
        .filter(|b| {
            allow
                .iter()
                .any(|a| a.eq_ignore_ascii_case(&b.name) || a.eq_ignore_ascii_case(b.class.label()))
        })
        .cloned()
        .collect()
}

/// The working backend list for a run. Empty is fatal.
pub fn working_backends<E: InferenceEngine>(
    engine: &E,
    allow: &[String],
) -> Result<Vec<Backend>, DiscoveryError> {
    let available = engine.available().map_err(DiscoveryError::Engine)?;
    let working = filter_backends(&available, allow);
    if working.is_empty() {
        return Err(DiscoveryError::NoBackends {
            available: available.iter().map(|b| b.name.clone()).collect(),
        });
    }
    Ok(working)
}
