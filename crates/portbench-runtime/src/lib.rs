pub mod catalog;
pub mod classify;
pub mod config;
pub mod directory;
pub mod error;
pub mod orchestrator;
pub mod probe;
pub mod recorder;
pub mod runner;
pub mod synth;

pub use catalog::discover;
pub use classify::*;
pub use config::*;
pub use directory::*;
pub use error::*;
pub use orchestrator::*;
pub use probe::*;
pub use recorder::*;
pub use runner::{Measurement, DEFAULT_RUNS};
pub use synth::*;
