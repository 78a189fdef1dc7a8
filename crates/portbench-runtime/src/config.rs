//! Harness configuration, loaded from TOML or built from defaults.
//!
//! # TOML Format
//! ```toml
//! extension = "onnx"
//! runs = 10
//! backends = ["CPU", "GPU", "NPU"]
//! seed = 42
//!
//! [classifier]
//! groups = [
//!   { model_type = "text", keywords = ["gpt", "bert"] },
//! ]
//!
//! [synthesis]
//! mask_keywords = ["mask"]
//! segment_keywords = ["token_type", "segment"]
//! token_upper = 1000
//! max_elements = 268435456
//!
//! [[synthesis.overrides]]
//! backend_class = "npu"
//! model_type = "text"
//! ranks = [1, 2]
//! shape = [1, 128]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{KeywordTable, SynthesisRules, DEFAULT_RUNS};

/// File name of the report written next to the models by default.
pub const DEFAULT_REPORT: &str = "benchmark_results.csv";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialise error: {0}")]
    Serialise(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Model file extension, without the dot.
    pub extension: String,
    /// Timed calls per (model, backend).
    pub runs: usize,
    /// Backend names or class labels to test; `all` disables filtering.
    pub backends: Vec<String>,
    /// Seed for synthesized inputs. Unset means a fresh seed per run.
    pub seed: Option<u64>,
    pub classifier: KeywordTable,
    pub synthesis: SynthesisRules,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            extension: "onnx".to_string(),
            runs: DEFAULT_RUNS,
            backends: vec!["CPU".into(), "GPU".into(), "NPU".into()],
            seed: None,
            classifier: KeywordTable::default(),
            synthesis: SynthesisRules::default(),
        }
    }
}

impl HarnessConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runs == 0 {
            return Err(ConfigError::Invalid("runs must be at least 1".into()));
        }
        if self.extension.is_empty() {
            return Err(ConfigError::Invalid("extension must not be empty".into()));
        }
        if self.synthesis.token_upper <= 0 {
            return Err(ConfigError::Invalid("token_upper must be positive".into()));
        }
        if self.synthesis.max_elements == 0 {
            return Err(ConfigError::Invalid("max_elements must be at least 1".into()));
        }
        for rule in &self.synthesis.overrides {
            if rule.shape.is_empty() || rule.shape.contains(&0) {
                return Err(ConfigError::Invalid(format!(
                    "override for {} {} has unusable shape {:?}",
                    rule.backend_class.label(),
                    rule.model_type,
                    rule.shape
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelType;
    use portbench_core::BackendClass;

    #[test]
    fn test_default() {
        let c = HarnessConfig::default();
        assert_eq!(c.runs, 10);
        assert_eq!(c.extension, "onnx");
        assert_eq!(c.backends, vec!["CPU", "GPU", "NPU"]);
        assert_eq!(c.synthesis.overrides.len(), 1);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
runs = 3
backends = ["all"]
seed = 7

[synthesis]
token_upper = 30522
"#;
        let c = HarnessConfig::from_toml(toml).unwrap();
        assert_eq!(c.runs, 3);
        assert_eq!(c.backends, vec!["all"]);
        assert_eq!(c.seed, Some(7));
        assert_eq!(c.synthesis.token_upper, 30522);
        // Untouched sections keep their defaults.
        assert_eq!(c.synthesis.mask_keywords, vec!["mask"]);
        assert_eq!(c.classifier, KeywordTable::default());
    }

    #[test]
    fn test_custom_override_table() {
        let toml = r#"
[[synthesis.overrides]]
backend_class = "gpu"
model_type = "image"
ranks = [4]
shape = [1, 3, 224, 224]
"#;
        let c = HarnessConfig::from_toml(toml).unwrap();
        let rule = &c.synthesis.overrides[0];
        assert_eq!(rule.backend_class, BackendClass::Gpu);
        assert_eq!(rule.model_type, ModelType::Image);
        assert_eq!(
            c.synthesis
                .resolve_shape(&[None; 4], BackendClass::Gpu, ModelType::Image)
                .dims(),
            &[1, 3, 224, 224]
        );
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = HarnessConfig::default();
        let back = HarnessConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_rejects_zero_runs() {
        assert!(matches!(
            HarnessConfig::from_toml("runs = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_element_limit() {
        assert_eq!(HarnessConfig::default().synthesis.max_elements, 1 << 28);
        let c = HarnessConfig::from_toml("[synthesis]\nmax_elements = 1024").unwrap();
        assert_eq!(c.synthesis.max_elements, 1024);
        assert!(matches!(
            HarnessConfig::from_toml("[synthesis]\nmax_elements = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_zero_dim_override() {
        let toml = r#"
[[synthesis.overrides]]
backend_class = "npu"
model_type = "text"
ranks = [2]
shape = [1, 0]
"#;
        assert!(HarnessConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_unknown_model_type_is_parse_error() {
        let toml = r#"
[classifier]
groups = [{ model_type = "video", keywords = ["x3d"] }]
"#;
        assert!(matches!(
            HarnessConfig::from_toml(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = HarnessConfig::from_file(Path::new("/nonexistent/portbench.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
