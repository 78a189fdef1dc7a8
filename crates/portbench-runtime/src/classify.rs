use std::fmt;
use std::path::Path;

use portbench_core::{ElementKind, TensorSpec};
use serde::{Deserialize, Serialize};

/// Expected input semantics of a model. Only picks a synthesis strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Image,
    Audio,
    Text,
    Vector,
    Unknown,
}

impl ModelType {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::Image => "image",
            ModelType::Audio => "audio",
            ModelType::Text => "text",
            ModelType::Vector => "vector",
            ModelType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub model_type: ModelType,
    pub keywords: Vec<String>,
}

/// Ordered filename keyword groups; the first group with a hit wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeywordTable {
    pub groups: Vec<KeywordGroup>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        let group = |model_type, words: &[&str]| KeywordGroup {
            model_type,
            keywords: words.iter().map(|w| w.to_string()).collect(),
        };
        Self {
            groups: vec![
                group(ModelType::Text, &["gpt", "bert", "roberta", "distilbert", "t5"]),
                group(
                    ModelType::Audio,
                    &["whisper", "wav2vec", "deepspeech", "asr", "audio"],
                ),
                group(
                    ModelType::Image,
                    &[
                        "resnet",
                        "mobilenet",
                        "inception",
                        "efficientnet",
                        "densenet",
                        "vgg",
                        "alexnet",
                        "squeezenet",
                    ],
                ),
            ],
        }
    }
}

impl KeywordTable {
    pub fn match_name(&self, file_name: &str) -> Option<ModelType> {
        let name = file_name.to_lowercase();
        self.groups
            .iter()
            .find(|g| g.keywords.iter().any(|k| name.contains(&k.to_lowercase())))
            .map(|g| g.model_type)
    }
}

/// Filename keywords first, then the rank of the primary input.
pub fn classify(path: &Path, inputs: &[TensorSpec], keywords: &KeywordTable) -> ModelType {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    if let Some(model_type) = keywords.match_name(&file_name) {
        return model_type;
    }
    classify_by_shape(inputs.first())
}

pub fn classify_by_shape(primary: Option<&TensorSpec>) -> ModelType {
    let Some(primary) = primary else {
        return ModelType::Unknown;
    };
    match primary.dims.len() {
        4 => ModelType::Image,
        3 => ModelType::Audio,
        1 | 2 if primary.dtype.kind() == ElementKind::Integer => ModelType::Text,
        1 | 2 => ModelType::Vector,
        _ => ModelType::Unknown,
    }
}
