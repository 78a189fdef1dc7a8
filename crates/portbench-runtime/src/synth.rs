use portbench_core::{
    Backend, BackendClass, DType, ElementKind, IOName, Shape, StageError, Tensor, TensorSpec,
};
use half::f16;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ModelType;

/// 2^28 elements: 1 GiB of f32, 2 GiB of i64.
pub const DEFAULT_MAX_ELEMENTS: usize = 1 << 28;

/// Replaces the resolved shape of a slot for one (backend class, model type).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeOverride {
    pub backend_class: BackendClass,
    pub model_type: ModelType,
    /// Declared ranks the override applies to.
    pub ranks: Vec<usize>,
    pub shape: Vec<usize>,
}

impl ShapeOverride {
    fn applies(&self, class: BackendClass, model_type: ModelType, rank: usize) -> bool {
        self.backend_class == class && self.model_type == model_type && self.ranks.contains(&rank)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisRules {
    /// Integer slots whose name contains one of these are filled with ones.
    pub mask_keywords: Vec<String>,
    /// Integer slots whose name contains one of these are filled with zeros.
    pub segment_keywords: Vec<String>,
    /// Exclusive upper bound for random token ids.
    pub token_upper: i32,
    /// Largest element count synthesized for one input slot.
    pub max_elements: usize,
    pub overrides: Vec<ShapeOverride>,
}

impl Default for SynthesisRules {
    fn default() -> Self {
        Self {
            mask_keywords: vec!["mask".into()],
            segment_keywords: vec!["token_type".into(), "segment".into()],
            token_upper: 1000,
            max_elements: DEFAULT_MAX_ELEMENTS,
            // NPU compilers want a static sequence length.
            overrides: vec![ShapeOverride {
                backend_class: BackendClass::Npu,
                model_type: ModelType::Text,
                ranks: vec![1, 2],
                shape: vec![1, 128],
            }],
        }
    }
}

impl SynthesisRules {
    /// Unbound and zero dims become 1, then the first matching override wins.
    pub fn resolve_shape(
        &self,
        dims: &[Option<usize>],
        class: BackendClass,
        model_type: ModelType,
    ) -> Shape {
        if let Some(rule) = self
            .overrides
            .iter()
            .find(|rule| rule.applies(class, model_type, dims.len()))
        {
            return Shape::from_slice(&rule.shape);
        }
        let resolved = dims
            .iter()
            .map(|d| d.filter(|d| *d > 0).unwrap_or(1))
            .collect::<Vec<_>>();
        Shape::from_slice(&resolved)
    }

    fn integer_fill(&self, name: &str) -> Option<i64> {
        let name = name.to_lowercase();
        let hit = |words: &[String]| words.iter().any(|w| name.contains(&w.to_lowercase()));
        if hit(&self.mask_keywords) {
            Some(1)
        } else if hit(&self.segment_keywords) {
            Some(0)
        } else {
            None
        }
    }
}

/// Concrete tensors for every input slot of one (model, backend) pair.
#[derive(Clone, Debug)]
pub struct SynthesizedInput {
    pub tensors: Vec<(IOName, Tensor)>,
}

impl SynthesizedInput {
    pub fn shapes(&self) -> impl Iterator<Item = (&str, &Shape)> {
        self.tensors.iter().map(|(name, t)| (name.0.as_str(), &t.shape))
    }
}

pub fn synthesize<R: Rng + ?Sized>(
    inputs: &[TensorSpec],
    backend: &Backend,
    model_type: ModelType,
    rules: &SynthesisRules,
    rng: &mut R,
) -> Result<SynthesizedInput, StageError> {
    let mut tensors = Vec::with_capacity(inputs.len());
    for slot in inputs {
        let shape = rules.resolve_shape(&slot.dims, backend.class, model_type);
        let tensor = synthesize_slot(slot, shape, rules, rng)?;
        tensors.push((slot.name.clone(), tensor));
    }
    Ok(SynthesizedInput { tensors })
}

fn synthesize_slot<R: Rng + ?Sized>(
    slot: &TensorSpec,
    shape: Shape,
    rules: &SynthesisRules,
    rng: &mut R,
) -> Result<Tensor, StageError> {
    // Nothing is allocated until the element count is known to be in bounds.
    let numel = shape
        .checked_numel()
        .filter(|n| *n <= rules.max_elements)
        .ok_or_else(|| {
            StageError::Shape(format!(
                "shape {shape} of input '{}' exceeds {} elements",
                slot.name, rules.max_elements
            ))
        })?;

    match slot.dtype.kind() {
        ElementKind::Float if slot.dtype == DType::F64 => {
            let values = (0..numel)
                .map(|_| f64::from(rng.gen::<f32>()))
                .collect::<Vec<_>>();
            Ok(Tensor::from_f64(shape, &values))
        }
        ElementKind::Float => Ok(random_f32(shape, numel, rng)),
        ElementKind::Integer => {
            let values = match rules.integer_fill(&slot.name.0) {
                Some(fill) => vec![fill; numel],
                None => (0..numel)
                    .map(|_| i64::from(rng.gen_range(0..rules.token_upper.max(1))))
                    .collect(),
            };
            if slot.dtype == DType::I32 {
                // Values stay below token_upper, which is an i32.
                let narrowed = values.iter().map(|v| *v as i32).collect::<Vec<_>>();
                Ok(Tensor::from_i32(shape, &narrowed))
            } else {
                Ok(Tensor::from_i64(shape, &values))
            }
        }
        ElementKind::Other if slot.dtype == DType::String => Err(StageError::Shape(format!(
            "no generation rule for {} input '{}'",
            slot.dtype, slot.name
        ))),
        ElementKind::Other => Ok(match slot.dtype {
            DType::F16 => {
                let values = (0..numel)
                    .map(|_| f16::from_f32(rng.gen::<f32>()))
                    .collect::<Vec<_>>();
                Tensor::from_f16(shape, &values)
            }
            DType::U8 => {
                let values = (0..numel).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();
                Tensor::from_u8(shape, &values)
            }
            DType::I8 => {
                let values = (0..numel).map(|_| rng.gen::<i8>()).collect::<Vec<_>>();
                Tensor::from_i8(shape, &values)
            }
            DType::Bool => {
                let values = (0..numel).map(|_| rng.gen::<bool>()).collect::<Vec<_>>();
                Tensor::from_bool(shape, &values)
            }
            _ => {
                debug!(input = %slot.name, dtype = %slot.dtype, "falling back to f32 input");
                random_f32(shape, numel, rng)
            }
        }),
    }
}

fn random_f32<R: Rng + ?Sized>(shape: Shape, numel: usize, rng: &mut R) -> Tensor {
    let values = (0..numel).map(|_| rng.gen::<f32>()).collect::<Vec<_>>();
    Tensor::from_f32(shape, &values)
}
