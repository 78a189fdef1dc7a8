use std::fmt;

use crate::{DType, Shape};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IOName(pub String);

impl fmt::Display for IOName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TensorSpec {
    pub name: IOName,
    pub dtype: DType,
    pub rank: usize,
    pub dims: Vec<Option<usize>>, // None = unbound
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, dtype: DType, dims: Vec<Option<usize>>) -> Self {
        Self {
            name: IOName(name.into()),
            dtype,
            rank: dims.len(),
            dims,
        }
    }

    /// Declared dims rendered as a list, unbound dims as `?`.
    pub fn declared_shape(&self) -> String {
        let dims = self
            .dims
            .iter()
            .map(|d| match d {
                Some(d) => d.to_string(),
                None => "?".to_string(),
            })
            .collect::<Vec<_>>();
        format!("[{}]", dims.join(", "))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ModelSpec {
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
}

impl ModelSpec {
    /// The input used for shape-based classification.
    pub fn primary_input(&self) -> Option<&TensorSpec> {
        self.inputs.first()
    }
}

/// What a compiled model handed back for one output slot.
#[derive(Clone, Debug)]
pub struct OutputDesc {
    pub name: IOName,
    pub dtype: DType,
    pub shape: Shape,
}
