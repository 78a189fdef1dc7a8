use std::fmt;

use bytes::Bytes;
use half::f16;
use smallvec::SmallVec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F16,
    F64,
    I64,
    I32,
    I8,
    U8,
    Bool,
    String,
    /// An element type the harness has no name for.
    Other,
}

/// How the input synthesizer treats a dtype.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Float,
    Integer,
    Other,
}

impl DType {
    pub fn kind(self) -> ElementKind {
        match self {
            DType::F32 | DType::F64 => ElementKind::Float,
            DType::I64 | DType::I32 => ElementKind::Integer,
            _ => ElementKind::Other,
        }
    }

    /// Packed element width, or `None` for variable-width strings.
    pub fn byte_size(self) -> Option<usize> {
        match self {
            DType::F64 | DType::I64 => Some(8),
            DType::F32 | DType::I32 => Some(4),
            DType::F16 => Some(2),
            DType::I8 | DType::U8 | DType::Bool => Some(1),
            DType::String | DType::Other => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::F64 => "f64",
            DType::I64 => "i64",
            DType::I32 => "i32",
            DType::I8 => "i8",
            DType::U8 => "u8",
            DType::Bool => "bool",
            DType::String => "string",
            DType::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape(pub SmallVec<[usize; 6]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }
    pub fn rank(&self) -> usize {
        self.0.len()
    }
    pub fn dims(&self) -> &[usize] {
        &self.0
    }
    pub fn numel(&self) -> usize {
        self.0.iter().product::<usize>().max(1)
    }
    /// Like [`Shape::numel`] but `None` on overflow.
    pub fn checked_numel(&self) -> Option<usize> {
        self.0
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .map(|n| n.max(1))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self.0.iter().map(|d| d.to_string()).collect::<Vec<_>>();
        write!(f, "[{}]", dims.join(", "))
    }
}

/// A dense CPU tensor, little-endian packed.
#[derive(Clone, Debug)]
pub struct Tensor {
    pub dtype: DType,
    pub shape: Shape,
    pub data: Bytes,
}

impl Tensor {
    pub fn from_cpu_bytes(dtype: DType, shape: Shape, data: Bytes) -> Self {
        Self { dtype, shape, data }
    }

    pub fn from_f32(shape: Shape, values: &[f32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>();
        Self::from_cpu_bytes(DType::F32, shape, Bytes::from(data))
    }

    pub fn from_f64(shape: Shape, values: &[f64]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>();
        Self::from_cpu_bytes(DType::F64, shape, Bytes::from(data))
    }

    pub fn from_i64(shape: Shape, values: &[i64]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>();
        Self::from_cpu_bytes(DType::I64, shape, Bytes::from(data))
    }

    pub fn from_i32(shape: Shape, values: &[i32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>();
        Self::from_cpu_bytes(DType::I32, shape, Bytes::from(data))
    }

    pub fn from_f16(shape: Shape, values: &[f16]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>();
        Self::from_cpu_bytes(DType::F16, shape, Bytes::from(data))
    }

    pub fn from_u8(shape: Shape, values: &[u8]) -> Self {
        Self::from_cpu_bytes(DType::U8, shape, Bytes::copy_from_slice(values))
    }

    pub fn from_i8(shape: Shape, values: &[i8]) -> Self {
        let data = values.iter().map(|v| *v as u8).collect::<Vec<_>>();
        Self::from_cpu_bytes(DType::I8, shape, Bytes::from(data))
    }

    /// One byte per element, 0 or 1.
    pub fn from_bool(shape: Shape, values: &[bool]) -> Self {
        let data = values.iter().map(|v| u8::from(*v)).collect::<Vec<_>>();
        Self::from_cpu_bytes(DType::Bool, shape, Bytes::from(data))
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}
