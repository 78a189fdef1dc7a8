//! Builds tiny single-op ONNX graphs so the tests need no checked-in models.
//!
//! The messages below mirror the subset of `onnx.proto` onnxruntime reads;
//! tags match the upstream schema.

use std::path::Path;

use prost::Message;

pub const FLOAT: i32 = 1;
pub const INT64: i32 = 7;

#[derive(Clone, PartialEq, Message)]
pub struct ModelProto {
    #[prost(int64, tag = "1")]
    pub ir_version: i64,
    #[prost(string, tag = "2")]
    pub producer_name: String,
    #[prost(message, optional, tag = "7")]
    pub graph: Option<GraphProto>,
    #[prost(message, repeated, tag = "8")]
    pub opset_import: Vec<OperatorSetIdProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OperatorSetIdProto {
    #[prost(string, tag = "1")]
    pub domain: String,
    #[prost(int64, tag = "2")]
    pub version: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct GraphProto {
    #[prost(message, repeated, tag = "1")]
    pub node: Vec<NodeProto>,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, repeated, tag = "11")]
    pub input: Vec<ValueInfoProto>,
    #[prost(message, repeated, tag = "12")]
    pub output: Vec<ValueInfoProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct NodeProto {
    #[prost(string, repeated, tag = "1")]
    pub input: Vec<String>,
    #[prost(string, repeated, tag = "2")]
    pub output: Vec<String>,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub op_type: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ValueInfoProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub r#type: Option<TypeProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TypeProto {
    #[prost(message, optional, tag = "1")]
    pub tensor_type: Option<TensorTypeProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TensorTypeProto {
    #[prost(int32, tag = "1")]
    pub elem_type: i32,
    #[prost(message, optional, tag = "2")]
    pub shape: Option<TensorShapeProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TensorShapeProto {
    #[prost(message, repeated, tag = "1")]
    pub dim: Vec<DimensionProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DimensionProto {
    #[prost(oneof = "dimension::Value", tags = "1, 2")]
    pub value: Option<dimension::Value>,
}

pub mod dimension {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Value {
        #[prost(int64, tag = "1")]
        DimValue(i64),
        #[prost(string, tag = "2")]
        DimParam(String),
    }
}

pub enum Dim {
    Fixed(i64),
    Named(&'static str),
}

pub fn value_info(name: &str, elem_type: i32, dims: Vec<Dim>) -> ValueInfoProto {
    let dim = dims
        .into_iter()
        .map(|d| DimensionProto {
            value: Some(match d {
                Dim::Fixed(v) => dimension::Value::DimValue(v),
                Dim::Named(p) => dimension::Value::DimParam(p.to_string()),
            }),
        })
        .collect();
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            tensor_type: Some(TensorTypeProto {
                elem_type,
                shape: Some(TensorShapeProto { dim }),
            }),
        }),
    }
}

/// One node of `op_type` wired from every input to the single output.
pub fn single_op_model(op_type: &str, inputs: Vec<ValueInfoProto>, output: ValueInfoProto) -> Vec<u8> {
    let node = NodeProto {
        input: inputs.iter().map(|i| i.name.clone()).collect(),
        output: vec![output.name.clone()],
        name: "node0".to_string(),
        op_type: op_type.to_string(),
    };
    ModelProto {
        ir_version: 8,
        producer_name: "portbench-tests".to_string(),
        graph: Some(GraphProto {
            node: vec![node],
            name: "g".to_string(),
            input: inputs,
            output: vec![output],
        }),
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: 13,
        }],
    }
    .encode_to_vec()
}

pub fn write_model(dir: &Path, file_name: &str, bytes: &[u8]) {
    std::fs::write(dir.join(file_name), bytes).unwrap();
}

pub fn identity_model() -> Vec<u8> {
    let dims = || vec![Dim::Named("batch"), Dim::Fixed(3)];
    single_op_model(
        "Identity",
        vec![value_info("x", FLOAT, dims())],
        value_info("y", FLOAT, dims()),
    )
}

pub fn image_model() -> Vec<u8> {
    let dims = || {
        vec![
            Dim::Named("N"),
            Dim::Fixed(3),
            Dim::Fixed(224),
            Dim::Fixed(224),
        ]
    };
    single_op_model(
        "Relu",
        vec![value_info("pixel_values", FLOAT, dims())],
        value_info("out", FLOAT, dims()),
    )
}

pub fn token_model() -> Vec<u8> {
    let dims = || vec![Dim::Named("batch"), Dim::Named("sequence")];
    single_op_model(
        "Add",
        vec![
            value_info("input_ids", INT64, dims()),
            value_info("attention_mask", INT64, dims()),
        ],
        value_info("sum", INT64, dims()),
    )
}

#[test]
fn fixture_decodes_back() {
    let model = ModelProto::decode(identity_model().as_slice()).unwrap();
    let graph = model.graph.unwrap();
    assert_eq!(graph.node[0].op_type, "Identity");
    assert_eq!(graph.input[0].name, "x");
    let shape = graph.input[0]
        .r#type
        .as_ref()
        .and_then(|t| t.tensor_type.as_ref())
        .and_then(|t| t.shape.as_ref())
        .unwrap();
    assert_eq!(shape.dim.len(), 2);
    assert_eq!(model.opset_import[0].version, 13);
}
