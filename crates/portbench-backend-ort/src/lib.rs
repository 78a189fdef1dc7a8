use anyhow::{bail, ensure, Context, Result};
use bytes::Bytes;
use half::f16;
use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
        DirectMLExecutionProvider, ExecutionProvider, ExecutionProviderDispatch,
        OpenVINOExecutionProvider, QNNExecutionProvider, TensorRTExecutionProvider,
    },
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session, SessionInputValue,
    },
    tensor::TensorElementType,
    value::{DynValue, ValueType},
};
use portbench_core::{
    Backend, BackendClass, CompiledModel, DType, IOName, InferenceEngine, LoadedModel,
    ModelArtifact, ModelSpec, OutputDesc, Shape, Tensor, TensorSpec,
};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Provider {
    Cpu,
    Cuda,
    TensorRt,
    DirectMl,
    CoreMl,
    OpenVino(&'static str),
    Qnn,
}

struct ProviderEntry {
    name: &'static str,
    class: BackendClass,
    provider: Provider,
}

const PROVIDERS: &[ProviderEntry] = &[
    ProviderEntry { name: "CPU", class: BackendClass::Cpu, provider: Provider::Cpu },
    ProviderEntry { name: "CUDA", class: BackendClass::Gpu, provider: Provider::Cuda },
    ProviderEntry { name: "TensorRT", class: BackendClass::Gpu, provider: Provider::TensorRt },
    ProviderEntry { name: "DirectML", class: BackendClass::Gpu, provider: Provider::DirectMl },
    ProviderEntry { name: "CoreML", class: BackendClass::Npu, provider: Provider::CoreMl },
    ProviderEntry { name: "OpenVINO:CPU", class: BackendClass::Cpu, provider: Provider::OpenVino("CPU") },
    ProviderEntry { name: "OpenVINO:GPU", class: BackendClass::Gpu, provider: Provider::OpenVino("GPU") },
    ProviderEntry { name: "OpenVINO:NPU", class: BackendClass::Npu, provider: Provider::OpenVino("NPU") },
    ProviderEntry { name: "QNN", class: BackendClass::Npu, provider: Provider::Qnn },
];

#[cfg(windows)]
const QNN_HTP_BACKEND: &str = "QnnHtp.dll";
#[cfg(not(windows))]
const QNN_HTP_BACKEND: &str = "libQnnHtp.so";

/// ONNX Runtime, one execution provider per backend.
pub struct OrtEngine;

impl OrtEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OrtEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed model. The serialized bytes are kept so every backend compiles
/// from the same load.
pub struct OrtModel {
    spec: ModelSpec,
    bytes: Bytes,
}

pub struct OrtCompiled {
    session: Session,
}

impl InferenceEngine for OrtEngine {
    type Model = OrtModel;
    type Compiled = OrtCompiled;

    fn name(&self) -> &'static str {
        "onnxruntime"
    }

    fn available(&self) -> Result<Vec<Backend>> {
        Ok(usable_backends(PROVIDERS, provider_usable))
    }

    fn load(&self, artifact: &ModelArtifact) -> Result<Self::Model> {
        let path = artifact.path();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        // Parsing happens on the default CPU provider; only the IO metadata is kept.
        let probe = Session::builder()
            .context("failed to create ORT session builder")?
            .commit_from_memory(&bytes)
            .context("failed to load ONNX model")?;
        let spec = build_model_spec(&probe)?;

        Ok(OrtModel {
            spec,
            bytes: Bytes::from(bytes),
        })
    }

    fn compile(&self, model: &Self::Model, backend: &Backend) -> Result<Self::Compiled> {
        let entry = PROVIDERS
            .iter()
            .find(|entry| entry.name == backend.name)
            .with_context(|| format!("unknown onnxruntime backend: {}", backend.name))?;

        let builder = Session::builder()
            .context("failed to create ORT session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("failed to configure ORT session builder")?;

        let builder = configure_session_builder(builder, entry.provider)?;

        let session = builder
            .commit_from_memory(&model.bytes)
            .with_context(|| format!("failed to build session for {}", backend.name))?;

        Ok(OrtCompiled { session })
    }
}

impl LoadedModel for OrtModel {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }
}

impl CompiledModel for OrtCompiled {
    fn infer(&mut self, inputs: &[(IOName, Tensor)]) -> Result<Vec<OutputDesc>> {
        let mut ort_inputs = Vec::with_capacity(inputs.len());
        for (name, input) in inputs {
            let value = tensor_to_ort_value(input)
                .with_context(|| format!("failed to convert input '{name}'"))?;
            ort_inputs.push((name.0.clone(), SessionInputValue::from(value)));
        }

        let outputs = self.session.run(ort_inputs)?;
        let mut descs = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            descs.push(output_desc(name, value.dtype())?);
        }

        Ok(descs)
    }
}

/// Table entries that `usable` accepts, in table order.
fn usable_backends(
    entries: &[ProviderEntry],
    usable: impl Fn(Provider) -> ort::Result<bool>,
) -> Vec<Backend> {
    let mut backends = Vec::new();
    for entry in entries {
        match usable(entry.provider) {
            Ok(true) => backends.push(Backend::new(entry.name, entry.class)),
            Ok(false) => debug!(backend = entry.name, "execution provider not available"),
            Err(err) => {
                debug!(backend = entry.name, error = %err, "execution provider probe failed")
            }
        }
    }
    backends
}

fn provider_usable(provider: Provider) -> ort::Result<bool> {
    if !provider_available(provider)? {
        return Ok(false);
    }
    match provider {
        // A compiled-in OpenVINO EP says nothing about which devices exist.
        Provider::OpenVino(_) => Ok(device_registers(provider)),
        _ => Ok(true),
    }
}

/// Registers the provider on a throwaway builder; OpenVINO rejects device
/// types it cannot find at this point.
fn device_registers(provider: Provider) -> bool {
    let builder = match Session::builder() {
        Ok(builder) => builder,
        Err(err) => {
            debug!(?provider, error = %err, "cannot create ORT session builder");
            return false;
        }
    };
    match builder.with_execution_providers([provider_dispatch(provider).error_on_failure()]) {
        Ok(_) => true,
        Err(err) => {
            debug!(?provider, error = %err, "device not present");
            false
        }
    }
}

fn provider_available(provider: Provider) -> ort::Result<bool> {
    match provider {
        Provider::Cpu => CPUExecutionProvider::default().is_available(),
        Provider::Cuda => CUDAExecutionProvider::default().is_available(),
        Provider::TensorRt => TensorRTExecutionProvider::default().is_available(),
        Provider::DirectMl => DirectMLExecutionProvider::default().is_available(),
        Provider::CoreMl => CoreMLExecutionProvider::default().is_available(),
        Provider::OpenVino(_) => OpenVINOExecutionProvider::default().is_available(),
        Provider::Qnn => QNNExecutionProvider::default().is_available(),
    }
}

fn provider_dispatch(provider: Provider) -> ExecutionProviderDispatch {
    match provider {
        Provider::Cpu => CPUExecutionProvider::default().build(),
        Provider::Cuda => CUDAExecutionProvider::default().build(),
        Provider::TensorRt => TensorRTExecutionProvider::default().build(),
        Provider::DirectMl => DirectMLExecutionProvider::default().build(),
        Provider::CoreMl => CoreMLExecutionProvider::default().build(),
        Provider::OpenVino(device) => OpenVINOExecutionProvider::default()
            .with_device_type(device)
            .build(),
        Provider::Qnn => QNNExecutionProvider::default()
            .with_backend_path(QNN_HTP_BACKEND)
            .build(),
    }
}

fn configure_session_builder(builder: SessionBuilder, provider: Provider) -> Result<SessionBuilder> {
    // A provider that fails to register must surface as a compile failure,
    // not as a silent run on the CPU provider.
    let ep = provider_dispatch(provider).error_on_failure();
    builder
        .with_execution_providers([ep])
        .with_context(|| format!("failed to enable ORT execution provider {provider:?}"))
}

fn build_model_spec(session: &Session) -> Result<ModelSpec> {
    let inputs = session
        .inputs
        .iter()
        .map(|input| tensor_spec_from_value_type(&input.name, &input.input_type))
        .collect::<Result<Vec<_>>>()?;

    let outputs = session
        .outputs
        .iter()
        .map(|output| tensor_spec_from_value_type(&output.name, &output.output_type))
        .collect::<Result<Vec<_>>>()?;

    Ok(ModelSpec { inputs, outputs })
}

fn tensor_spec_from_value_type(name: &str, value_type: &ValueType) -> Result<TensorSpec> {
    let ValueType::Tensor { ty, shape, .. } = value_type else {
        bail!("unsupported non-tensor IO value type for '{name}'");
    };

    Ok(TensorSpec::new(name, ort_tensor_element_to_dtype(*ty), dims_from_ort(shape)))
}

/// ORT reports symbolic dims as -1.
fn dims_from_ort(shape: &[i64]) -> Vec<Option<usize>> {
    shape
        .iter()
        .map(|d| if *d < 0 { None } else { Some(*d as usize) })
        .collect()
}

fn ort_tensor_element_to_dtype(ty: TensorElementType) -> DType {
    match ty {
        TensorElementType::Float32 => DType::F32,
        TensorElementType::Float16 => DType::F16,
        TensorElementType::Float64 => DType::F64,
        TensorElementType::Int64 => DType::I64,
        TensorElementType::Int32 => DType::I32,
        TensorElementType::Int8 => DType::I8,
        TensorElementType::Uint8 => DType::U8,
        TensorElementType::Bool => DType::Bool,
        TensorElementType::String => DType::String,
        _ => DType::Other,
    }
}

fn output_desc(name: &str, value_type: &ValueType) -> Result<OutputDesc> {
    let ValueType::Tensor { ty, shape, .. } = value_type else {
        bail!("non-tensor output '{name}' is not supported");
    };

    let dims: Vec<usize> = shape.iter().map(|d| (*d).max(0) as usize).collect();
    Ok(OutputDesc {
        name: IOName(name.to_string()),
        dtype: ort_tensor_element_to_dtype(*ty),
        shape: Shape::from_slice(&dims),
    })
}

fn tensor_to_ort_value(tensor: &Tensor) -> Result<DynValue> {
    let shape: Vec<usize> = tensor.shape.0.iter().copied().collect();
    let width = tensor
        .dtype
        .byte_size()
        .with_context(|| format!("{} inputs are not supported", tensor.dtype))?;
    let expected_bytes = tensor.shape.numel() * width;
    ensure!(
        tensor.data.len() == expected_bytes,
        "input byte size mismatch: got {}, expected {}",
        tensor.data.len(),
        expected_bytes
    );

    let bytes = &tensor.data;
    let value = match tensor.dtype {
        DType::F32 => {
            let data = decode_le(bytes, f32::from_le_bytes)?;
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
        DType::F64 => {
            let data = decode_le(bytes, f64::from_le_bytes)?;
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
        DType::I64 => {
            let data = decode_le(bytes, i64::from_le_bytes)?;
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
        DType::I32 => {
            let data = decode_le(bytes, i32::from_le_bytes)?;
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
        DType::I8 => {
            let data = decode_le(bytes, i8::from_le_bytes)?;
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
        DType::U8 => {
            let data = bytes.to_vec();
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
        DType::Bool => {
            let data: Vec<bool> = bytes.iter().map(|b| *b != 0).collect();
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
        DType::F16 => {
            let data = decode_le(bytes, f16::from_le_bytes)?;
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
        DType::String | DType::Other => bail!("{} inputs are not supported", tensor.dtype),
    };

    Ok(value)
}

#[allow(clippy::manual_is_multiple_of)]
fn decode_le<T, const N: usize>(bytes: &Bytes, from_le: fn([u8; N]) -> T) -> Result<Vec<T>> {
    ensure!(
        bytes.len() % N == 0,
        "input of {} bytes is not a whole number of {N}-byte elements",
        bytes.len()
    );
    bytes
        .chunks_exact(N)
        .map(|chunk| Ok(from_le(chunk.try_into()?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_dims_are_unbound() {
        assert_eq!(
            dims_from_ort(&[-1, 3, 224, 224]),
            vec![None, Some(3), Some(224), Some(224)]
        );
        assert_eq!(dims_from_ort(&[0]), vec![Some(0)]);
    }

    #[test]
    fn provider_names_are_unique() {
        for (i, a) in PROVIDERS.iter().enumerate() {
            for b in &PROVIDERS[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn openvino_devices_are_reported_individually() {
        let present = |p: Provider| {
            Ok(matches!(
                p,
                Provider::Cpu | Provider::OpenVino("CPU") | Provider::OpenVino("GPU")
            ))
        };
        let names = usable_backends(PROVIDERS, present)
            .into_iter()
            .map(|b| b.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["CPU", "OpenVINO:CPU", "OpenVINO:GPU"]);
    }

    #[test]
    fn discovery_error_drops_the_entry() {
        let flaky = |p: Provider| match p {
            Provider::Cpu => Ok(true),
            Provider::OpenVino("NPU") => Err(ort::Error::new("NPU plugin crashed")),
            _ => Ok(false),
        };
        let backends = usable_backends(PROVIDERS, flaky);
        assert_eq!(backends, vec![Backend::new("CPU", BackendClass::Cpu)]);
    }

    #[test]
    fn decodes_little_endian_words() {
        let bytes = Bytes::from([1.5f32, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>());
        assert_eq!(decode_le(&bytes, f32::from_le_bytes).unwrap(), vec![1.5, -2.0]);

        let short = Bytes::from_static(&[0, 1, 2]);
        assert!(decode_le(&short, i32::from_le_bytes).is_err());
    }

    #[test]
    fn narrow_inputs_convert() {
        let shape = Shape::from_slice(&[2]);
        for tensor in [
            Tensor::from_f16(shape.clone(), &[f16::from_f32(0.5), f16::from_f32(1.0)]),
            Tensor::from_u8(shape.clone(), &[1, 2]),
            Tensor::from_i8(shape.clone(), &[-1, 1]),
            Tensor::from_bool(shape.clone(), &[true, false]),
        ] {
            assert!(tensor_to_ort_value(&tensor).is_ok(), "{} failed", tensor.dtype);
        }
    }

    #[test]
    fn string_inputs_are_rejected() {
        let tensor = Tensor::from_cpu_bytes(DType::String, Shape::from_slice(&[1]), Bytes::new());
        assert!(tensor_to_ort_value(&tensor).is_err());
    }

    #[test]
    fn unknown_backend_fails_to_compile() {
        let model = OrtModel {
            spec: ModelSpec::default(),
            bytes: Bytes::new(),
        };
        let err = OrtEngine::new()
            .compile(&model, &Backend::new("Hexagon", BackendClass::Npu))
            .err()
            .expect("unknown backend must fail");
        assert!(err.to_string().contains("unknown onnxruntime backend"));
    }
}
