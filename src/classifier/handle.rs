//! Classifier handle - ONNX Runtime integration
//!
//! Loads the weights once, pins the device, and bundles both with the
//! vocabulary into an immutable handle that inference calls share.

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::Array4;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use ort::session::{Session, builder::{GraphOptimizationLevel, SessionBuilder}};
use ort::value::Tensor;

use super::device::{select_device, Device, DevicePreference};
use super::inference::InferenceError;
use super::preprocess::IMAGE_SIZE;
use super::vocabulary::ClassVocabulary;

// ============================================================================
// ERRORS
// ============================================================================

/// Classifier startup failures. These degrade the service, they never abort it.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("model weights not found: {}", .0.display())]
    WeightsNotFound(PathBuf),

    #[error("failed to load model weights: {0}")]
    Weights(String),

    #[error("invalid class vocabulary: {0}")]
    Vocabulary(String),

    #[error("model produces {actual} logits but the vocabulary has {expected} classes")]
    VocabularyMismatch { expected: usize, actual: usize },
}

// ============================================================================
// BACKEND TRAIT
// ============================================================================

/// A compute backend able to run the forward pass
pub trait Classifier: Send + Sync {
    /// Run one forward pass over a `[1, 3, H, W]` batch, returning one logit
    /// per class in vocabulary order
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// ONNX Runtime backend
pub struct OnnxClassifier {
    // ort sessions need exclusive access per run
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxClassifier {
    /// Load ONNX weights from file onto the given device
    pub fn load(model_path: &Path, device: Device) -> Result<Self, InitializationError> {
        tracing::info!("Loading ONNX model from: {}", model_path.display());

        if !model_path.exists() {
            return Err(InitializationError::WeightsNotFound(model_path.to_path_buf()));
        }

        let builder = Session::builder()
            .map_err(|e| InitializationError::Weights(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InitializationError::Weights(format!("Failed to set optimization: {}", e)))?;

        let session = register_device(builder, device)?
            .commit_from_file(model_path)
            .map_err(|e| InitializationError::Weights(format!("Failed to load model: {}", e)))?;

        let output_name = session.outputs.first()
            .map(|o| o.name.clone())
            .ok_or_else(|| InitializationError::Weights("No output defined".to_string()))?;

        tracing::info!("ONNX model loaded successfully on {}", device);

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

#[cfg(feature = "cuda")]
fn register_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder, InitializationError> {
    use ort::execution_providers::CUDAExecutionProvider;

    match device {
        Device::Cuda => builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(|e| InitializationError::Weights(format!("Failed to register CUDA: {}", e))),
        Device::Cpu => Ok(builder),
    }
}

#[cfg(not(feature = "cuda"))]
fn register_device(builder: SessionBuilder, _device: Device) -> Result<SessionBuilder, InitializationError> {
    Ok(builder)
}

impl Classifier for OnnxClassifier {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let input_tensor = Tensor::from_array(input.clone())
            .map_err(|e| InferenceError::Runtime(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError::Runtime(format!("Inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str())
            .ok_or_else(|| InferenceError::Runtime("No output".to_string()))?;

        let (_, data) = output.try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Runtime(format!("Extract error: {}", e)))?;

        Ok(data.to_vec())
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Loaded weights + device + vocabulary. Never mutated after construction.
pub struct ClassifierHandle {
    backend: Box<dyn Classifier>,
    vocabulary: ClassVocabulary,
    device: Device,
    weights_path: Option<PathBuf>,
    weights_sha256: Option<String>,
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle")
            .field("device", &self.device)
            .field("classes", &self.vocabulary.len())
            .field("weights_path", &self.weights_path)
            .finish()
    }
}

impl ClassifierHandle {
    /// Load ONNX weights, select the device, and verify the output size
    /// against the vocabulary
    pub fn load(
        weights_path: &Path,
        vocabulary: ClassVocabulary,
        preference: DevicePreference,
    ) -> Result<Self, InitializationError> {
        let device = select_device(preference);
        let backend = OnnxClassifier::load(weights_path, device)?;
        let sha256 = compute_file_hash(weights_path)
            .map_err(|e| InitializationError::Weights(format!("Cannot hash weights: {}", e)))?;

        tracing::info!("Model weights sha256: {}", sha256);

        let mut handle = Self::new(Box::new(backend), vocabulary, device)?;
        handle.weights_path = Some(weights_path.to_path_buf());
        handle.weights_sha256 = Some(sha256);
        Ok(handle)
    }

    /// Wrap an already-loaded backend. Runs one warm-up pass so a
    /// weights/vocabulary mismatch fails here rather than per request.
    pub fn new(
        backend: Box<dyn Classifier>,
        vocabulary: ClassVocabulary,
        device: Device,
    ) -> Result<Self, InitializationError> {
        let side = IMAGE_SIZE as usize;
        let probe = Array4::<f32>::zeros((1, 3, side, side));
        let logits = backend.forward(&probe)
            .map_err(|e| InitializationError::Weights(format!("Warm-up pass failed: {}", e)))?;

        if logits.len() != vocabulary.len() {
            return Err(InitializationError::VocabularyMismatch {
                expected: vocabulary.len(),
                actual: logits.len(),
            });
        }

        Ok(Self {
            backend,
            vocabulary,
            device,
            weights_path: None,
            weights_sha256: None,
        })
    }

    pub fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        self.backend.forward(input)
    }

    pub fn vocabulary(&self) -> &ClassVocabulary {
        &self.vocabulary
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn weights_path(&self) -> Option<&Path> {
        self.weights_path.as_deref()
    }

    pub fn weights_sha256(&self) -> Option<&str> {
        self.weights_sha256.as_deref()
    }
}

/// Compute SHA256 hash of file
fn compute_file_hash(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Backend returning fixed logits and counting its calls
    pub struct FixedLogits {
        pub logits: Vec<f32>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FixedLogits {
        pub fn new(logits: Vec<f32>) -> Self {
            Self { logits, calls: Arc::new(AtomicUsize::new(0)) }
        }
    }

    impl Classifier for FixedLogits {
        fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            let side = IMAGE_SIZE as usize;
            if input.shape() != [1, 3, side, side] {
                return Err(InferenceError::InputShape(input.shape().to_vec()));
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.logits.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::Ordering;

    use super::testing::FixedLogits;
    use super::*;
    use crate::classifier::vocabulary::{shipped, VOCABULARY_SIZE};

    #[test]
    fn test_new_runs_warm_up_pass() {
        let backend = FixedLogits::new(vec![0.0; VOCABULARY_SIZE]);
        let calls = backend.calls.clone();
        let handle = ClassifierHandle::new(Box::new(backend), shipped(), Device::Cpu).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.device(), Device::Cpu);
        assert_eq!(handle.vocabulary().len(), VOCABULARY_SIZE);
        assert!(handle.weights_sha256().is_none());
    }

    #[test]
    fn test_logit_count_must_match_vocabulary() {
        let backend = FixedLogits::new(vec![0.0; 100]);
        let err = ClassifierHandle::new(Box::new(backend), shipped(), Device::Cpu).unwrap_err();
        assert!(matches!(
            err,
            InitializationError::VocabularyMismatch { expected: 132, actual: 100 }
        ));
    }

    #[test]
    fn test_load_missing_weights() {
        let err = ClassifierHandle::load(
            Path::new("/nonexistent/model.onnx"),
            shipped(),
            DevicePreference::Cpu,
        )
        .unwrap_err();
        assert!(matches!(err, InitializationError::WeightsNotFound(_)));
    }

    #[test]
    fn test_file_hash() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        let hash = compute_file_hash(file.path()).unwrap();
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
