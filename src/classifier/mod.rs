//! Classifier Module - image classification pipeline
//!
//! Vocabulary + device + weights form an immutable `ClassifierHandle`.
//! `preprocess` turns image bytes into a tensor, `inference::classify`
//! turns a tensor into a ranked top-k result.

pub mod vocabulary;
pub mod device;
pub mod handle;
pub mod preprocess;
pub mod inference;

// Re-export common types
pub use vocabulary::{ClassVocabulary, VOCABULARY_SIZE};
pub use device::{Device, DevicePreference};
pub use handle::{Classifier, ClassifierHandle, InitializationError, OnnxClassifier};
pub use preprocess::{preprocess, DecodeError, IMAGE_SIZE};
pub use inference::{classify, ClassificationResult, InferenceError, Prediction, TOP_K};
