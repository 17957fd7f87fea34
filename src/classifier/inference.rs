//! Inference Engine - forward pass, softmax, top-k
//!
//! Turns a preprocessed tensor into the ranked `ClassificationResult`.

use ndarray::Array4;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::handle::ClassifierHandle;
use super::preprocess::IMAGE_SIZE;
use super::vocabulary::ClassVocabulary;

/// Number of ranked predictions returned per image
pub const TOP_K: usize = 3;

/// Decimal places kept on reported confidences
const CONFIDENCE_DECIMALS: i32 = 4;

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Per-request fatal inference failures. Never retried.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("input tensor has shape {0:?}, expected [1, 3, 224, 224]")]
    InputShape(Vec<usize>),

    #[error("model produced {actual} logits, expected {expected}")]
    OutputShape { expected: usize, actual: usize },

    #[error("model produced non-finite logits")]
    NonFinite,

    #[error("{0}")]
    Runtime(String),
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// One ranked class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f64,
}

/// Exactly `TOP_K` predictions, highest confidence first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predictions: Vec<Prediction>,
}

// ============================================================================
// PREDICTION
// ============================================================================

/// Run the forward pass and rank the classes
pub fn classify(
    tensor: &Array4<f32>,
    handle: &ClassifierHandle,
) -> Result<ClassificationResult, InferenceError> {
    let side = IMAGE_SIZE as usize;
    if tensor.shape() != [1, 3, side, side] {
        return Err(InferenceError::InputShape(tensor.shape().to_vec()));
    }

    let logits = handle.forward(tensor)?;
    rank(&logits, handle.vocabulary())
}

/// Softmax over the logits, then the top `TOP_K` classes by probability
pub fn rank(
    logits: &[f32],
    vocabulary: &ClassVocabulary,
) -> Result<ClassificationResult, InferenceError> {
    if logits.len() != vocabulary.len() {
        return Err(InferenceError::OutputShape {
            expected: vocabulary.len(),
            actual: logits.len(),
        });
    }

    let probabilities = softmax(logits)?;
    let predictions = top_k(&probabilities, TOP_K)
        .into_iter()
        .filter_map(|(idx, prob)| {
            vocabulary.get(idx).map(|name| Prediction {
                class_name: name.to_string(),
                confidence: round_confidence(prob),
            })
        })
        .collect();

    Ok(ClassificationResult { predictions })
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Result<Vec<f64>, InferenceError> {
    if logits.iter().any(|l| !l.is_finite()) {
        return Err(InferenceError::NonFinite);
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();

    Ok(exps.into_iter().map(|e| e / sum).collect())
}

/// Indices of the `k` largest probabilities; ties go to the lower index
pub fn top_k(probabilities: &[f64], k: usize) -> Vec<(usize, f64)> {
    let mut indexed: Vec<(usize, f64)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    indexed.truncate(k);
    indexed
}

fn round_confidence(prob: f64) -> f64 {
    let scale = 10f64.powi(CONFIDENCE_DECIMALS);
    ((prob * scale).round() / scale).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::device::Device;
    use crate::classifier::handle::testing::FixedLogits;
    use crate::classifier::vocabulary::{shipped, VOCABULARY_SIZE};

    fn logits_with(peaks: &[(usize, f32)]) -> Vec<f32> {
        let mut logits = vec![0.0f32; VOCABULARY_SIZE];
        for &(idx, value) in peaks {
            logits[idx] = value;
        }
        logits
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let logits: Vec<f32> = (0..VOCABULARY_SIZE).map(|i| (i as f32 * 0.37).sin() * 4.0).collect();
        let probs = softmax(&logits).unwrap();
        assert_eq!(probs.len(), VOCABULARY_SIZE);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_softmax_stable_with_large_logits() {
        let probs = softmax(&[1000.0, 1000.0, 999.0]).unwrap();
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs[0] - probs[1]).abs() < 1e-12);
        assert!(probs[0] > probs[2]);
    }

    #[test]
    fn test_softmax_rejects_nan() {
        assert!(matches!(softmax(&[0.0, f32::NAN]), Err(InferenceError::NonFinite)));
    }

    #[test]
    fn test_top_k_ties_prefer_lower_index() {
        let probs = vec![0.1, 0.3, 0.3, 0.05, 0.3];
        let top = top_k(&probs, 3);
        assert_eq!(top.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2, 4]);
    }

    #[test]
    fn test_rank_returns_three_sorted_members() {
        let vocab = shipped();
        let logits = logits_with(&[(72, 6.0), (25, 5.0), (131, 4.5)]);
        let result = rank(&logits, &vocab).unwrap();

        assert_eq!(result.predictions.len(), TOP_K);
        assert_eq!(result.predictions[0].class_name, "aphids");
        assert_eq!(result.predictions[1].class_name, "Jute aphid");
        assert_eq!(result.predictions[2].class_name, "yellow rice borer");

        for pair in result.predictions.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for p in &result.predictions {
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(vocab.contains(&p.class_name));
        }
    }

    #[test]
    fn test_confidence_rounded_to_four_places() {
        let vocab = shipped();
        let logits = logits_with(&[(3, 2.0), (9, 1.0)]);
        let result = rank(&logits, &vocab).unwrap();

        for p in &result.predictions {
            let scaled = p.confidence * 10_000.0;
            assert!((scaled - scaled.round()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_uniform_logits_pick_first_indices() {
        let vocab = shipped();
        let result = rank(&vec![1.5; VOCABULARY_SIZE], &vocab).unwrap();
        let names: Vec<_> = result.predictions.iter().map(|p| p.class_name.as_str()).collect();
        assert_eq!(names, vec!["Adristyrannus", "Aleurocanthus spiniferus", "Ampelophaga"]);
        assert_eq!(result.predictions[0].confidence, 0.0076);
    }

    #[test]
    fn test_rank_rejects_wrong_logit_count() {
        let err = rank(&[0.0; 10], &shipped()).unwrap_err();
        assert!(matches!(err, InferenceError::OutputShape { expected: 132, actual: 10 }));
    }

    #[test]
    fn test_classify_through_handle() {
        let backend = FixedLogits::new(logits_with(&[(102, 9.0)]));
        let handle = ClassifierHandle::new(Box::new(backend), shipped(), Device::Cpu).unwrap();

        let tensor = Array4::<f32>::zeros((1, 3, 224, 224));
        let result = classify(&tensor, &handle).unwrap();
        assert_eq!(result.predictions[0].class_name, "mites");
        assert!(result.predictions[0].confidence > 0.9);
    }

    #[test]
    fn test_classify_rejects_bad_input_shape() {
        let backend = FixedLogits::new(vec![0.0; VOCABULARY_SIZE]);
        let handle = ClassifierHandle::new(Box::new(backend), shipped(), Device::Cpu).unwrap();

        let tensor = Array4::<f32>::zeros((1, 3, 32, 32));
        assert!(matches!(
            classify(&tensor, &handle),
            Err(InferenceError::InputShape(_))
        ));
    }
}
