//! Service facade - the two operations the transport calls
//!
//! Checks availability, runs each pipeline in order, returns `ServiceError`.

use std::time::Instant;

use crate::classifier::{self, ClassificationResult};
use crate::error::ServiceError;
use crate::lifecycle::ServiceContext;
use crate::recommend::{self, RecommendationPayload};

/// Classify an uploaded image. CPU-bound; call from a blocking task.
pub fn classify_image(ctx: &ServiceContext, bytes: &[u8]) -> Result<ClassificationResult, ServiceError> {
    let handle = ctx.classifier()?;

    let tensor = classifier::preprocess(bytes)?;

    let start = Instant::now();
    let result = classifier::classify(&tensor, handle)?;
    ctx.stats().record(start.elapsed());

    if let Some(top) = result.predictions.first() {
        tracing::debug!("Top prediction: {} ({:.4})", top.class_name, top.confidence);
    }
    Ok(result)
}

/// Categorized treatment advice for a pest name
pub async fn recommend_for(ctx: &ServiceContext, name: &str) -> Result<RecommendationPayload, ServiceError> {
    let pool = ctx.store()?;
    recommend::recommend(pool, name).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::classifier::handle::testing::FixedLogits;
    use crate::classifier::preprocess::testing::solid_png;
    use crate::classifier::vocabulary::{shipped, VOCABULARY_SIZE};
    use crate::classifier::{ClassifierHandle, Device, TOP_K};
    use crate::db::testing::FixtureStore;
    use crate::lifecycle::Resource;

    fn unavailable<T>() -> Resource<T> {
        Resource::Unavailable { reason: "initialization failed".to_string() }
    }

    #[test]
    fn test_unavailable_classifier_never_decodes() {
        let ctx = ServiceContext::new(unavailable(), unavailable());

        for bytes in [b"garbage".to_vec(), Vec::new(), solid_png(8, 8, [0, 0, 0])] {
            assert!(matches!(
                classify_image(&ctx, &bytes),
                Err(ServiceError::ModelUnavailable(_))
            ));
        }
    }

    #[test]
    fn test_corrupt_image_skips_inference() {
        let backend = FixedLogits::new(vec![0.0; VOCABULARY_SIZE]);
        let calls = backend.calls.clone();
        let handle = ClassifierHandle::new(Box::new(backend), shipped(), Device::Cpu).unwrap();
        let warm_up_calls = calls.load(Ordering::SeqCst);
        let ctx = ServiceContext::new(Resource::Ready(handle), unavailable());

        let png = solid_png(32, 32, [9, 9, 9]);
        let result = classify_image(&ctx, &png[..png.len() / 3]);

        assert!(matches!(result, Err(ServiceError::Decode(_))));
        assert_eq!(calls.load(Ordering::SeqCst), warm_up_calls);
        assert_eq!(ctx.stats().count(), 0);
    }

    #[test]
    fn test_classify_image_contract() {
        let logits: Vec<f32> = (0..VOCABULARY_SIZE).map(|i| ((i * 7919) % 101) as f32 / 10.0).collect();
        let handle = ClassifierHandle::new(Box::new(FixedLogits::new(logits)), shipped(), Device::Cpu).unwrap();
        let ctx = ServiceContext::new(Resource::Ready(handle), unavailable());
        let vocab = shipped();

        let result = classify_image(&ctx, &solid_png(300, 200, [120, 200, 40])).unwrap();
        assert_eq!(result.predictions.len(), TOP_K);
        for pair in result.predictions.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for p in &result.predictions {
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(vocab.contains(&p.class_name));
        }
        assert_eq!(ctx.stats().count(), 1);
    }

    #[tokio::test]
    async fn test_recommend_for_unavailable_store() {
        let ctx = ServiceContext::new(unavailable(), unavailable());
        assert!(matches!(
            recommend_for(&ctx, "aphids").await,
            Err(ServiceError::StoreDegraded(_))
        ));
    }

    #[tokio::test]
    async fn test_recommend_for_resolves_same_record() {
        let store = FixtureStore::new().await;
        let id = store.add_pest("aphids", None).await;
        store.add_recommendation(id, "IPM", "Encourage lacewings").await;
        let ctx = ServiceContext::new(unavailable(), Resource::Ready(store.reader().await));

        let a = recommend_for(&ctx, "Aphids").await.unwrap();
        let b = recommend_for(&ctx, "  Aphids ").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.display_name, "Aphids");

        assert!(matches!(
            recommend_for(&ctx, "totally_unknown_pest_xyz").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
