//! Service lifecycle - one-time initialization and ordered shutdown
//!
//! Everything the request paths share lives in one `ServiceContext`, built
//! once at startup and passed by reference. A resource that fails to come up
//! is recorded as `Unavailable` instead of aborting the process.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::classifier::{ClassVocabulary, ClassifierHandle, Device};
use crate::config::Config;
use crate::db;
use crate::error::ServiceError;

// ============================================================================
// STATE
// ============================================================================

/// Outcome of bringing up one shared resource
#[derive(Debug)]
pub enum Resource<T> {
    Ready(T),
    Unavailable { reason: String },
}

impl<T> Resource<T> {
    pub fn from_init<E: Display>(result: Result<T, E>, what: &str) -> Self {
        match result {
            Ok(value) => Resource::Ready(value),
            Err(e) => {
                tracing::warn!("{} unavailable: {}", what, e);
                Resource::Unavailable { reason: e.to_string() }
            }
        }
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Resource::Ready(value) => Some(value),
            Resource::Unavailable { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Resource::Ready(_) => None,
            Resource::Unavailable { reason } => Some(reason),
        }
    }
}

/// Inference latency counters
#[derive(Debug, Default)]
pub struct InferenceStats {
    latency_sum_us: AtomicU64,
    count: AtomicU64,
}

impl InferenceStats {
    pub fn record(&self, elapsed: Duration) {
        self.latency_sum_us.fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ms(&self) -> f32 {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.count();
        if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 }
    }
}

/// Classifier status for the health report
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierStatus {
    pub loaded: bool,
    pub device: Option<Device>,
    pub vocabulary_size: Option<usize>,
    pub weights_path: Option<String>,
    pub weights_sha256: Option<String>,
    pub inference_count: u64,
    pub avg_latency_ms: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Shared, immutable service state
#[derive(Debug)]
pub struct ServiceContext {
    classifier: Resource<ClassifierHandle>,
    store: Resource<SqlitePool>,
    stats: InferenceStats,
}

impl ServiceContext {
    /// Load the classifier and open the knowledge store. Never fails:
    /// problems leave the affected path unavailable.
    pub async fn initialize(config: &Config) -> Self {
        tracing::info!("Loading model and connecting to knowledge store");

        let classifier = ClassVocabulary::load(&config.vocabulary_path)
            .and_then(|vocab| ClassifierHandle::load(&config.model_path, vocab, config.device));
        let classifier = Resource::from_init(classifier, "Classifier");

        let store = db::create_pool(&config.database_path, config.db_max_connections).await;
        let store = Resource::from_init(store, "Knowledge store");

        let context = Self::new(classifier, store);
        match (&context.classifier, &context.store) {
            (Resource::Ready(handle), Resource::Ready(_)) => {
                tracing::info!("Model and knowledge store ready on device: {}", handle.device())
            }
            _ => tracing::warn!("Service starting in degraded mode"),
        }
        context
    }

    /// Assemble from already-initialized parts
    pub fn new(classifier: Resource<ClassifierHandle>, store: Resource<SqlitePool>) -> Self {
        Self {
            classifier,
            store,
            stats: InferenceStats::default(),
        }
    }

    pub fn classifier(&self) -> Result<&ClassifierHandle, ServiceError> {
        match &self.classifier {
            Resource::Ready(handle) => Ok(handle),
            Resource::Unavailable { reason } => Err(ServiceError::ModelUnavailable(reason.clone())),
        }
    }

    pub fn store(&self) -> Result<&SqlitePool, ServiceError> {
        match &self.store {
            Resource::Ready(pool) => Ok(pool),
            Resource::Unavailable { reason } => Err(ServiceError::StoreDegraded(reason.clone())),
        }
    }

    pub fn stats(&self) -> &InferenceStats {
        &self.stats
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.as_ready().is_some() && self.store.as_ready().is_some()
    }

    pub fn store_reason(&self) -> Option<&str> {
        self.store.reason()
    }

    pub fn classifier_status(&self) -> ClassifierStatus {
        let handle = self.classifier.as_ready();
        ClassifierStatus {
            loaded: handle.is_some(),
            device: handle.map(|h| h.device()),
            vocabulary_size: handle.map(|h| h.vocabulary().len()),
            weights_path: handle
                .and_then(|h| h.weights_path())
                .map(|p| p.display().to_string()),
            weights_sha256: handle.and_then(|h| h.weights_sha256()).map(str::to_string),
            inference_count: self.stats.count(),
            avg_latency_ms: self.stats.avg_latency_ms(),
            reason: self.classifier.reason().map(str::to_string),
        }
    }

    /// Close the knowledge store. The classifier is released when the
    /// last reference to the context drops, which is always after this.
    /// Safe after a partial initialization and when called more than once.
    pub async fn shutdown(&self) {
        if let Resource::Ready(pool) = &self.store {
            if !pool.is_closed() {
                tracing::info!("Closing knowledge store connections");
                pool.close().await;
            }
        }

        if let Resource::Ready(handle) = &self.classifier {
            tracing::info!("Classifier on {} released with the context", handle.device());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::handle::testing::FixedLogits;
    use crate::classifier::vocabulary::{shipped, VOCABULARY_SIZE};
    use crate::classifier::DevicePreference;
    use crate::db::testing::FixtureStore;

    fn stub_handle() -> ClassifierHandle {
        let backend = FixedLogits::new(vec![0.0; VOCABULARY_SIZE]);
        ClassifierHandle::new(Box::new(backend), shipped(), Device::Cpu).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_with_missing_files_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            model_path: dir.path().join("missing.onnx"),
            vocabulary_path: dir.path().join("missing.txt"),
            database_path: dir.path().join("missing.db"),
            device: DevicePreference::Cpu,
            ..Default::default()
        };

        let context = ServiceContext::initialize(&config).await;
        assert!(!context.is_ready());
        assert!(matches!(context.classifier(), Err(ServiceError::ModelUnavailable(_))));
        assert!(matches!(context.store(), Err(ServiceError::StoreDegraded(_))));

        let status = context.classifier_status();
        assert!(!status.loaded);
        assert!(status.reason.unwrap().contains("vocabulary"));

        context.shutdown().await;
    }

    #[tokio::test]
    async fn test_store_ready_classifier_missing() {
        let store = FixtureStore::new().await;
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            model_path: dir.path().join("missing.onnx"),
            database_path: store.path.clone(),
            device: DevicePreference::Cpu,
            ..Default::default()
        };

        let context = ServiceContext::initialize(&config).await;
        assert!(context.store().is_ok());
        match context.classifier() {
            Err(ServiceError::ModelUnavailable(reason)) => assert!(reason.contains("missing.onnx")),
            other => panic!("expected unavailable classifier, got {:?}", other),
        }
        context.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_store() {
        let store = FixtureStore::new().await;
        let pool = store.reader().await;
        let context = ServiceContext::new(Resource::Ready(stub_handle()), Resource::Ready(pool.clone()));
        assert!(context.is_ready());

        context.shutdown().await;
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_through_shared_context() {
        let store = FixtureStore::new().await;
        let pool = store.reader().await;
        let context = std::sync::Arc::new(ServiceContext::new(
            Resource::Ready(stub_handle()),
            Resource::Ready(pool.clone()),
        ));
        let still_shared = context.clone();

        context.shutdown().await;
        assert!(pool.is_closed());
        assert!(still_shared.classifier().is_ok());

        still_shared.shutdown().await;
    }

    #[test]
    fn test_stats() {
        let stats = InferenceStats::default();
        assert_eq!(stats.avg_latency_ms(), 0.0);
        stats.record(Duration::from_millis(4));
        stats.record(Duration::from_millis(6));
        assert_eq!(stats.count(), 2);
        assert!((stats.avg_latency_ms() - 5.0).abs() < 1e-3);
    }
}
