//! Liveness and health handlers

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::lifecycle::ClassifierStatus;
use crate::models::Pest;
use crate::AppState;

#[derive(Serialize)]
pub struct StoreStatus {
    connected: bool,
    pest_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    classifier: ClassifierStatus,
    store: StoreStatus,
}

/// Static acknowledgement
pub async fn home() -> Json<Value> {
    Json(json!({ "message": "API is running." }))
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let context = &state.context;

    let store = match context.store() {
        Ok(pool) => match Pest::count(pool).await {
            Ok(count) => StoreStatus { connected: true, pest_count: Some(count), reason: None },
            Err(e) => StoreStatus { connected: false, pest_count: None, reason: Some(e.to_string()) },
        },
        Err(_) => StoreStatus {
            connected: false,
            pest_count: None,
            reason: context.store_reason().map(str::to_string),
        },
    };

    let classifier = context.classifier_status();
    let status = if classifier.loaded && store.connected { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        classifier,
        store,
    })
}
