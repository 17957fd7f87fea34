//! Image classification handler

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;

use crate::classifier::Prediction;
use crate::service;
use crate::{AppError, AppResult, AppState};

/// Multipart field carrying the image
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub filename: Option<String>,
    pub predictions: Vec<Prediction>,
}

/// Classify an uploaded pest photo
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<PredictResponse>> {
    // Refuse before reading the body when no model is loaded
    state.context.classifier()?;
    let mut multipart = multipart?;

    let (filename, bytes) = read_upload(&mut multipart).await?;
    tracing::debug!("Received {:?} ({} bytes)", filename, bytes.len());

    let context = state.context.clone();
    let result = tokio::task::spawn_blocking(move || service::classify_image(&context, &bytes))
        .await
        .map_err(|e| AppError::InferenceFailed(format!("Classification task failed: {}", e)))??;

    Ok(Json(PredictResponse {
        filename,
        predictions: result.predictions,
    }))
}

async fn read_upload(multipart: &mut Multipart) -> AppResult<(Option<String>, Vec<u8>)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        return Ok((filename, bytes.to_vec()));
    }

    Err(AppError::BadRequest(format!("Missing '{}' field in upload", UPLOAD_FIELD)))
}
