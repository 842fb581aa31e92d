//! HTTP handlers for the background removal API

use super::page;
use super::AppState;
use crate::error::RemovalError;
use crate::models::ModelName;
use crate::types::output_file_name;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// JSON body for error responses
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// API error with an HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unprocessable<S: Into<String>>(message: S) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }
}

impl From<RemovalError> for ApiError {
    fn from(err: RemovalError) -> Self {
        let status = match err {
            RemovalError::Image(_)
            | RemovalError::UnsupportedFormat(_)
            | RemovalError::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Serve the embedded single-page UI
pub async fn index() -> Html<&'static str> {
    Html(page::INDEX_HTML)
}

/// Liveness probe
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// One entry in the model picker
#[derive(Debug, Serialize)]
pub struct ModelEntry {
    name: &'static str,
    description: &'static str,
    cached: bool,
}

/// List selectable models with their cached status
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelEntry>> {
    let entries = ModelName::all()
        .into_iter()
        .map(|model| ModelEntry {
            name: model.as_str(),
            description: model.spec().description,
            cached: state.pool.cache().is_model_cached(model),
        })
        .collect();
    Json(entries)
}

/// Remove the background from an uploaded image
///
/// Multipart fields: `image` (the file), `model` (optional identifier,
/// defaults to the high quality general model), `alpha_matting`
/// (optional, "true"/"on" enables edge refinement). Responds with a
/// transparent PNG named after the upload.
pub async fn remove_background(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let request_id = uuid::Uuid::new_v4();
    let mut image_bytes: Option<Vec<u8>> = None;
    let mut file_name = String::from("image");
    let mut model = ModelName::default();
    let mut alpha_matting = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::unprocessable(format!("Invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "image" => {
                if let Some(name) = field.file_name() {
                    file_name = name.to_owned();
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::unprocessable(format!("Failed to read upload: {e}")))?;
                image_bytes = Some(data.to_vec());
            },
            "model" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::unprocessable(format!("Invalid model field: {e}")))?;
                model = value.parse().map_err(ApiError::from)?;
            },
            "alpha_matting" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::unprocessable(format!("Invalid field: {e}")))?;
                alpha_matting = matches!(value.as_str(), "true" | "on" | "1");
            },
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
            },
        }
    }

    let image_bytes =
        image_bytes.ok_or_else(|| ApiError::unprocessable("No image file in request"))?;
    if image_bytes.is_empty() {
        return Err(ApiError::unprocessable("Uploaded image is empty"));
    }

    tracing::info!(
        request_id = %request_id,
        model = %model,
        alpha_matting,
        upload_bytes = image_bytes.len(),
        file = %file_name,
        "processing removal request"
    );

    let mut result = state
        .pool
        .remove_background(model, alpha_matting, image_bytes)
        .await?;
    let png_bytes = result.to_png_bytes()?;
    let total_ms = result.timings().total_ms;

    tracing::info!(
        request_id = %request_id,
        total_ms,
        output_bytes = png_bytes.len(),
        "removal request complete"
    );

    let download_name = output_file_name(&file_name, model);
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{download_name}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    headers.insert(
        "x-processing-time-ms",
        HeaderValue::from_str(&total_ms.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    Ok((StatusCode::OK, headers, png_bytes).into_response())
}
