//! Integration tests for the web API
//!
//! Runs the axum router against a session pool backed by a mock-free
//! processor factory: the cache is pre-seeded and the processor uses a
//! trivial backend substitute, so no downloads or ONNX Runtime are needed.

#![cfg(feature = "web")]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use detourage::inference::InferenceBackend;
use detourage::web::{router, AppState};
use detourage::{
    BackgroundRemover, ModelCache, ModelInfo, ModelName, PreprocessingConfig, RemovalConfig,
    SessionPool,
};
use ndarray::Array4;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// Minimal backend: everything is foreground
struct AllForegroundBackend {
    initialized: bool,
}

impl InferenceBackend for AllForegroundBackend {
    fn initialize(
        &mut self,
        _config: &RemovalConfig,
    ) -> detourage::Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> detourage::Result<Array4<f32>> {
        let (batch, _, height, width) = input.dim();
        let mut output = Array4::<f32>::zeros((batch, 1, height, width));
        output.fill(1.0);
        // One background pixel so min-max normalization has a range
        output[[0, 0, 0, 0]] = 0.0;
        Ok(output)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, 320, 320)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, 320, 320)
    }

    fn get_preprocessing_config(&self) -> detourage::Result<PreprocessingConfig> {
        Ok(ModelName::U2net.spec().preprocessing.clone())
    }

    fn get_model_info(&self) -> detourage::Result<ModelInfo> {
        Ok(ModelInfo {
            name: "test".to_owned(),
            size_bytes: 1,
            input_shape: self.input_shape(),
            output_shape: self.output_shape(),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

fn test_app(dir: &TempDir) -> Router {
    let cache = ModelCache::with_dir(dir.path()).unwrap();
    for model in ModelName::all() {
        std::fs::write(cache.model_path(model), b"seed").unwrap();
    }
    let pool = SessionPool::with_factory(
        RemovalConfig::default(),
        cache,
        Box::new(|config| {
            BackgroundRemover::with_backend(
                config,
                Box::new(AllForegroundBackend { initialized: false }),
            )
        }),
    )
    .unwrap();
    router(AppState::new(Arc::new(pool)))
}

fn png_upload() -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::ImageBuffer::from_pixel(
        20,
        10,
        image::Rgb([10u8, 20, 30]),
    ));
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Noise-filled PNG that compresses poorly, so the encoded file exceeds
/// axum's stock 2 MB body limit
fn large_png_upload() -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::ImageBuffer::from_fn(1500, 1500, |x, y| {
        let mut h = x.wrapping_mul(0x9E37_79B9) ^ y.wrapping_mul(0x85EB_CA6B);
        h ^= h >> 13;
        h = h.wrapping_mul(0xC2B2_AE35);
        image::Rgb([(h & 0xFF) as u8, ((h >> 8) & 0xFF) as u8, ((h >> 16) & 0xFF) as u8])
    }));
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

const BOUNDARY: &str = "test-boundary-7f4a";

fn multipart_body(image: Option<&[u8]>, model: Option<&str>, alpha_matting: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(image) = image {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"image\"; filename=\"photo.png\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(image);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(model) = model {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"model\"\r\n\r\n");
        body.extend_from_slice(model.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some(flag) = alpha_matting {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"alpha_matting\"\r\n\r\n");
        body.extend_from_slice(flag.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn remove_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/remove")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn healthz_responds_ok() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn index_serves_html() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Remove background"));
    assert!(html.contains("Alpha matting"));
}

#[tokio::test]
async fn model_list_contains_all_five() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let response = app
        .oneshot(Request::builder().uri("/api/models").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let models: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(models.len(), 5);

    let names: Vec<&str> = models.iter().map(|m| m["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"u2net"));
    assert!(names.contains(&"isnet-general-use"));
    assert!(names.contains(&"u2net_human_seg"));
    assert!(names.contains(&"silueta"));
    assert!(names.contains(&"isnet-anime"));
    // The cache was seeded, every model reports as cached
    assert!(models.iter().all(|m| m["cached"].as_bool().unwrap()));
}

#[tokio::test]
async fn remove_returns_named_png_with_timing() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let body = multipart_body(Some(&png_upload()), Some("u2net"), Some("false"));
    let response = app.oneshot(remove_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(
        disposition,
        "attachment; filename=\"photo_u2net_no_bg.png\""
    );
    assert!(response.headers().contains_key("x-processing-time-ms"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!(decoded.width(), 20);
    assert_eq!(decoded.height(), 10);
    // Output carries an alpha channel
    assert!(decoded.color().has_alpha());
}

#[tokio::test]
async fn upload_over_two_megabytes_is_accepted() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let png = large_png_upload();
    assert!(png.len() > 2 * 1024 * 1024);
    assert!(png.len() < 25 * 1024 * 1024);

    let body = multipart_body(Some(&png), Some("u2net"), None);
    let response = app.oneshot(remove_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn remove_defaults_to_isnet_general_use() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let body = multipart_body(Some(&png_upload()), None, None);
    let response = app.oneshot(remove_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.contains("photo_isnet-general-use_no_bg.png"));
}

#[tokio::test]
async fn unknown_model_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let body = multipart_body(Some(&png_upload()), Some("not-a-model"), None);
    let response = app.oneshot(remove_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(error["error"].as_str().unwrap().contains("not-a-model"));
}

#[tokio::test]
async fn missing_image_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let body = multipart_body(None, Some("u2net"), None);
    let response = app.oneshot(remove_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn undecodable_upload_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let body = multipart_body(Some(b"definitely not an image"), Some("u2net"), None);
    let response = app.oneshot(remove_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn alpha_matting_flag_is_honored() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let body = multipart_body(Some(&png_upload()), Some("u2net"), Some("true"));
    let response = app.oneshot(remove_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
