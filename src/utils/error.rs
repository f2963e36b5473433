use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FashionError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Shape mismatch: expected {expected} scores, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("No class scores to rank")]
    EmptyScores,

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl FashionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FashionError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            FashionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FashionError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            FashionError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            FashionError::Base64(_) => StatusCode::BAD_REQUEST,
            FashionError::Json(_) => StatusCode::BAD_REQUEST,
            FashionError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            FashionError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            FashionError::InvalidImage(_) => "INVALID_IMAGE",
            FashionError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            FashionError::EmptyScores => "EMPTY_SCORES",
            FashionError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            FashionError::Inference(_) => "INFERENCE_ERROR",
            FashionError::InvalidInput(_) => "INVALID_INPUT",
            FashionError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            FashionError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            FashionError::Config(_) => "CONFIG_ERROR",
            FashionError::Io(_) => "IO_ERROR",
            FashionError::Json(_) => "JSON_ERROR",
            FashionError::Base64(_) => "BASE64_DECODE_ERROR",
            FashionError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            FashionError::Ort(_) => "ORT_ERROR",
            FashionError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for FashionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        tracing::error!("Request failed: {} ({})", self, status);

        (status, axum::Json(error_response)).into_response()
    }
}
