pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{models::ModelManager, utils::error::FashionError, Config, Result};
use axum::{
    extract::DefaultBodyLimit,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

pub async fn serve(config: Config) -> Result<()> {
    // 初始化模型管理器
    ModelManager::init(config.clone())?;

    let app = create_app(config.clone());

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        FashionError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /recognize        - JSON base64 upload");
    tracing::info!("  POST /recognize/upload - Multipart file upload");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  GET  /api/info         - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        FashionError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| FashionError::Internal(format!("Server failed: {}", e)))?;

    Ok(())
}

pub fn create_app(config: Config) -> Router {
    Router::new()
        .route("/recognize", post(handlers::recognize_json_handler))
        .route("/recognize/upload", post(handlers::recognize_upload_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        // 由RequestBodyLimitLayer统一限制请求体大小，关闭axum默认的2MB提取器限制
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server_config.request_timeout)))
        .layer(CorsLayer::permissive())
        .with_state(config)
}

/// 健康检查端点
async fn health_handler() -> Result<Json<serde_json::Value>> {
    // 健康检查会执行一次推理，放到阻塞线程池
    tokio::task::spawn_blocking(crate::models::health_check)
        .await
        .map_err(|e| FashionError::Internal(format!("Health check task failed: {}", e)))??;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// 服务信息端点
async fn info_handler() -> Result<Json<serde_json::Value>> {
    let stats = crate::models::get_model_stats()?;

    Ok(Json(json!({
        "service": "ONNX Fashion Recognition Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": stats,
        "preprocessing": {
            "grayscale": "saturation-zero",
            "scaling": "nearest-neighbor",
            "normalization": "(r + g + b) / 3 / 255"
        }
    })))
}
