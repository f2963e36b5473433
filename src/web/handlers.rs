use crate::{
    image::{ClassScore, ClassScores, ColorImage, ImageLoader},
    models::{get_classifier, get_pipeline},
    recognition::{Recognition, RecognitionStats},
    utils::error::FashionError,
    web::extractors::{RequestId, ValidatedJson},
    Config, Result,
};
use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct RecognizeJsonRequest {
    /// Base64编码的图像数据
    pub image: String,

    /// 返回前 k 个类别的排名
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// 识别结果响应
#[derive(Debug, Serialize)]
pub struct RecognitionResponse {
    pub label: String,
    pub score: f32,
    pub class_index: usize,
    /// 按标签顺序的全部置信度
    pub scores: ClassScores,
    /// 按置信度降序的排名
    pub ranking: Vec<ClassScore>,
    pub display_text: String,
    /// 处理耗时（秒）
    pub processing_time: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RecognitionStats>,
}

impl RecognitionResponse {
    fn from_recognition(
        recognition: Recognition,
        top_k: Option<usize>,
        processing_time: f32,
        include_stats: bool,
    ) -> Self {
        let ranking = recognition.top_k(top_k.unwrap_or(recognition.scores.len()));
        let display_text = recognition.display_text();

        Self {
            label: recognition.prediction.label,
            score: recognition.prediction.score,
            class_index: recognition.prediction.index,
            scores: recognition.scores,
            ranking,
            display_text,
            processing_time,
            stats: include_stats.then_some(recognition.stats),
        }
    }
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }

    pub fn error(code: String, message: String, request_id: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError { code, message }),
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

/// JSON base64上传处理器
pub async fn recognize_json_handler(
    State(config): State<Config>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<RecognizeJsonRequest>,
) -> Result<Json<ApiResponse<RecognitionResponse>>> {
    let start_time = Instant::now();

    tracing::info!(
        "Processing JSON recognition request: request_id={}, top_k={:?}",
        request_id,
        request.top_k
    );

    let image = ImageLoader::from_base64(&request.image)?;
    let frame = ImageLoader::to_color_image(image)?;

    let recognition = run_recognition(frame).await?;
    let processing_time = start_time.elapsed().as_secs_f32();

    tracing::info!(
        "JSON recognition completed: request_id={}, label={}, time={:.3}s",
        request_id,
        recognition.prediction.label,
        processing_time
    );

    let response = RecognitionResponse::from_recognition(
        recognition,
        request.top_k,
        processing_time,
        config.dev_mode,
    );
    Ok(Json(ApiResponse::success(response, request_id)))
}

/// Multipart文件上传处理器
pub async fn recognize_upload_handler(
    State(config): State<Config>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<RecognitionResponse>>> {
    let start_time = Instant::now();

    tracing::info!("Processing multipart recognition request: request_id={}", request_id);

    let mut image_data: Option<axum::body::Bytes> = None;
    let mut top_k: Option<usize> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        FashionError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/") {
                        return Err(FashionError::UnsupportedFormat(content_type.to_string()));
                    }
                }

                let data = field.bytes().await.map_err(|e| {
                    FashionError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(FashionError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            "top_k" => {
                let value = field.text().await.unwrap_or_default();
                top_k = Some(parse_top_k(&value)?);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let image_data =
        image_data.ok_or_else(|| FashionError::InvalidInput("No image file provided".to_string()))?;

    let image = ImageLoader::from_bytes(&image_data)?;
    let frame = ImageLoader::to_color_image(image)?;

    let recognition = run_recognition(frame).await?;
    let processing_time = start_time.elapsed().as_secs_f32();

    tracing::info!(
        "Upload recognition completed: request_id={}, label={}, time={:.3}s",
        request_id,
        recognition.prediction.label,
        processing_time
    );

    let response =
        RecognitionResponse::from_recognition(recognition, top_k, processing_time, config.dev_mode);
    Ok(Json(ApiResponse::success(response, request_id)))
}

/// 推理是同步的，放到阻塞线程池执行
async fn run_recognition(frame: ColorImage) -> Result<Recognition> {
    let classifier = get_classifier()?;
    let pipeline = get_pipeline()?;

    tokio::task::spawn_blocking(move || pipeline.recognize(&frame, &classifier))
        .await
        .map_err(|e| FashionError::Internal(format!("Recognition task failed: {}", e)))?
}

pub(crate) fn parse_top_k(value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(k) if k > 0 => Ok(k),
        _ => Err(FashionError::InvalidInput(format!(
            "top_k must be a positive integer, got '{}'",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{LabelSet, ResultFormatter};

    fn sample_recognition() -> Recognition {
        let labels = LabelSet::new(["Coat", "Bag", "Shirt"]);
        let scores = ResultFormatter::to_class_scores(&[0.2, 0.7, 0.1], &labels).unwrap();
        let prediction = ResultFormatter::top_prediction(&scores).unwrap();
        Recognition {
            prediction,
            scores,
            stats: RecognitionStats::default(),
        }
    }

    #[test]
    fn response_carries_prediction_and_ranking() {
        let response = RecognitionResponse::from_recognition(sample_recognition(), Some(2), 0.01, false);

        assert_eq!(response.label, "Bag");
        assert_eq!(response.class_index, 1);
        assert_eq!(response.ranking.len(), 2);
        assert_eq!(response.ranking[1].label, "Coat");
        assert_eq!(response.scores.len(), 3);
        assert_eq!(response.display_text, "Bag\n{Coat=0.2, Bag=0.7, Shirt=0.1}");
        assert!(response.stats.is_none());
    }

    #[test]
    fn response_json_shape() {
        let response = RecognitionResponse::from_recognition(sample_recognition(), None, 0.5, true);
        let json = serde_json::to_value(ApiResponse::success(response, "req-1".to_string())).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["request_id"], "req-1");
        assert_eq!(json["data"]["label"], "Bag");
        assert_eq!(json["data"]["scores"][0]["label"], "Coat");
        assert_eq!(json["data"]["ranking"].as_array().unwrap().len(), 3);
        assert!(json["data"]["stats"].is_object());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn top_k_must_be_positive() {
        assert_eq!(parse_top_k(" 3 ").unwrap(), 3);
        assert!(parse_top_k("0").is_err());
        assert!(parse_top_k("many").is_err());
    }
}
