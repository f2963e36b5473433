use crate::image::{ClassScore, ClassScores, Prediction, ResultFormatter};
use serde::Serialize;
use std::time::Duration;

/// 识别处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionStage {
    Preprocessing,
    Inference,
    Postprocessing,
    Completed,
}

/// 各阶段耗时统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecognitionStats {
    pub preprocess_time_ms: f64,
    pub inference_time_ms: f64,
    pub postprocess_time_ms: f64,
}

impl RecognitionStats {
    pub fn record(&mut self, stage: RecognitionStage, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        match stage {
            RecognitionStage::Preprocessing => self.preprocess_time_ms = ms,
            RecognitionStage::Inference => self.inference_time_ms = ms,
            RecognitionStage::Postprocessing => self.postprocess_time_ms = ms,
            RecognitionStage::Completed => {}
        }
    }

    pub fn total_time_ms(&self) -> f64 {
        self.preprocess_time_ms + self.inference_time_ms + self.postprocess_time_ms
    }
}

/// 一次完整识别的结果
#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    /// 最高置信度的类别
    pub prediction: Prediction,
    /// 按标签顺序的全部置信度
    pub scores: ClassScores,
    /// 处理耗时统计
    pub stats: RecognitionStats,
}

impl Recognition {
    /// 显示文本
    pub fn display_text(&self) -> String {
        ResultFormatter::format_display(&self.prediction, &self.scores)
    }

    pub fn top_k(&self, k: usize) -> Vec<ClassScore> {
        ResultFormatter::top_k(&self.scores, k)
    }
}
