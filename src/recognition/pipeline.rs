use crate::{
    image::{
        preprocessing::{MODEL_INPUT_HEIGHT, MODEL_INPUT_WIDTH},
        ColorImage, ImagePreprocessor, LabelSet, NormalizedTensor, ResultFormatter,
    },
    models::{InferenceBackend, ModelProvider},
    recognition::{FrameSource, Recognition, RecognitionStage, RecognitionStats},
    Result,
};
use std::time::Instant;

/// 识别流水线：预处理 -> 推理 -> 后处理
#[derive(Debug, Clone)]
pub struct RecognitionPipeline {
    labels: LabelSet,
    input_width: u32,
    input_height: u32,
}

impl RecognitionPipeline {
    pub fn new(labels: LabelSet) -> Self {
        Self {
            labels,
            input_width: MODEL_INPUT_WIDTH,
            input_height: MODEL_INPUT_HEIGHT,
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// 彩色帧 -> 模型输入张量
    pub fn preprocess(&self, frame: &ColorImage) -> Result<NormalizedTensor> {
        ImagePreprocessor::preprocess(frame, self.input_width, self.input_height)
    }

    /// 模型输出 -> 带标签的识别结果
    pub fn postprocess(&self, output: &[f32]) -> Result<Recognition> {
        let scores = ResultFormatter::to_class_scores(output, &self.labels)?;
        let prediction = ResultFormatter::top_prediction(&scores)?;

        Ok(Recognition {
            prediction,
            scores,
            stats: RecognitionStats::default(),
        })
    }

    /// 对单帧执行完整识别，模型句柄仅在推理阶段持有
    pub fn recognize<P: ModelProvider>(&self, frame: &ColorImage, provider: &P) -> Result<Recognition> {
        let mut stats = RecognitionStats::default();

        let stage_start = Instant::now();
        let tensor = self.preprocess(frame)?;
        Self::finish_stage(&mut stats, RecognitionStage::Preprocessing, stage_start);

        let stage_start = Instant::now();
        let output = provider.with_model(|model: &mut dyn InferenceBackend| model.infer(&tensor))?;
        Self::finish_stage(&mut stats, RecognitionStage::Inference, stage_start);

        let stage_start = Instant::now();
        let mut recognition = self.postprocess(&output)?;
        Self::finish_stage(&mut stats, RecognitionStage::Postprocessing, stage_start);

        recognition.stats = stats;

        tracing::info!(
            "Recognition completed: label={}, score={:.4}, total_time={:.3}ms",
            recognition.prediction.label,
            recognition.prediction.score,
            recognition.stats.total_time_ms()
        );
        tracing::debug!(stage = ?RecognitionStage::Completed, "{}", recognition.scores);

        Ok(recognition)
    }

    /// 从帧来源取一帧并识别；没有可用帧时静默跳过
    pub fn recognize_from<S, P>(&self, source: &mut S, provider: &P) -> Result<Option<Recognition>>
    where
        S: FrameSource + ?Sized,
        P: ModelProvider,
    {
        match source.capture() {
            Some(frame) => self.recognize(&frame, provider).map(Some),
            None => {
                tracing::debug!("No frame available, skipping recognition");
                Ok(None)
            }
        }
    }

    fn finish_stage(stats: &mut RecognitionStats, stage: RecognitionStage, started: Instant) {
        let elapsed = started.elapsed();
        stats.record(stage, elapsed);
        tracing::debug!(?stage, "Stage finished in {:?}", elapsed);
    }
}
