//! End-to-end tests for the recognition pipeline with in-memory model backends.
//!
//! Tests cover:
//! - Label alignment and top prediction through the full pipeline
//! - Scoped model handles released on success and on failure
//! - Absent frames short-circuiting before the model is touched
//! - Preprocessing invariants on camera-sized frames

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};
use onnx_fashion::{
    image::{LabelSet, NormalizedTensor},
    models::{Classifier, InferenceBackend, ModelProvider},
    recognition::{RecognitionPipeline, StillFrame},
    Config, FashionError,
};
use std::cell::{Cell, RefCell};

const SAMPLE_OUTPUT: [f32; 10] = [0.9, 0.05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.05];

/// Returns a fixed output vector and records every tensor it was given.
struct FixedModel {
    output: Vec<f32>,
    acquired: Cell<usize>,
    released: Cell<usize>,
    seen: RefCell<Vec<NormalizedTensor>>,
}

impl FixedModel {
    fn new(output: &[f32]) -> Self {
        Self {
            output: output.to_vec(),
            acquired: Cell::new(0),
            released: Cell::new(0),
            seen: RefCell::new(Vec::new()),
        }
    }
}

struct FixedHandle<'a> {
    model: &'a FixedModel,
}

impl InferenceBackend for FixedHandle<'_> {
    fn infer(&mut self, tensor: &NormalizedTensor) -> onnx_fashion::Result<Vec<f32>> {
        self.model.seen.borrow_mut().push(tensor.clone());
        Ok(self.model.output.clone())
    }
}

impl Drop for FixedHandle<'_> {
    fn drop(&mut self) {
        self.model.released.set(self.model.released.get() + 1);
    }
}

impl ModelProvider for FixedModel {
    fn with_model<R, F>(&self, f: F) -> onnx_fashion::Result<R>
    where
        F: FnOnce(&mut dyn InferenceBackend) -> onnx_fashion::Result<R>,
    {
        self.acquired.set(self.acquired.get() + 1);
        let mut handle = FixedHandle { model: self };
        f(&mut handle)
    }
}

/// Always fails inference.
struct BrokenModel {
    released: Cell<usize>,
}

struct BrokenHandle<'a>(&'a Cell<usize>);

impl InferenceBackend for BrokenHandle<'_> {
    fn infer(&mut self, _tensor: &NormalizedTensor) -> onnx_fashion::Result<Vec<f32>> {
        Err(FashionError::Inference("backend unavailable".to_string()))
    }
}

impl Drop for BrokenHandle<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

impl ModelProvider for BrokenModel {
    fn with_model<R, F>(&self, f: F) -> onnx_fashion::Result<R>
    where
        F: FnOnce(&mut dyn InferenceBackend) -> onnx_fashion::Result<R>,
    {
        let mut handle = BrokenHandle(&self.released);
        f(&mut handle)
    }
}

fn camera_frame(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8, 255])
    })
}

#[test]
fn test_recognize_aligns_labels_with_output() -> Result<()> {
    let pipeline = RecognitionPipeline::new(LabelSet::fashion_mnist());
    let model = FixedModel::new(&SAMPLE_OUTPUT);

    let recognition = pipeline.recognize(&camera_frame(640, 480), &model)?;

    assert_eq!(recognition.prediction.label, "T-shirt/top");
    assert_eq!(recognition.prediction.score, 0.9);
    assert_eq!(recognition.scores.get("T-shirt/top"), Some(0.9));
    assert_eq!(recognition.scores.get("Ankle boot"), Some(0.05));
    assert_eq!(
        recognition.display_text(),
        "T-shirt/top\n{T-shirt/top=0.9, Trouser=0.05, Pullover=0.0, Dress=0.0, Coat=0.0, \
         Sandal=0.0, Shirt=0.0, Sneaker=0.0, Bag=0.0, Ankle boot=0.05}"
    );

    // The model only ever sees (1, 28, 28) input
    let seen = model.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].shape(), (1, 28, 28));
    assert_eq!(seen[0].len(), 784);
    assert!(seen[0].values().iter().all(|v| (0.0..=1.0).contains(v)));

    Ok(())
}

#[test]
fn test_model_released_after_success() -> Result<()> {
    let pipeline = RecognitionPipeline::new(LabelSet::fashion_mnist());
    let model = FixedModel::new(&SAMPLE_OUTPUT);

    for _ in 0..3 {
        pipeline.recognize(&camera_frame(32, 32), &model)?;
    }

    assert_eq!(model.acquired.get(), 3);
    assert_eq!(model.released.get(), 3);
    Ok(())
}

#[test]
fn test_model_released_after_inference_failure() -> Result<()> {
    let pipeline = RecognitionPipeline::new(LabelSet::fashion_mnist());
    let model = BrokenModel {
        released: Cell::new(0),
    };

    let err = pipeline
        .recognize(&camera_frame(28, 28), &model)
        .err()
        .ok_or_else(|| anyhow!("broken model should fail"))?;

    assert!(matches!(err, FashionError::Inference(_)));
    assert_eq!(model.released.get(), 1);
    Ok(())
}

#[test]
fn test_wrong_output_length_is_shape_mismatch() -> Result<()> {
    let pipeline = RecognitionPipeline::new(LabelSet::fashion_mnist());
    let model = FixedModel::new(&SAMPLE_OUTPUT[..9]);

    let err = pipeline
        .recognize(&camera_frame(28, 28), &model)
        .err()
        .ok_or_else(|| anyhow!("9 scores for 10 labels should fail"))?;

    assert!(matches!(err, FashionError::ShapeMismatch { expected: 10, actual: 9 }));
    assert_eq!(model.released.get(), 1);
    Ok(())
}

#[test]
fn test_absent_frame_skips_model() -> Result<()> {
    let pipeline = RecognitionPipeline::new(LabelSet::fashion_mnist());
    let model = FixedModel::new(&SAMPLE_OUTPUT);

    let result = pipeline.recognize_from(&mut StillFrame::empty(), &model)?;
    assert!(result.is_none());

    let mut camera = || -> Option<RgbaImage> { None };
    assert!(pipeline.recognize_from(&mut camera, &model)?.is_none());

    assert_eq!(model.acquired.get(), 0);
    Ok(())
}

#[test]
fn test_frame_source_feeds_pipeline() -> Result<()> {
    let pipeline = RecognitionPipeline::new(LabelSet::fashion_mnist());
    let model = FixedModel::new(&SAMPLE_OUTPUT);
    let mut source = StillFrame::new(camera_frame(100, 60));

    let recognition = pipeline
        .recognize_from(&mut source, &model)?
        .ok_or_else(|| anyhow!("frame was available"))?;
    assert_eq!(recognition.prediction.index, 0);

    // A still frame is consumed by the first capture
    assert!(pipeline.recognize_from(&mut source, &model)?.is_none());
    assert_eq!(model.acquired.get(), 1);
    Ok(())
}

#[test]
fn test_zero_area_frame_never_reaches_model() -> Result<()> {
    let pipeline = RecognitionPipeline::new(LabelSet::fashion_mnist());
    let model = FixedModel::new(&SAMPLE_OUTPUT);

    let err = pipeline
        .recognize(&RgbaImage::new(0, 0), &model)
        .err()
        .ok_or_else(|| anyhow!("zero-area frame should fail"))?;

    assert!(matches!(err, FashionError::InvalidImage(_)));
    assert_eq!(model.acquired.get(), 0);
    Ok(())
}

#[test]
fn test_preprocess_is_deterministic_for_camera_frames() -> Result<()> {
    let pipeline = RecognitionPipeline::new(LabelSet::fashion_mnist());
    let frame = camera_frame(1280, 720);

    let first = pipeline.preprocess(&frame)?;
    let second = pipeline.preprocess(&frame)?;

    assert_eq!(first.len(), 784);
    assert!(first
        .values()
        .iter()
        .zip(second.values())
        .all(|(a, b)| a.to_bits() == b.to_bits()));
    Ok(())
}

#[test]
fn test_custom_labels_follow_output_order() -> Result<()> {
    let labels = LabelSet::parse("left\nright\n")?;
    let pipeline = RecognitionPipeline::new(labels);

    let recognition = pipeline.postprocess(&[0.25, 0.75])?;
    assert_eq!(recognition.prediction.label, "right");
    assert_eq!(recognition.display_text(), "right\n{left=0.25, right=0.75}");
    Ok(())
}

#[test]
fn test_missing_model_file_reports_model_load() -> Result<()> {
    let config = Config::new(
        "127.0.0.1:0".to_string(),
        "/nonexistent/models".to_string(),
        Some(1),
        false,
    )?;

    match Classifier::new(&config) {
        Err(FashionError::ModelLoad(msg)) => assert!(msg.contains("model.onnx")),
        Err(other) => return Err(anyhow!("unexpected error: {other}")),
        Ok(_) => return Err(anyhow!("model should not load")),
    }
    Ok(())
}
