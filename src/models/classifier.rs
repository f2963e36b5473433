use crate::image::preprocessing::{MODEL_INPUT_HEIGHT, MODEL_INPUT_WIDTH};
use crate::image::NormalizedTensor;
use crate::models::backend::{InferenceBackend, ModelProvider};
use crate::utils::error::FashionError;
use crate::{Config, Result};
use ort::{inputs, session::Session, value::Tensor};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Instant;

pub struct Classifier {
    session: Arc<Mutex<Session>>,
    input_name: String,  // 动态发现的输入名称
    output_name: String, // 动态发现的输出名称
    input_size: (usize, usize, usize), // (N, H, W)
}

impl Classifier {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = config.model_path();

        if !model_path.exists() {
            return Err(FashionError::ModelLoad(format!(
                "Classification model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading classification model from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(config.onnx_config.graph_optimization_level())?
            .with_intra_threads(config.onnx_config.intra_threads)?
            .commit_from_file(&model_path)?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(FashionError::ModelLoad(
                    "Classification model has no inputs".to_string(),
                ))
            }
        };

        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(FashionError::ModelLoad(
                    "Classification model has no outputs".to_string(),
                ))
            }
        };

        tracing::info!(
            "Classification model ready: input='{}', output='{}'",
            input_name,
            output_name
        );
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
            input_size: (1, MODEL_INPUT_HEIGHT as usize, MODEL_INPUT_WIDTH as usize),
        })
    }

    /// 模型输入形状 (N, H, W)
    pub fn input_size(&self) -> (usize, usize, usize) {
        self.input_size
    }

    /// 获取模型句柄，句柄drop时释放会话锁
    pub fn lease(&self) -> ModelLease<'_> {
        ModelLease {
            session: self.session.lock(),
            input_name: &self.input_name,
            output_name: &self.output_name,
            input_size: self.input_size,
            acquired_at: Instant::now(),
        }
    }
}

impl ModelProvider for Classifier {
    fn with_model<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn InferenceBackend) -> Result<R>,
    {
        let mut lease = self.lease();
        f(&mut lease)
    }
}

/// 单次推理期间持有的模型句柄
pub struct ModelLease<'a> {
    session: MutexGuard<'a, Session>,
    input_name: &'a str,
    output_name: &'a str,
    input_size: (usize, usize, usize),
    acquired_at: Instant,
}

impl InferenceBackend for ModelLease<'_> {
    fn infer(&mut self, tensor: &NormalizedTensor) -> Result<Vec<f32>> {
        if tensor.shape() != self.input_size {
            return Err(FashionError::InvalidInput(format!(
                "Model expects input shape {:?}, got {:?}",
                self.input_size,
                tensor.shape()
            )));
        }

        let input_tensor = Tensor::from_array(tensor.to_array()?)?;
        let input_name = self.input_name;
        let output_name = self.output_name;

        let outputs = self.session.run(inputs![input_name => input_tensor])?;
        let scores = match outputs.get(output_name) {
            Some(output) => output.try_extract_array::<f32>()?.iter().copied().collect(),
            None => {
                let available_outputs: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                return Err(FashionError::Inference(format!(
                    "Classification output '{}' not found. Available outputs: {:?}",
                    output_name, available_outputs
                )));
            }
        };

        Ok(scores)
    }
}

impl Drop for ModelLease<'_> {
    fn drop(&mut self) {
        tracing::trace!("Model lease released after {:?}", self.acquired_at.elapsed());
    }
}
