use crate::image::{LabelSet, NormalizedTensor};
use crate::models::{Classifier, InferenceBackend, ModelProvider};
use crate::recognition::RecognitionPipeline;
use crate::utils::error::FashionError;
use crate::{Config, Result};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;

/// 全局模型管理器单例
pub struct ModelManager {
    classifier: Arc<Classifier>,
    pipeline: Arc<RecognitionPipeline>,
    config: Config,
}

static MODEL_MANAGER: OnceCell<Arc<Mutex<ModelManager>>> = OnceCell::new();

impl ModelManager {
    /// 初始化全局模型管理器
    pub fn init(config: Config) -> Result<()> {
        tracing::info!("Initializing model manager...");

        let classifier = Arc::new(Classifier::new(&config)?);
        let labels = load_labels(&config)?;
        let pipeline = Arc::new(RecognitionPipeline::new(labels));

        let manager = ModelManager {
            classifier,
            pipeline,
            config,
        };

        MODEL_MANAGER
            .set(Arc::new(Mutex::new(manager)))
            .map_err(|_| FashionError::Internal("Failed to initialize model manager".to_string()))?;

        tracing::info!("Model manager initialized successfully");
        Ok(())
    }

    /// 获取全局模型管理器实例
    pub fn instance() -> Result<Arc<Mutex<ModelManager>>> {
        MODEL_MANAGER
            .get()
            .cloned()
            .ok_or_else(|| FashionError::Internal("Model manager not initialized".to_string()))
    }

    pub fn classifier(&self) -> Arc<Classifier> {
        Arc::clone(&self.classifier)
    }

    pub fn pipeline(&self) -> Arc<RecognitionPipeline> {
        Arc::clone(&self.pipeline)
    }

    /// 获取模型统计信息
    pub fn get_stats(&self) -> ModelStats {
        let (_, height, width) = self.classifier.input_size();
        ModelStats {
            model_path: self.config.model_path().display().to_string(),
            input_shape: [1, height, width],
            num_classes: self.pipeline.labels().len(),
            labels: self.pipeline.labels().clone(),
            intra_threads: self.config.onnx_config.intra_threads,
            optimization_level: self.config.onnx_config.optimization_level,
        }
    }
}

/// 模型健康检查：空白输入推理一次，输出长度须与标签数一致
pub fn verify_model<P: ModelProvider>(
    provider: &P,
    input_size: (usize, usize, usize),
    labels: &LabelSet,
) -> Result<()> {
    tracing::debug!("Performing model health check...");

    let (_, height, width) = input_size;
    let blank = NormalizedTensor::blank(width as u32, height as u32);
    let expected = labels.len();

    let actual = provider
        .with_model(|model: &mut dyn InferenceBackend| model.infer(&blank))?
        .len();

    if actual != expected {
        return Err(FashionError::ShapeMismatch { expected, actual });
    }

    tracing::debug!("Model health check passed");
    Ok(())
}

/// 标签文件存在时优先使用，否则回退到内置Fashion-MNIST标签
pub fn load_labels(config: &Config) -> Result<LabelSet> {
    let labels_path = config.labels_path();
    if labels_path.exists() {
        let labels = LabelSet::load(&labels_path)?;
        tracing::info!("Loaded {} labels from: {}", labels.len(), labels_path.display());
        Ok(labels)
    } else {
        tracing::info!("Label file not found, using built-in Fashion-MNIST labels");
        Ok(LabelSet::fashion_mnist())
    }
}

/// 模型统计信息
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub model_path: String,
    pub input_shape: [usize; 3],
    pub num_classes: usize,
    pub labels: LabelSet,
    pub intra_threads: usize,
    pub optimization_level: i32,
}

/// 便捷函数：获取分类器
pub fn get_classifier() -> Result<Arc<Classifier>> {
    let manager = ModelManager::instance()?;
    let guard = manager.lock();
    Ok(guard.classifier())
}

/// 便捷函数：获取识别流水线
pub fn get_pipeline() -> Result<Arc<RecognitionPipeline>> {
    let manager = ModelManager::instance()?;
    let guard = manager.lock();
    Ok(guard.pipeline())
}

/// 便捷函数：检查模型健康状态
pub fn health_check() -> Result<()> {
    // 推理期间不持有管理器锁
    let (classifier, pipeline) = {
        let manager = ModelManager::instance()?;
        let guard = manager.lock();
        (guard.classifier(), guard.pipeline())
    };
    verify_model(classifier.as_ref(), classifier.input_size(), pipeline.labels())
}

/// 便捷函数：获取模型统计信息
pub fn get_model_stats() -> Result<ModelStats> {
    let manager = ModelManager::instance()?;
    let guard = manager.lock();
    Ok(guard.get_stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// 返回固定长度输出并记录输入形状
    struct CountingModel {
        outputs: usize,
        shapes: RefCell<Vec<(usize, usize, usize)>>,
    }

    impl InferenceBackend for &CountingModel {
        fn infer(&mut self, tensor: &NormalizedTensor) -> Result<Vec<f32>> {
            self.shapes.borrow_mut().push(tensor.shape());
            Ok(vec![0.0; self.outputs])
        }
    }

    impl ModelProvider for CountingModel {
        fn with_model<R, F>(&self, f: F) -> Result<R>
        where
            F: FnOnce(&mut dyn InferenceBackend) -> Result<R>,
        {
            let mut handle = self;
            f(&mut handle)
        }
    }

    #[test]
    fn health_check_runs_blank_input_of_model_size() {
        let model = CountingModel {
            outputs: 10,
            shapes: RefCell::new(Vec::new()),
        };

        verify_model(&model, (1, 28, 28), &LabelSet::fashion_mnist()).unwrap();
        assert_eq!(model.shapes.borrow().as_slice(), &[(1, 28, 28)]);
    }

    #[test]
    fn health_check_reports_label_count_mismatch() {
        let model = CountingModel {
            outputs: 7,
            shapes: RefCell::new(Vec::new()),
        };

        let err = verify_model(&model, (1, 28, 28), &LabelSet::fashion_mnist()).unwrap_err();
        assert!(matches!(err, FashionError::ShapeMismatch { expected: 10, actual: 7 }));
    }

    #[test]
    fn health_check_without_manager_is_internal_error() {
        // 测试进程中从未初始化全局管理器
        assert!(matches!(health_check(), Err(FashionError::Internal(_))));
    }
}
