use crate::image::NormalizedTensor;
use crate::Result;

/// 单次前向推理：输入 (1, H, W) 张量，返回每个类别一个分数
pub trait InferenceBackend {
    fn infer(&mut self, tensor: &NormalizedTensor) -> Result<Vec<f32>>;
}

/// 模型句柄的作用域管理
///
/// 实现方在调用 `f` 前获取句柄，并在返回前释放，无论 `f` 成功与否。
pub trait ModelProvider {
    fn with_model<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn InferenceBackend) -> Result<R>;
}

impl<P: ModelProvider> ModelProvider for std::sync::Arc<P> {
    fn with_model<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn InferenceBackend) -> Result<R>,
    {
        (**self).with_model(f)
    }
}
