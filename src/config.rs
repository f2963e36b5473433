use anyhow::Result;
use ort::session::builder::GraphOptimizationLevel;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 模型文件目录
    pub models_dir: PathBuf,

    /// 工作线程数量
    pub workers: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,

    /// 启用图优化
    pub enable_optimization: bool,
}

impl OnnxConfig {
    /// 映射为ORT图优化级别
    pub fn graph_optimization_level(&self) -> GraphOptimizationLevel {
        if !self.enable_optimization {
            return GraphOptimizationLevel::Disable;
        }

        match self.optimization_level {
            i32::MIN..=0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

impl Config {
    pub fn new(
        bind_addr: String,
        models_dir: String,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);
        if workers == 0 {
            anyhow::bail!("worker count must be at least 1");
        }

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
            enable_optimization: true,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 50 * 1024 * 1024, // 50MB
        };

        Ok(Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            workers,
            dev_mode,
            onnx_config,
            server_config,
        })
    }

    /// 获取分类模型路径
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join("fashion/model.onnx")
    }

    /// 获取标签文件路径（可选，不存在时使用内置标签）
    pub fn labels_path(&self) -> PathBuf {
        self.models_dir.join("fashion/labels.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_in_models_dir() {
        let config = Config::new("127.0.0.1:0".into(), "/srv/models".into(), Some(2), false).unwrap();
        assert_eq!(config.model_path(), PathBuf::from("/srv/models/fashion/model.onnx"));
        assert_eq!(config.labels_path(), PathBuf::from("/srv/models/fashion/labels.txt"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.server_config.request_timeout, 60);
    }

    #[test]
    fn dev_mode_extends_timeout() {
        let config = Config::new("127.0.0.1:0".into(), "models".into(), Some(1), true).unwrap();
        assert_eq!(config.server_config.request_timeout, 300);
        assert!(config.dev_mode);
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(Config::new("127.0.0.1:0".into(), "models".into(), Some(0), false).is_err());
    }

    #[test]
    fn optimization_level_mapping() {
        let mut onnx = OnnxConfig {
            intra_threads: 1,
            optimization_level: 1,
            enable_optimization: true,
        };
        assert!(matches!(onnx.graph_optimization_level(), GraphOptimizationLevel::Level1));

        onnx.optimization_level = 7;
        assert!(matches!(onnx.graph_optimization_level(), GraphOptimizationLevel::Level3));

        onnx.enable_optimization = false;
        assert!(matches!(onnx.graph_optimization_level(), GraphOptimizationLevel::Disable));
    }
}
