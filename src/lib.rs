pub mod config;
pub mod image;
pub mod models;
pub mod recognition;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use recognition::{Recognition, RecognitionPipeline};
pub use utils::error::FashionError;

pub type Result<T> = std::result::Result<T, FashionError>;
