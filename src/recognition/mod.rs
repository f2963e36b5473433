pub mod pipeline;
pub mod source;
pub mod types;

pub use pipeline::RecognitionPipeline;
pub use source::{FrameSource, StillFrame};
pub use types::{Recognition, RecognitionStage, RecognitionStats};
