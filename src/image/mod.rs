pub mod loader;
pub mod preprocessing;
pub mod postprocessing;

pub use loader::ImageLoader;
pub use preprocessing::{ColorImage, GrayscaleImage, ImagePreprocessor, NormalizedTensor, ScaledImage};
pub use postprocessing::{ClassScore, ClassScores, LabelSet, Prediction, ResultFormatter};
