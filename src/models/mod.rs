pub mod backend;
pub mod classifier;
pub mod manager;

pub use backend::{InferenceBackend, ModelProvider};
pub use classifier::{Classifier, ModelLease};
pub use manager::{ModelManager, ModelStats};

// Re-export convenience functions from manager
pub use manager::{
    get_classifier, get_model_stats, get_pipeline, health_check, load_labels,
    verify_model,
};
