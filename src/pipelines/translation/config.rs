use burn::LearningRate;

use super::loader::TokenBudget;

/// Define configuration struct for the experiment
#[derive(burn::config::Config)]
pub struct Training {
    /// Random seed for weight initialization, dropout and batch shuffling
    #[config(default = 11731)]
    pub seed: u64,

    /// Number of epochs
    #[config(default = 15)]
    pub n_epochs: usize,

    /// Initial learning rate, or the peak rate when using the inverse square root schedule
    #[config(default = 4e-2)]
    pub learning_rate: LearningRate,

    /// Learning rate multiplier applied when validation perplexity does not improve
    #[config(default = 0.8)]
    pub lr_decay: f64,

    /// Use the inverse square root schedule with warmup
    #[config(default = false)]
    pub inverse_sqrt_schedule: bool,

    /// Warmup steps for the inverse square root schedule
    #[config(default = 2000)]
    pub warmup_steps: usize,

    /// Maximum gradient norm, disabled when not positive
    #[config(default = 1.0)]
    pub clip_grad: f32,

    /// Maximum padded tokens per batch
    #[config(default = 8000)]
    pub tokens_per_batch: usize,

    /// Maximum sentence pairs per batch
    #[config(default = 128)]
    pub samples_per_batch: usize,

    /// Initial label smoothing
    #[config(default = 0.1)]
    pub label_smoothing: f64,

    /// The location of the top-level data directory
    #[config(default = "\"data\".to_string()")]
    pub data_dir: String,

    /// Where the model, its configs and the training log are written
    #[config(default = "\"artifacts\".to_string()")]
    pub artifact_dir: String,

    /// Only report validation perplexity of the existing model
    #[config(default = false)]
    pub validate_only: bool,

    /// Start from fresh weights even if a saved model exists
    #[config(default = false)]
    pub overwrite_model: bool,
}

impl Training {
    /// The batch size limits
    pub fn token_budget(&self) -> TokenBudget {
        TokenBudget::new(self.samples_per_batch, self.tokens_per_batch)
    }
}

/// Path of the model record, without the recorder's extension
pub fn model_file(artifact_dir: &str) -> String {
    format!("{artifact_dir}/model")
}

/// Path of the model architecture config
pub fn model_config_file(artifact_dir: &str) -> String {
    format!("{artifact_dir}/config.json")
}

/// Path of the saved training config
pub fn training_config_file(artifact_dir: &str) -> String {
    format!("{artifact_dir}/training.json")
}

/// Path of the vocabulary the model was trained with
pub fn vocab_file(artifact_dir: &str) -> String {
    format!("{artifact_dir}/vocab.json")
}

/// Path of the per-epoch validation log
pub fn log_file(artifact_dir: &str) -> String {
    format!("{artifact_dir}/log.txt")
}
