//! Sequence-to-sequence translation: batching, loss, learning rate schedule, the training loop
//! and greedy inference.

/// Batches of sentence pairs
pub mod batcher;

/// Experiment configuration and artifact paths
pub mod config;

/// Greedy decoding
pub mod inference;

/// Length-bucketed batch loading
pub mod loader;

/// Label smoothing and perplexity
pub mod loss;

/// Learning rate and label smoothing schedules
pub mod schedule;

/// Training and evaluation loops
pub mod training;

pub use batcher::Batcher;
pub use config::Training;
pub use inference::{greedy, translate};
pub use loader::{Loader, TokenBudget};
pub use loss::LabelSmoothingLoss;
pub use training::{evaluate_ppl, saved_record, train, train_epoch, Summary};
