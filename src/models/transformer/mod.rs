/// Transformer Config
pub mod config;

/// Transformer encoder-decoder
pub mod model;

pub use config::Config;
pub use model::{Model, ModelRecord};
