use async_trait::async_trait;

use crate::cli::LanguagePair;

/// Shared source/target vocabulary
pub mod vocab;

/// Parallel corpus splits
pub mod parallel;

/// Prepared and cached corpora
pub mod corpus;

/// Corpus cleaning helpers
pub mod cleaning;

pub use corpus::Corpus;
pub use vocab::Vocab;

/// A dataset which can be loaded from a split of a parallel corpus
#[async_trait]
pub trait LoadableDataset<I>: burn::data::dataset::Dataset<I> {
    /// Load the dataset from `{prefix}.{src}` and `{prefix}.{tgt}`
    async fn load(vocab: &Vocab, prefix: &str, pair: &LanguagePair) -> anyhow::Result<Self>
    where
        Self: std::marker::Sized;
}

/// Dataset Error
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    /// Source and target files have different line counts
    #[error("parallel files are misaligned: {0} source lines, {1} target lines")]
    Misaligned(usize, usize),

    /// A split has no sentence pairs
    #[error("no sentence pairs found in {0}")]
    Empty(String),

    /// The corpus cache could not be decoded
    #[error("unable to decode corpus cache {0}: {1}")]
    Cache(String, String),
}
