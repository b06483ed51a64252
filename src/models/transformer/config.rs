use burn::{
    nn::{
        transformer::{TransformerDecoderConfig, TransformerEncoderConfig},
        DropoutConfig, EmbeddingConfig, LinearConfig, PositionalEncodingConfig,
    },
    tensor::backend::Backend,
};

use crate::datasets::Vocab;

use super::Model;

/// The Model Configuration
#[derive(burn::config::Config)]
pub struct Config {
    /// Size of the shared source/target vocabulary
    pub vocab_size: usize,

    /// The padding token ID
    pub pad_token_id: usize,

    /// The unknown token ID, used for word dropout
    pub unk_token_id: usize,

    /// Number of encoder layers, and of decoder layers
    #[config(default = 4)]
    pub n_layers: usize,

    /// Number of attention heads
    #[config(default = 4)]
    pub n_heads: usize,

    /// Size of the token embeddings and hidden states
    #[config(default = 512)]
    pub embed_dim: usize,

    /// Size of the position-wise feed-forward layers
    #[config(default = 512)]
    pub hidden_dim: usize,

    /// Dropout rate
    #[config(default = 0.1)]
    pub dropout: f64,

    /// Probability of replacing an input token with `<unk>` while training
    #[config(default = 0.1)]
    pub word_dropout: f64,

    /// Longest sequence the positional encoding covers
    #[config(default = 1024)]
    pub max_seq_len: usize,
}

impl Config {
    /// A config sized for the given vocabulary
    pub fn for_vocab(vocab: &Vocab) -> Self {
        Self::new(vocab.len(), vocab.pad_id(), vocab.unk_id())
    }

    /// Initializes a Transformer with random weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.embed_dim).init(device);

        let positional = PositionalEncodingConfig::new(self.embed_dim)
            .with_max_sequence_size(self.max_seq_len)
            .init(device);

        let encoder = TransformerEncoderConfig::new(
            self.embed_dim,
            self.hidden_dim,
            self.n_heads,
            self.n_layers,
        )
        .with_dropout(self.dropout)
        .with_norm_first(true)
        .init(device);

        let decoder = TransformerDecoderConfig::new(
            self.embed_dim,
            self.hidden_dim,
            self.n_heads,
            self.n_layers,
        )
        .with_dropout(self.dropout)
        .with_norm_first(true)
        .init(device);

        let output = LinearConfig::new(self.embed_dim, self.vocab_size).init(device);

        Model {
            embedding,
            positional,
            encoder,
            decoder,
            output,
            dropout: DropoutConfig::new(self.dropout).init(),
            word_dropout: self.word_dropout,
            embed_dim: self.embed_dim,
            pad_token_id: self.pad_token_id,
            unk_token_id: self.unk_token_id,
        }
    }
}
