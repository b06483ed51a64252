use burn::{
    module::Module,
    nn::{
        attention::generate_autoregressive_mask,
        transformer::{
            TransformerDecoder, TransformerDecoderInput, TransformerEncoder,
            TransformerEncoderInput,
        },
        Dropout, Embedding, Linear, PositionalEncoding,
    },
    tensor::{activation::log_softmax, backend::Backend, Bool, Distribution, Int, Tensor},
};

/// Encoder-decoder Transformer over a shared vocabulary
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    /// Token embeddings shared by the encoder and decoder
    pub embedding: Embedding<B>,

    /// Sinusoidal position information
    pub positional: PositionalEncoding<B>,

    /// The encoder stack
    pub encoder: TransformerEncoder<B>,

    /// The decoder stack
    pub decoder: TransformerDecoder<B>,

    /// Projection from hidden states to vocabulary logits
    pub output: Linear<B>,

    /// Dropout applied to the embeddings
    pub dropout: Dropout,

    /// Probability of replacing an input token with `<unk>` while training
    pub word_dropout: f64,

    /// Size of the embeddings
    pub embed_dim: usize,

    /// The padding token ID
    pub pad_token_id: usize,

    /// The unknown token ID
    pub unk_token_id: usize,
}

/// Define model behavior
impl<B: Backend> Model<B> {
    /// Log-probabilities over the vocabulary for each target position:
    /// [batch_size, tgt_length, vocab_size]
    pub fn forward(
        &self,
        src_tokens: Tensor<B, 2, Int>,
        src_mask_pad: Tensor<B, 2, Bool>,
        tgt_input: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let memory = self.encode(src_tokens, src_mask_pad.clone());

        self.decode(memory, src_mask_pad, tgt_input)
    }

    /// Run the encoder: [batch_size, src_length, embed_dim]
    pub fn encode(
        &self,
        src_tokens: Tensor<B, 2, Int>,
        src_mask_pad: Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let embedded = self.embed(src_tokens);

        self.encoder
            .forward(TransformerEncoderInput::new(embedded).mask_pad(src_mask_pad))
    }

    /// Run the decoder over encoder states, with a causal mask on the target
    pub fn decode(
        &self,
        memory: Tensor<B, 3>,
        src_mask_pad: Tensor<B, 2, Bool>,
        tgt_input: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, tgt_length] = tgt_input.dims();
        let device = tgt_input.device();

        let tgt_mask_pad = tgt_input.clone().equal_elem(self.pad_token_id as i64);
        let tgt_mask_attn = generate_autoregressive_mask::<B>(batch_size, tgt_length, &device);

        let embedded = self.embed(tgt_input);

        let input = TransformerDecoderInput::new(embedded, memory)
            .target_mask_pad(tgt_mask_pad)
            .target_mask_attn(tgt_mask_attn)
            .memory_mask_pad(src_mask_pad);

        let hidden = self.decoder.forward(input);

        log_softmax(self.output.forward(hidden), 2)
    }

    fn embed(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let tokens = self.drop_words(tokens);

        let embedded = self
            .embedding
            .forward(tokens)
            .mul_scalar((self.embed_dim as f64).sqrt());

        self.dropout.forward(self.positional.forward(embedded))
    }

    /// Replace non-padding tokens with `<unk>` at the word dropout rate. Only active when the
    /// backend tracks gradients.
    pub(crate) fn drop_words(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2, Int> {
        if !B::ad_enabled() || self.word_dropout <= 0.0 {
            return tokens;
        }

        let device = tokens.device();
        let is_pad = tokens.clone().equal_elem(self.pad_token_id as i64);

        let dropped = Tensor::<B, 2>::random(
            tokens.shape(),
            Distribution::Bernoulli(self.word_dropout),
            &device,
        )
        .equal_elem(1.0);

        tokens
            .clone()
            .mask_fill(dropped, self.unk_token_id as i64)
            .mask_where(is_pad, tokens)
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::Data,
    };
    use pretty_assertions::assert_eq;

    use crate::{models::transformer::Config, utils::tensors::to_rows};

    use super::*;

    type B = NdArray;

    fn tiny_config() -> Config {
        Config::new(12, 0, 1)
            .with_n_layers(1)
            .with_n_heads(2)
            .with_embed_dim(8)
            .with_hidden_dim(16)
            .with_max_seq_len(32)
    }

    fn tokens<B: Backend>(rows: [[i64; 4]; 2], device: &B::Device) -> Tensor<B, 2, Int> {
        Tensor::from_data(Data::<i64, 2>::from(rows).convert::<B::IntElem>(), device)
    }

    #[test]
    fn forward_returns_log_probabilities() {
        let device = Default::default();
        let model = tiny_config().init::<B>(&device);

        let src = tokens::<B>([[2, 5, 6, 3], [2, 7, 3, 0]], &device);
        let src_mask_pad = src.clone().equal_elem(0);
        let tgt = tokens::<B>([[2, 8, 9, 10], [2, 4, 0, 0]], &device);

        let log_probs = model.forward(src, src_mask_pad, tgt);
        assert_eq!(log_probs.dims(), [2, 4, 12]);

        let totals = log_probs.exp().sum_dim(2).into_data().convert::<f32>().value;
        for total in totals {
            assert!((total - 1.0).abs() < 1e-4, "distribution sums to {total}");
        }
    }

    #[test]
    fn word_dropout_is_inactive_without_autodiff() {
        let device = Default::default();
        let model = tiny_config().with_word_dropout(1.0).init::<B>(&device);

        let input = tokens::<B>([[2, 5, 6, 3], [2, 7, 3, 0]], &device);

        assert_eq!(
            to_rows(model.drop_words(input)),
            vec![vec![2, 5, 6, 3], vec![2, 7, 3, 0]]
        );
    }

    #[test]
    fn word_dropout_keeps_padding() {
        let device = Default::default();
        let model = tiny_config()
            .with_word_dropout(1.0)
            .init::<Autodiff<B>>(&device);

        let input = tokens::<Autodiff<B>>([[2, 5, 6, 3], [2, 7, 3, 0]], &device);

        assert_eq!(
            to_rows(model.drop_words(input)),
            vec![vec![1, 1, 1, 1], vec![1, 1, 1, 0]]
        );
    }
}
