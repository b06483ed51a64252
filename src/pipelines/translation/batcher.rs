use std::fmt::Debug;

use burn::{
    data::dataloader,
    nn::attention::generate_padding_mask,
    tensor::{backend::Backend, Bool, Int, Tensor},
};
use derive_new::new;

use crate::{datasets::parallel::Item, utils::tensors::pad_to};

/// An inference batch for translation
#[derive(Debug, Clone, new)]
pub struct Infer<B: Backend> {
    /// Source token ids as 2D tensor: [batch_size, src_length]
    pub src_tokens: Tensor<B, 2, Int>,

    /// Padding mask for the source containing booleans for padding locations
    pub src_mask_pad: Tensor<B, 2, Bool>,
}

/// A training batch for translation
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Encoder input
    pub input: Infer<B>,

    /// Decoder input, every target token but the last: [batch_size, tgt_length - 1]
    pub tgt_input: Tensor<B, 2, Int>,

    /// Prediction targets, every target token but `<sos>`: [batch_size, tgt_length - 1]
    pub tgt_output: Tensor<B, 2, Int>,

    /// Number of real target tokens, excluding `<sos>` and padding
    pub n_tokens: usize,
}

/// Struct for batching sentence pairs
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// ID of the padding token
    pub pad_token_id: usize,

    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,
}

/// Implement Batcher trait for Batcher struct for inference
impl<B: Backend> dataloader::batcher::Batcher<Vec<usize>, Infer<B>> for Batcher<B> {
    /// Collects encoded source sentences into an inference batch
    fn batch(&self, items: Vec<Vec<usize>>) -> Infer<B> {
        let padding = generate_padding_mask(self.pad_token_id, items, None, &self.device);

        Infer {
            src_tokens: padding.tensor,
            src_mask_pad: padding.mask,
        }
    }
}

/// Implement Batcher trait for Batcher struct for training
impl<B: Backend> dataloader::batcher::Batcher<Item, Train<B>> for Batcher<B> {
    /// Collects sentence pairs into a training batch
    fn batch(&self, items: Vec<Item>) -> Train<B> {
        let batch_size = items.len();

        let mut source_list = Vec::with_capacity(batch_size);
        let mut input_list = Vec::with_capacity(batch_size);
        let mut output_list = Vec::with_capacity(batch_size);

        for item in items {
            let length = item.target_ids.len();

            // Teacher forcing: position i predicts token i + 1
            input_list.push(item.target_ids[..length.saturating_sub(1)].to_vec());
            output_list.push(item.target_ids.into_iter().skip(1).collect::<Vec<_>>());
            source_list.push(item.source_ids);
        }

        let n_tokens = output_list.iter().map(Vec::len).sum();
        let seq_length = output_list.iter().map(Vec::len).max().unwrap_or(0);

        let input: Infer<B> = self.batch(source_list);

        Train {
            input,
            tgt_input: pad_to::<B>(self.pad_token_id, input_list, seq_length, &self.device),
            tgt_output: pad_to::<B>(self.pad_token_id, output_list, seq_length, &self.device),
            n_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _};
    use pretty_assertions::assert_eq;

    use crate::utils::tensors::to_rows;

    use super::*;

    type B = NdArray;

    fn item(source_ids: Vec<usize>, target_ids: Vec<usize>) -> Item {
        Item::new(String::new(), String::new(), source_ids, target_ids)
    }

    #[test]
    fn shifts_targets_for_teacher_forcing() {
        let batcher = Batcher::<B>::new(0, Default::default());

        let batch: Train<B> = batcher.batch(vec![
            item(vec![2, 7, 3], vec![2, 4, 5, 6, 3]),
            item(vec![2, 8, 9, 10, 3], vec![2, 4, 3]),
        ]);

        assert_eq!(batch.input.src_tokens.dims(), [2, 5]);
        assert_eq!(
            to_rows(batch.tgt_input),
            vec![vec![2, 4, 5, 6], vec![2, 4, 0, 0]]
        );
        assert_eq!(
            to_rows(batch.tgt_output),
            vec![vec![4, 5, 6, 3], vec![4, 3, 0, 0]]
        );
        assert_eq!(batch.n_tokens, 6);
    }

    #[test]
    fn masks_source_padding() {
        let batcher = Batcher::<B>::new(0, Default::default());

        let batch: Infer<B> = batcher.batch(vec![vec![2, 5, 3], vec![2, 3]]);

        let mask = batch.src_mask_pad.into_data().value;
        assert_eq!(mask, vec![false, false, false, false, false, true]);
    }
}
