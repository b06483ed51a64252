use std::sync::Arc;

use burn::{
    data::{dataloader::batcher::Batcher as _, dataset::Dataset},
    tensor::backend::Backend,
};
use derive_new::new;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::datasets::parallel::Item;

use super::{batcher::Train, Batcher};

/// Limits on the size of a batch
#[derive(Clone, Copy, Debug, new)]
pub struct TokenBudget {
    /// Maximum number of sentence pairs in a batch
    pub max_sentences: usize,

    /// Maximum number of padded tokens in a batch, counted as sentences times the longest side
    pub max_tokens: usize,
}

impl TokenBudget {
    /// Group indices into batches of similar length. `lengths` holds the (source, target) token
    /// counts of each item. A sentence longer than the budget gets a batch of its own.
    pub fn plan(&self, lengths: &[(usize, usize)]) -> Vec<Vec<usize>> {
        let max_sentences = self.max_sentences.max(1);

        let mut order: Vec<usize> = (0..lengths.len()).collect();
        order.sort_by_key(|&index| lengths[index]);

        let mut batches = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut longest = 0;

        for index in order {
            let (src_length, tgt_length) = lengths[index];
            let length = src_length.max(tgt_length);
            let padded = (current.len() + 1) * longest.max(length);

            if !current.is_empty() && (current.len() >= max_sentences || padded > self.max_tokens) {
                batches.push(std::mem::take(&mut current));
                longest = 0;
            }

            current.push(index);
            longest = longest.max(length);
        }

        if !current.is_empty() {
            batches.push(current);
        }

        batches
    }
}

/// Serves length-bucketed training batches for a parallel corpus split
pub struct Loader<B: Backend> {
    dataset: Arc<dyn Dataset<Item>>,
    batcher: Batcher<B>,
    batches: Vec<Vec<usize>>,
    shuffle: Option<u64>,
}

impl<B: Backend> Loader<B> {
    /// Plan batches for a dataset. With a shuffle seed, batch order changes every epoch.
    pub fn new<D: Dataset<Item> + 'static>(
        dataset: D,
        batcher: Batcher<B>,
        budget: TokenBudget,
        shuffle: Option<u64>,
    ) -> Self {
        let lengths: Vec<(usize, usize)> = (0..dataset.len())
            .filter_map(|index| dataset.get(index))
            .map(|item| (item.source_ids.len(), item.target_ids.len()))
            .collect();

        let batches = budget.plan(&lengths);

        Self {
            dataset: Arc::new(dataset),
            batcher,
            batches,
            shuffle,
        }
    }

    /// Number of batches per epoch
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the split produced no batches
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// The batch order for an epoch
    fn order(&self, epoch: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.batches.len()).collect();

        if let Some(seed) = self.shuffle {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }

        order
    }

    /// Iterate over the batches of an epoch
    pub fn iter(&self, epoch: usize) -> impl Iterator<Item = Train<B>> + '_ {
        self.order(epoch).into_iter().map(move |batch| {
            let items = self.batches[batch]
                .iter()
                .filter_map(|index| self.dataset.get(*index))
                .collect::<Vec<_>>();

            self.batcher.batch(items)
        })
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use crate::datasets::parallel;

    use super::*;

    #[test]
    fn batches_respect_the_budget() {
        let lengths = vec![(3, 4), (10, 9), (4, 4), (2, 3), (5, 6), (4, 5)];
        let batches = TokenBudget::new(2, 12).plan(&lengths);

        assert_eq!(batches, vec![vec![3, 0], vec![2, 5], vec![4], vec![1]]);

        for batch in &batches {
            let longest = batch
                .iter()
                .map(|i| lengths[*i].0.max(lengths[*i].1))
                .max()
                .unwrap();
            assert!(batch.len() == 1 || batch.len() * longest <= 12);
        }
    }

    #[test]
    fn oversized_sentences_still_get_a_batch() {
        let batches = TokenBudget::new(8, 5).plan(&[(20, 30), (1, 1)]);

        assert_eq!(batches, vec![vec![1], vec![0]]);
    }

    #[test]
    fn every_item_appears_exactly_once() {
        let lengths: Vec<(usize, usize)> = (0..50).map(|i| (i % 7 + 2, i % 5 + 2)).collect();
        let mut seen: Vec<usize> = TokenBudget::new(4, 30)
            .plan(&lengths)
            .into_iter()
            .flatten()
            .collect();
        seen.sort();

        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    fn loader(shuffle: Option<u64>) -> Loader<NdArray> {
        let items = (0..6)
            .map(|i| Item::new(String::new(), String::new(), vec![2; i + 2], vec![2; i + 2]))
            .collect();

        Loader::new(
            parallel::Dataset::from_items(items),
            Batcher::new(0, Default::default()),
            TokenBudget::new(1, 100),
            shuffle,
        )
    }

    #[test]
    fn shuffling_is_seeded_per_epoch() {
        let shuffled = loader(Some(7));

        assert_eq!(shuffled.len(), 6);
        assert_eq!(shuffled.order(1), shuffled.order(1));

        let mut order = shuffled.order(2);
        order.sort();
        assert_eq!(order, (0..6).collect::<Vec<_>>());

        assert_eq!(loader(None).order(3), (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn serves_batches_in_length_order() {
        let lengths: Vec<usize> = loader(None)
            .iter(0)
            .map(|batch| batch.input.src_tokens.dims()[1])
            .collect();

        assert_eq!(lengths, vec![2, 3, 4, 5, 6, 7]);
    }
}
