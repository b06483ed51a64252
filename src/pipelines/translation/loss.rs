use burn::tensor::{backend::Backend, Int, Tensor};
use derive_new::new;

use crate::utils::tensors::non_pad_weights;

/// Label-smoothed loss: the KL divergence between a smoothed one-hot target distribution and the
/// model's distribution, summed over every non-padding position.
///
/// The target distribution puts `1 - smoothing` on the gold token and spreads `smoothing` evenly
/// over the remaining `vocab_size - 1` tokens, following OpenNMT.
#[derive(Clone, Copy, Debug, new)]
pub struct LabelSmoothingLoss {
    /// Probability mass moved away from the gold token
    pub smoothing: f64,

    /// Positions with this target contribute nothing
    pub pad_token_id: usize,
}

impl LabelSmoothingLoss {
    /// Compute the summed loss.
    ///
    /// - log_probs: [n_positions, vocab_size]
    /// - targets: [n_positions]
    pub fn forward<B: Backend>(
        &self,
        log_probs: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        let [n_positions, vocab_size] = log_probs.dims();
        let device = log_probs.device();

        let (confidence, smoothing_value) = self.target_masses(vocab_size);

        let one_hot = Tensor::<B, 2>::zeros([n_positions, vocab_size], &device).scatter(
            1,
            targets.clone().reshape([n_positions, 1]),
            Tensor::ones([n_positions, 1], &device),
        );

        let weights = non_pad_weights(targets, self.pad_token_id);

        let target_probs = one_hot
            .mul_scalar(confidence - smoothing_value)
            .add_scalar(smoothing_value)
            .mul(weights.clone().reshape([n_positions, 1]));

        // KL(p || q) = sum p ln p - sum p ln q, where the first term is the same for every row
        let cross_entropy = target_probs.mul(log_probs).sum().neg();
        let negative_entropy = weights.sum().mul_scalar(self.negative_entropy(vocab_size));

        cross_entropy.add(negative_entropy)
    }

    /// Probability of the gold token and of each other token
    fn target_masses(&self, vocab_size: usize) -> (f64, f64) {
        let smoothing_value = if vocab_size > 1 {
            self.smoothing / (vocab_size - 1) as f64
        } else {
            0.0
        };

        (1.0 - self.smoothing, smoothing_value)
    }

    /// sum p ln p for a single row of the target distribution
    fn negative_entropy(&self, vocab_size: usize) -> f64 {
        let (confidence, smoothing_value) = self.target_masses(vocab_size);

        x_ln_x(confidence) + vocab_size.saturating_sub(1) as f64 * x_ln_x(smoothing_value)
    }
}

fn x_ln_x(x: f64) -> f64 {
    if x > 0.0 {
        x * x.ln()
    } else {
        0.0
    }
}

/// Summed negative log likelihood of the targets, ignoring padding
///
/// - log_probs: [n_positions, vocab_size]
/// - targets: [n_positions]
pub fn nll_sum<B: Backend>(
    log_probs: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    pad_token_id: usize,
) -> Tensor<B, 1> {
    let [n_positions, _] = log_probs.dims();

    let picked = log_probs
        .gather(1, targets.clone().reshape([n_positions, 1]))
        .reshape([n_positions]);

    picked.mul(non_pad_weights(targets, pad_token_id)).sum().neg()
}

/// Perplexity from a summed negative log likelihood
pub fn perplexity(total_nll: f64, n_tokens: usize) -> f64 {
    if n_tokens == 0 {
        return f64::INFINITY;
    }

    (total_nll / n_tokens as f64).exp()
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::NdArray,
        tensor::{activation::log_softmax, Data, ElementConversion},
    };

    use super::*;

    type B = NdArray;

    fn close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    fn inputs() -> (Tensor<B, 2>, Tensor<B, 1, Int>) {
        let device = Default::default();

        let logits = Tensor::<B, 2>::from_data(
            Data::from([
                [0.2f32, 1.5, -0.3, 0.9],
                [1.1, -0.4, 0.0, 2.0],
                [0.3, 0.3, 0.3, 0.3],
            ]),
            &device,
        );
        let targets = Tensor::<B, 1, Int>::from_data(Data::from([1i64, 3, 0]), &device);

        (log_softmax(logits, 1), targets)
    }

    fn scalar(tensor: Tensor<B, 1>) -> f64 {
        tensor.into_scalar().elem::<f64>()
    }

    #[test]
    fn without_smoothing_the_loss_is_the_nll() {
        let (log_probs, targets) = inputs();

        let loss = LabelSmoothingLoss::new(0.0, 0).forward(log_probs.clone(), targets.clone());
        let nll = nll_sum(log_probs, targets, 0);

        close(scalar(loss), scalar(nll));
    }

    #[test]
    fn padding_positions_are_ignored() {
        let (log_probs, targets) = inputs();

        let all = LabelSmoothingLoss::new(0.1, 0).forward(log_probs.clone(), targets.clone());
        let first_two = LabelSmoothingLoss::new(0.1, 0).forward(
            log_probs.slice([0..2, 0..4]),
            targets.slice([0..2]),
        );

        close(scalar(all), scalar(first_two));
    }

    #[test]
    fn matching_the_smoothed_distribution_costs_nothing() {
        let device = Default::default();

        // 0.7 on the gold token, 0.1 on the other three
        let probs = Tensor::<B, 2>::from_data(Data::from([[0.1f32, 0.7, 0.1, 0.1]]), &device);
        let targets = Tensor::<B, 1, Int>::from_data(Data::from([1i64]), &device);

        let loss = LabelSmoothingLoss::new(0.3, 0).forward(probs.log(), targets);

        close(scalar(loss), 0.0);
    }

    #[test]
    fn smoothing_matches_the_kl_divergence() {
        let (log_probs, targets) = inputs();
        let smoothing = 0.2;

        let loss = LabelSmoothingLoss::new(smoothing, 0).forward(log_probs.clone(), targets);

        let rows = log_probs.into_data().convert::<f64>().value;
        let mut expected = 0.0;
        for (row, gold) in [(0, 1), (1, 3)] {
            for class in 0..4 {
                let p: f64 = if class == gold { 1.0 - smoothing } else { smoothing / 3.0 };
                expected += p * (p.ln() - rows[row * 4 + class]);
            }
        }

        close(scalar(loss), expected);
    }

    #[test]
    fn perplexity_of_uniform_guessing_is_the_vocabulary_size() {
        close(perplexity(10.0 * 4f64.ln(), 10), 4.0);
        assert!(perplexity(1.0, 0).is_infinite());
    }
}
