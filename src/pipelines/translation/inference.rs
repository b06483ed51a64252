use burn::{
    config::Config as _,
    data::dataloader::batcher::Batcher as _,
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::{backend::Backend, Int, Tensor},
};

use crate::{
    datasets::Vocab,
    models::transformer::{Config as ModelConfig, Model},
    utils::tensors::to_rows,
};

use super::{batcher::Infer, config, Batcher};

/// BPE continuation marker
static BPE_MARKER: &str = "@@";

/// Greedy decoding for a batch of sources. Returns the generated ids for each row, without
/// `<sos>` or `<eos>`.
pub fn greedy<B: Backend>(
    model: &Model<B>,
    input: Infer<B>,
    sos_token_id: usize,
    eos_token_id: usize,
    max_len: usize,
) -> Vec<Vec<usize>> {
    let [batch_size, _] = input.src_tokens.dims();
    let device = input.src_tokens.device();

    let memory = model.encode(input.src_tokens, input.src_mask_pad.clone());

    let mut tokens = Tensor::<B, 2, Int>::full([batch_size, 1], sos_token_id as i64, &device);
    let mut outputs = vec![Vec::new(); batch_size];
    let mut finished = vec![false; batch_size];

    for _ in 0..max_len {
        let log_probs = model.decode(memory.clone(), input.src_mask_pad.clone(), tokens.clone());
        let [_, length, _] = log_probs.dims();

        let next = log_probs
            .slice([0..batch_size, length - 1..length])
            .argmax(2)
            .reshape([batch_size, 1]);

        for (row, ids) in to_rows(next.clone()).into_iter().enumerate() {
            if finished[row] {
                continue;
            }

            match ids.first() {
                Some(id) if *id != eos_token_id => outputs[row].push(*id),
                _ => finished[row] = true,
            }
        }

        if finished.iter().all(|done| *done) {
            break;
        }

        tokens = Tensor::cat(vec![tokens, next], 1);
    }

    outputs
}

/// Join BPE pieces back into words
pub fn desegment<S: AsRef<str>>(tokens: &[S]) -> String {
    let joined = tokens
        .iter()
        .map(|token| token.as_ref())
        .collect::<Vec<_>>()
        .join(" ");

    let marker = format!("{BPE_MARKER} ");

    joined
        .replace(&marker, "")
        .trim_end_matches(BPE_MARKER)
        .to_string()
}

/// Translate source lines with a trained model from `artifact_dir`
pub async fn translate<B: Backend>(
    device: &B::Device,
    artifact_dir: &str,
    lines: &[String],
    max_len: usize,
    batch_size: usize,
) -> anyhow::Result<Vec<String>> {
    let model_config = ModelConfig::load(config::model_config_file(artifact_dir))
        .map_err(|e| anyhow!("Unable to load model config: {}", e))?;

    let vocab: Vocab = serde_json::from_slice(
        &tokio::fs::read(config::vocab_file(artifact_dir))
            .await
            .map_err(|e| anyhow!("Unable to read vocabulary: {}", e))?,
    )?;

    let record = CompactRecorder::new()
        .load(config::model_file(artifact_dir).into(), device)
        .map_err(|e| anyhow!("Unable to load trained model weights: {}", e))?;

    let model = model_config.init::<B>(device).load_record(record);

    log::info!("Loaded model with {} parameters", model.num_params());

    // Positions beyond the encoding table cannot be embedded
    let max_len = max_len.min(model_config.max_seq_len.saturating_sub(1));

    let batcher = Batcher::<B>::new(vocab.pad_id(), device.clone());
    let mut translations = Vec::with_capacity(lines.len());

    for chunk in lines.chunks(batch_size.max(1)) {
        let sources = chunk
            .iter()
            .map(|line| {
                let mut ids = vocab.encode(line);
                ids.truncate(model_config.max_seq_len);
                ids
            })
            .collect::<Vec<_>>();

        let input: Infer<B> = batcher.batch(sources);

        for ids in greedy(&model, input, vocab.sos_id(), vocab.eos_id(), max_len) {
            translations.push(desegment(&vocab.decode(&ids)));
        }

        log::debug!("Translated {}/{} lines", translations.len(), lines.len());
    }

    Ok(translations)
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;

    type B = NdArray;

    #[test]
    fn desegments_bpe_pieces() {
        assert_eq!(desegment(&["die", "ka@@", "t", "sit"]), "die kat sit");
        assert_eq!(desegment(&["hond@@", "e@@", "huis"]), "hondehuis");
        assert_eq!(desegment(&["trailing@@"]), "trailing");
        assert_eq!(desegment::<&str>(&[]), "");
    }

    fn model() -> Model<B> {
        ModelConfig::new(12, 0, 1)
            .with_n_layers(1)
            .with_n_heads(2)
            .with_embed_dim(8)
            .with_hidden_dim(16)
            .with_max_seq_len(32)
            .init(&Default::default())
    }

    #[test]
    fn greedy_decoding_respects_the_length_limit() {
        let model = model();
        let batcher = Batcher::<B>::new(0, Default::default());
        let input: Infer<B> = batcher.batch(vec![vec![2, 5, 6, 3], vec![2, 7, 3]]);

        // An out of range end token is never produced, so every row runs to the limit
        let outputs = greedy(&model, input, 2, 99, 5);

        assert_eq!(outputs.len(), 2);
        for ids in outputs {
            assert_eq!(ids.len(), 5);
            assert!(ids.iter().all(|id| *id < 12));
        }
    }

    #[test]
    fn greedy_decoding_stops_at_the_end_token() {
        let model = model();
        let batcher = Batcher::<B>::new(0, Default::default());
        let input: Infer<B> = batcher.batch(vec![vec![2, 5, 6, 3]]);

        // Whatever the model emits first becomes the end token
        let first = greedy(&model, input.clone(), 2, 99, 1)[0][0];
        let outputs = greedy(&model, input, 2, first, 10);

        assert_eq!(outputs, vec![Vec::<usize>::new()]);
    }
}
