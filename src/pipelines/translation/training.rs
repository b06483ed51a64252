use std::path::PathBuf;

use burn::{
    config::Config as _,
    grad_clipping::GradientClippingConfig,
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::{CompactRecorder, FileRecorder, Recorder},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};
use tokio::{fs::File, io::AsyncWriteExt};

use crate::{
    datasets::{Corpus, Vocab},
    models::transformer::{Config as ModelConfig, Model},
};

use super::{
    batcher::Train,
    config::{self, Training},
    loss::{nll_sum, perplexity, LabelSmoothingLoss},
    schedule::{smoothing_for_perplexity, InverseSqrtLrSchedulerConfig, LearningRates},
    Batcher, Loader,
};

/// Batches between progress reports
const LOG_EVERY: usize = 100;

/// Where a training run ended up
#[derive(Clone, Copy, Debug)]
pub struct Summary {
    /// Lowest validation perplexity seen
    pub best_perplexity: f64,

    /// Validation perplexity after the final epoch
    pub last_perplexity: f64,

    /// Accumulated learning rate decay
    pub lr_scale: f64,

    /// Label smoothing in effect at the end
    pub label_smoothing: f64,
}

/// Train for one epoch, returning the updated model and its mean per-token loss
pub fn train_epoch<B, O>(
    mut model: Model<B>,
    optim: &mut O,
    loader: &Loader<B>,
    criterion: &LabelSmoothingLoss,
    rates: &mut LearningRates,
    epoch: usize,
) -> (Model<B>, f64)
where
    B: AutodiffBackend,
    O: Optimizer<Model<B>, B>,
{
    let n_batches = loader.len();
    let mut total_loss = 0.0;

    for (index, batch) in loader.iter(epoch).enumerate() {
        let Train {
            input,
            tgt_input,
            tgt_output,
            n_tokens,
        } = batch;

        // Get log probs
        let log_probs = model.forward(input.src_tokens, input.src_mask_pad, tgt_input);
        let [batch_size, seq_length, vocab_size] = log_probs.dims();

        // Smoothed loss per target token
        let loss = criterion
            .forward(
                log_probs.reshape([batch_size * seq_length, vocab_size]),
                tgt_output.reshape([batch_size * seq_length]),
            )
            .div_scalar(n_tokens.max(1) as f64);

        let loss_value = loss.clone().into_scalar().elem::<f64>();
        total_loss += loss_value;

        // Backprop, then step with the next learning rate. Clipping is applied by the optimizer.
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        let lr = rates.next_lr();
        model = optim.step(lr, model, grads);

        log::debug!(
            "epoch {epoch} batch {}/{n_batches}: loss={loss_value:.3} ppl={:.2} lr={lr:.3e}",
            index + 1,
            loss_value.exp()
        );

        if (index + 1) % LOG_EVERY == 0 {
            log::info!(
                "epoch {epoch} batch {}/{n_batches}: loss={loss_value:.3} ppl={:.2}",
                index + 1,
                loss_value.exp()
            );
        }
    }

    (model, total_loss / n_batches.max(1) as f64)
}

/// Perplexity of the model on a split, over all target tokens except `<sos>` and padding
pub fn evaluate_ppl<B: Backend>(model: &Model<B>, loader: &Loader<B>) -> f64 {
    let mut total_nll = 0.0;
    let mut total_tokens = 0;

    for batch in loader.iter(0) {
        let Train {
            input,
            tgt_input,
            tgt_output,
            n_tokens,
        } = batch;

        let log_probs = model.forward(input.src_tokens, input.src_mask_pad, tgt_input);
        let [batch_size, seq_length, vocab_size] = log_probs.dims();

        let nll = nll_sum(
            log_probs.reshape([batch_size * seq_length, vocab_size]),
            tgt_output.reshape([batch_size * seq_length]),
            model.pad_token_id,
        );

        total_nll += nll.into_scalar().elem::<f64>();
        total_tokens += n_tokens;
    }

    perplexity(total_nll, total_tokens)
}

/// Train a translation model on a prepared corpus
pub async fn train<B: AutodiffBackend>(
    device: B::Device, // Device on which to perform computation (e.g., CPU or CUDA device)
    mut corpus: Corpus, // Vocabulary with training and validation splits
    model_config: ModelConfig, // Model architecture
    config: Training, // Experiment configuration
) -> anyhow::Result<Summary> {
    B::seed(config.seed);

    let artifact_dir = config.artifact_dir.as_str();
    tokio::fs::create_dir_all(artifact_dir)
        .await
        .map_err(|e| anyhow!("Unable to create artifact directory {}: {}", artifact_dir, e))?;

    // Positions past the encoding table cannot be embedded
    let truncated = corpus.truncate(model_config.max_seq_len);
    if truncated > 0 {
        log::warn!(
            "Truncated {} sentence pairs to {} tokens",
            truncated,
            model_config.max_seq_len
        );
    }

    let pad_token_id = corpus.vocab.pad_id();

    // Model
    let model = load_model(model_config.init::<B>(&device), &config, &device)?;
    log::info!("Model has {} parameters", model.num_params());

    // Data loaders
    let train_loader = Loader::new(
        corpus.train_dataset(),
        Batcher::<B>::new(pad_token_id, device.clone()),
        config.token_budget(),
        Some(config.seed),
    );
    let valid_loader = Loader::new(
        corpus.valid_dataset(),
        Batcher::<B::InnerBackend>::new(pad_token_id, device.clone()),
        config.token_budget(),
        None,
    );

    if valid_loader.is_empty() {
        return Err(anyhow!("The validation split is empty"));
    }

    if config.validate_only {
        let valid_ppl = evaluate_ppl(&model.valid(), &valid_loader);
        println!("Validation perplexity: {valid_ppl:.2}");

        return Ok(Summary {
            best_perplexity: valid_ppl,
            last_perplexity: valid_ppl,
            lr_scale: 1.0,
            label_smoothing: config.label_smoothing,
        });
    }

    // Optimizer
    let grad_clipping = if config.clip_grad > 0.0 {
        Some(GradientClippingConfig::Norm(config.clip_grad))
    } else {
        None
    };

    let mut optim = AdamConfig::new()
        .with_beta_1(0.9)
        .with_beta_2(0.98)
        .with_epsilon(1e-8)
        .with_grad_clipping(grad_clipping)
        .init();

    // Learning rate schedule
    let mut rates = if config.inverse_sqrt_schedule {
        LearningRates::scheduled(
            InverseSqrtLrSchedulerConfig::new(config.learning_rate)
                .with_warmup_steps(config.warmup_steps)
                .init(),
        )
    } else {
        LearningRates::constant(config.learning_rate)
    };

    let mut criterion = LabelSmoothingLoss::new(config.label_smoothing, pad_token_id);

    let log_path = config::log_file(artifact_dir);
    let mut log = File::create(&log_path)
        .await
        .map_err(|e| anyhow!("Unable to create training log {}: {}", log_path, e))?;

    let mut model = model;
    let mut best_ppl = f64::INFINITY;
    let mut last_ppl = f64::INFINITY;

    for epoch in 1..=config.n_epochs {
        println!("----- Epoch {epoch} -----");

        let (trained, train_loss) =
            train_epoch(model, &mut optim, &train_loader, &criterion, &mut rates, epoch);
        model = trained;

        let valid_ppl = evaluate_ppl(&model.valid(), &valid_loader);
        last_ppl = valid_ppl;

        log::info!(
            "epoch {epoch}: train loss {train_loss:.3}, valid ppl {valid_ppl:.2}, smoothing {:.2}",
            criterion.smoothing
        );

        if let Some(smoothing) = smoothing_for_perplexity(config.label_smoothing, valid_ppl) {
            criterion = LabelSmoothingLoss::new(smoothing, pad_token_id);
        }

        println!("Validation perplexity: {valid_ppl:.2}");

        log.write_all(format!("{epoch} Validation perplexity: {valid_ppl}\n").as_bytes())
            .await?;
        log.flush().await?;

        if valid_ppl < best_ppl {
            best_ppl = valid_ppl;

            println!("Saving new best model (epoch {epoch} ppl {valid_ppl})");
            save_model(&model, &model_config, &config, &corpus.vocab).await?;
        } else {
            rates.decay(config.lr_decay);

            log::info!("No improvement, learning rate scale now {:.4}", rates.scale());
        }
    }

    Ok(Summary {
        best_perplexity: best_ppl,
        last_perplexity: last_ppl,
        lr_scale: rates.scale(),
        label_smoothing: criterion.smoothing,
    })
}

/// Path of the saved model record, including the recorder's extension
pub fn saved_record<B: Backend>(artifact_dir: &str) -> PathBuf {
    PathBuf::from(config::model_file(artifact_dir))
        .with_extension(<CompactRecorder as FileRecorder<B>>::file_extension())
}

/// Load saved weights into the model, unless there are none or they should be overwritten
fn load_model<B: Backend>(
    model: Model<B>,
    config: &Training,
    device: &B::Device,
) -> anyhow::Result<Model<B>> {
    let model_file = config::model_file(&config.artifact_dir);

    if config.overwrite_model || !saved_record::<B>(&config.artifact_dir).is_file() {
        return Ok(model);
    }

    log::info!("Loading weights from {}", model_file);

    let record = CompactRecorder::new()
        .load(model_file.into(), device)
        .map_err(|e| anyhow!("Unable to load trained model weights: {}", e))?;

    Ok(model.load_record(record))
}

/// Save the model weights along with the configs and vocabulary needed to rebuild it
async fn save_model<B: Backend>(
    model: &Model<B>,
    model_config: &ModelConfig,
    config: &Training,
    vocab: &Vocab,
) -> anyhow::Result<()> {
    let artifact_dir = config.artifact_dir.as_str();

    tokio::fs::write(config::vocab_file(artifact_dir), serde_json::to_vec(vocab)?)
        .await
        .map_err(|e| anyhow!("Unable to save vocabulary: {}", e))?;

    model_config
        .save(config::model_config_file(artifact_dir))
        .map_err(|e| anyhow!("Unable to save model config: {}", e))?;

    config
        .save(config::training_config_file(artifact_dir))
        .map_err(|e| anyhow!("Unable to save training config: {}", e))?;

    CompactRecorder::new()
        .record(
            model.clone().into_record(),
            config::model_file(artifact_dir).into(),
        )
        .map_err(|e| anyhow!("Unable to save model weights: {}", e))?;

    Ok(())
}
