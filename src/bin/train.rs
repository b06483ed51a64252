//! Command line tool to train a translation model

use anyhow::anyhow;
use burn::backend::{libtorch::LibTorchDevice, Autodiff, LibTorch};
use burn_nmt::{
    cli::{Language, LanguagePair},
    datasets::Corpus,
    models::transformer,
    pipelines::translation::{self, Training},
};
use pico_args::Arguments;

const HELP: &str = "\
Usage: train [OPTIONS]

Options:
  -h, --help                 Print help
  --seed                     Random seed (defaults to 11731)
  --src                      Source language: af, ts, nso or en (defaults to 'en')
  --tgt                      Target language: af, ts, nso or en (defaults to 'af')
  -d, --data-dir             The path to the top-level data directory (defaults to 'data')
  -a, --artifact-dir         Where the model and training log are written (defaults to 'artifacts')
  --overwrite-model          Start from fresh weights even if a saved model exists
  --overwrite-data           Rebuild the cached corpus
  --cuda                     Train on the first CUDA device
  --validate-only            Only report the validation perplexity of the saved model

Model:
  --n-layers                 Encoder and decoder layers (defaults to 4)
  --n-heads                  Attention heads (defaults to 4)
  --embed-dim                Embedding size (defaults to 512)
  --hidden-dim               Feed-forward size (defaults to 512)
  --dropout                  Dropout rate (defaults to 0.1)
  --word-dropout             Rate at which input tokens are replaced with <unk> (defaults to 0.1)

Optimization:
  -n, --n-epochs             Number of epochs to train for (defaults to 15)
  --lr                       Learning rate (defaults to 4e-2)
  --lr-decay                 Learning rate multiplier when validation stalls (defaults to 0.8)
  --inverse-sqrt-schedule    Use an inverse square root schedule with warmup
  --warmup-steps             Warmup steps for the schedule (defaults to 2000)
  --clip-grad                Maximum gradient norm, 0 to disable (defaults to 1.0)
  --tokens-per-batch         Maximum padded tokens per batch (defaults to 8000)
  --samples-per-batch        Maximum sentence pairs per batch (defaults to 128)
  --label-smoothing          Initial label smoothing (defaults to 0.1)
";

#[derive(Debug)]
struct Args {
    seed: Option<u64>,
    src: String,
    tgt: String,
    data_dir: Option<String>,
    artifact_dir: Option<String>,
    overwrite_model: bool,
    overwrite_data: bool,
    cuda: bool,
    validate_only: bool,
    n_layers: Option<usize>,
    n_heads: Option<usize>,
    embed_dim: Option<usize>,
    hidden_dim: Option<usize>,
    dropout: Option<f64>,
    word_dropout: Option<f64>,
    n_epochs: Option<usize>,
    lr: Option<f64>,
    lr_decay: Option<f64>,
    inverse_sqrt_schedule: bool,
    warmup_steps: Option<usize>,
    clip_grad: Option<f32>,
    tokens_per_batch: Option<usize>,
    samples_per_batch: Option<usize>,
    label_smoothing: Option<f64>,
}

impl Args {
    fn parse() -> anyhow::Result<Option<Self>> {
        let mut pargs = Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let args = Args {
            seed: pargs.opt_value_from_str("--seed")?,
            src: pargs
                .opt_value_from_str("--src")?
                .unwrap_or_else(|| "en".to_string()),
            tgt: pargs
                .opt_value_from_str("--tgt")?
                .unwrap_or_else(|| "af".to_string()),
            data_dir: pargs.opt_value_from_str(["-d", "--data-dir"])?,
            artifact_dir: pargs.opt_value_from_str(["-a", "--artifact-dir"])?,
            overwrite_model: pargs.contains("--overwrite-model"),
            overwrite_data: pargs.contains("--overwrite-data"),
            cuda: pargs.contains("--cuda"),
            validate_only: pargs.contains("--validate-only"),
            n_layers: pargs.opt_value_from_str("--n-layers")?,
            n_heads: pargs.opt_value_from_str("--n-heads")?,
            embed_dim: pargs.opt_value_from_str("--embed-dim")?,
            hidden_dim: pargs.opt_value_from_str("--hidden-dim")?,
            dropout: pargs.opt_value_from_str("--dropout")?,
            word_dropout: pargs.opt_value_from_str("--word-dropout")?,
            n_epochs: pargs.opt_value_from_str(["-n", "--n-epochs"])?,
            lr: pargs.opt_value_from_str("--lr")?,
            lr_decay: pargs.opt_value_from_str("--lr-decay")?,
            inverse_sqrt_schedule: pargs.contains("--inverse-sqrt-schedule"),
            warmup_steps: pargs.opt_value_from_str("--warmup-steps")?,
            clip_grad: pargs.opt_value_from_str("--clip-grad")?,
            tokens_per_batch: pargs.opt_value_from_str("--tokens-per-batch")?,
            samples_per_batch: pargs.opt_value_from_str("--samples-per-batch")?,
            label_smoothing: pargs.opt_value_from_str("--label-smoothing")?,
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(anyhow!("Unexpected arguments: {:?}", remaining));
        }

        Ok(Some(args))
    }

    /// Apply the optimization flags over the defaults
    fn training(&self) -> Training {
        let mut config = Training::new()
            .with_overwrite_model(self.overwrite_model)
            .with_validate_only(self.validate_only)
            .with_inverse_sqrt_schedule(self.inverse_sqrt_schedule);

        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.to_string();
        }

        if let Some(artifact_dir) = &self.artifact_dir {
            config.artifact_dir = artifact_dir.to_string();
        }

        if let Some(n_epochs) = self.n_epochs {
            config.n_epochs = n_epochs;
        }

        if let Some(lr) = self.lr {
            config.learning_rate = lr;
        }

        if let Some(lr_decay) = self.lr_decay {
            config.lr_decay = lr_decay;
        }

        if let Some(warmup_steps) = self.warmup_steps {
            config.warmup_steps = warmup_steps;
        }

        if let Some(clip_grad) = self.clip_grad {
            config.clip_grad = clip_grad;
        }

        if let Some(tokens_per_batch) = self.tokens_per_batch {
            config.tokens_per_batch = tokens_per_batch;
        }

        if let Some(samples_per_batch) = self.samples_per_batch {
            config.samples_per_batch = samples_per_batch;
        }

        if let Some(label_smoothing) = self.label_smoothing {
            config.label_smoothing = label_smoothing;
        }

        config
    }

    /// Apply the architecture flags over the defaults for a vocabulary
    fn model(&self, corpus: &Corpus) -> transformer::Config {
        let mut config = transformer::Config::for_vocab(&corpus.vocab);

        if let Some(n_layers) = self.n_layers {
            config.n_layers = n_layers;
        }

        if let Some(n_heads) = self.n_heads {
            config.n_heads = n_heads;
        }

        if let Some(embed_dim) = self.embed_dim {
            config.embed_dim = embed_dim;
        }

        if let Some(hidden_dim) = self.hidden_dim {
            config.hidden_dim = hidden_dim;
        }

        if let Some(dropout) = self.dropout {
            config.dropout = dropout;
        }

        if let Some(word_dropout) = self.word_dropout {
            config.word_dropout = word_dropout;
        }

        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    let pair = LanguagePair::new(
        Language::try_from(args.src.as_str())?,
        Language::try_from(args.tgt.as_str())?,
    )?;

    let config = args.training();

    log::info!("Loading {} corpus from {}", pair, config.data_dir);
    let corpus = Corpus::load(&config.data_dir, &pair, args.overwrite_data).await?;
    log::info!(
        "Vocabulary of {} tokens, {} training and {} validation pairs",
        corpus.vocab.len(),
        corpus.train.len(),
        corpus.valid.len()
    );

    let model_config = args.model(&corpus);

    let device = if args.cuda {
        LibTorchDevice::Cuda(0)
    } else {
        LibTorchDevice::Cpu
    };

    let summary =
        translation::train::<Autodiff<LibTorch>>(device, corpus, model_config, config).await?;

    log::info!(
        "Best validation perplexity: {:.2}, learning rate scale {:.4}, label smoothing {:.2}",
        summary.best_perplexity,
        summary.lr_scale,
        summary.label_smoothing
    );

    Ok(())
}
