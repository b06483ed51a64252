//! Command line tool to translate with a trained model

use burn::backend::{libtorch::LibTorchDevice, LibTorch};
use burn_nmt::{pipelines::translation, utils::files::read_file};
use pico_args::Arguments;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Usage: translate [INPUT] [OPTIONS]

Arguments:
  INPUT                BPE-segmented source sentences, one per line (defaults to stdin)

Options:
  -h, --help           Print help
  -a, --artifact-dir   The directory of the trained model (defaults to 'artifacts')
  -m, --max-len        Maximum tokens generated per sentence (defaults to 200)
  -b, --batch-size     Sentences decoded together (defaults to 32)
  --cuda               Decode on the first CUDA device
";

#[derive(Debug)]
struct Args {
    /// Source file, or stdin when absent
    input: Option<String>,

    /// The directory of the trained model
    artifact_dir: String,

    /// Maximum tokens generated per sentence
    max_len: usize,

    /// Sentences decoded together
    batch_size: usize,

    /// Decode on CUDA
    cuda: bool,
}

fn parse_args() -> Result<Option<Args>, pico_args::Error> {
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let args = Args {
        artifact_dir: pargs
            .opt_value_from_str(["-a", "--artifact-dir"])?
            .unwrap_or_else(|| "artifacts".to_string()),
        max_len: pargs.opt_value_from_str(["-m", "--max-len"])?.unwrap_or(200),
        batch_size: pargs
            .opt_value_from_str(["-b", "--batch-size"])?
            .unwrap_or(32),
        cuda: pargs.contains("--cuda"),
        input: pargs.opt_free_from_str()?,
    };

    Ok(Some(args))
}

/// Read source lines from stdin
async fn read_stdin() -> std::io::Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut result = Vec::new();

    while let Some(line) = lines.next_line().await? {
        result.push(line);
    }

    Ok(result)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let Some(args) = parse_args()? else {
        println!("{}", HELP);
        return Ok(());
    };

    let lines = match &args.input {
        Some(path) => read_file(path).await?,
        None => read_stdin().await?,
    };

    let device = if args.cuda {
        LibTorchDevice::Cuda(0)
    } else {
        LibTorchDevice::Cpu
    };

    let translations = translation::translate::<LibTorch>(
        &device,
        &args.artifact_dir,
        &lines,
        args.max_len,
        args.batch_size,
    )
    .await?;

    for translation in translations {
        println!("{}", translation);
    }

    Ok(())
}
