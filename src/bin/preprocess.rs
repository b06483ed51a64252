//! Command line tools to inspect and clean parallel corpora

use anyhow::anyhow;
use burn_nmt::{
    datasets::cleaning::{filter_parallel, term_frequency},
    utils::files::{read_file, write_lines},
};
use pico_args::Arguments;

const HELP: &str = "\
Usage: preprocess COMMAND [ARGS]

Commands:
  term-freq FILE                       Print token counts, most frequent first
  filter SRC TGT OUT_SRC OUT_TGT       Drop noisy sentence pairs from a parallel corpus

Options:
  -h, --help           Print help
";

#[derive(Debug)]
enum Command {
    TermFrequency {
        file: String,
    },
    Filter {
        source: String,
        target: String,
        out_source: String,
        out_target: String,
    },
}

fn required(pargs: &mut Arguments, name: &str) -> anyhow::Result<String> {
    pargs.free_from_str().map_err(|e| match e {
        pico_args::Error::MissingArgument => anyhow!("Missing required argument: {}", name),
        _ => anyhow!("{}", e),
    })
}

fn parse_args() -> anyhow::Result<Option<Command>> {
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let command: String = required(&mut pargs, "COMMAND")?;

    let command = match command.as_str() {
        "term-freq" => Command::TermFrequency {
            file: required(&mut pargs, "FILE")?,
        },
        "filter" => Command::Filter {
            source: required(&mut pargs, "SRC")?,
            target: required(&mut pargs, "TGT")?,
            out_source: required(&mut pargs, "OUT_SRC")?,
            out_target: required(&mut pargs, "OUT_TGT")?,
        },
        other => return Err(anyhow!("Unknown command: {}", other)),
    };

    Ok(Some(command))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let Some(command) = parse_args()? else {
        print!("{}", HELP);
        return Ok(());
    };

    match command {
        Command::TermFrequency { file } => {
            let text = read_file(&file).await?.join("\n");

            for (token, count) in term_frequency(&text) {
                println!("{}\t{}", token, count);
            }
        }
        Command::Filter {
            source,
            target,
            out_source,
            out_target,
        } => {
            let src_lines = read_file(&source).await?;
            let tgt_lines = read_file(&target).await?;

            if src_lines.len() != tgt_lines.len() {
                log::warn!(
                    "{} has {} lines but {} has {}, extra lines are ignored",
                    source,
                    src_lines.len(),
                    target,
                    tgt_lines.len()
                );
            }

            let filtered = filter_parallel(src_lines, tgt_lines);

            for (src, tgt) in &filtered.rejected {
                log::debug!("Rejected: {:?} ||| {:?}", src, tgt);
            }

            write_lines(&out_source, &filtered.source).await?;
            write_lines(&out_target, &filtered.target).await?;

            log::info!(
                "Kept {} pairs, rejected {}",
                filtered.source.len(),
                filtered.rejected.len()
            );
        }
    }

    Ok(())
}
