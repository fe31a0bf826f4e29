use std::env;
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result, bail};
use tracing::error;

use genre_eval::{
    config::Config, evaluation, inference::HttpTextGenerator, observability, report,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            error!(message, "panic occurred without location information");
        }
    }));

    observability::init().context("failed to initialize tracing")?;

    let mut config = Config::from_env().context("failed to load configuration")?;
    apply_args(&mut config, env::args().skip(1))?;

    let generator =
        HttpTextGenerator::from_config(&config).context("failed to build inference client")?;
    let result = evaluation::run(&config, &generator, &mut io::stdout()).await;
    observability::shutdown();

    let outcome = result?;
    print!("{}", report::render(&outcome));
    Ok(())
}

fn apply_args(config: &mut Config, mut args: impl Iterator<Item = String>) -> Result<()> {
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dataset" => {
                let value = args.next().context("--dataset requires a path argument")?;
                config.set_dataset_path(PathBuf::from(value));
            }
            "--model" => {
                let value = args.next().context("--model requires a model identifier")?;
                config.set_model(value);
            }
            "--endpoint" => {
                let value = args.next().context("--endpoint requires a URL")?;
                config.set_inference_base_url(value);
            }
            "--limit" => {
                let value = args.next().context("--limit requires a sample count")?;
                let parsed = value
                    .parse::<NonZeroUsize>()
                    .context("--limit must be a positive integer")?;
                config.set_sample_limit(parsed);
            }
            "--seed" => {
                let value = args.next().context("--seed requires an integer")?;
                let parsed = value.parse::<u64>().context("--seed must be an integer")?;
                config.set_shuffle_seed(parsed);
            }
            "--help" => {
                print_usage();
                process::exit(0);
            }
            _ => {
                bail!("unknown argument: {}", arg);
            }
        }
    }
    Ok(())
}

fn print_usage() {
    eprintln!(
        "Usage: genre-eval [--dataset <path>] [--model <id>] [--endpoint <url>] [--limit 1000] [--seed 1993]"
    );
}
