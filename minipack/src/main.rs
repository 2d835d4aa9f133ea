use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use minipack_rs::{Compiler, DEFAULT_CONFIG_FILE};

/// minipack: A utility for bundling a JavaScript module graph into a single script
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the build configuration file. Relative paths inside it are resolved
    /// against the directory that contains it.
    #[clap(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

fn run(args: &Args) -> anyhow::Result<PathBuf> {
    let compiler = Compiler::from_config_file(&args.config)
        .with_context(|| format!("Failed to load configuration {}", args.config.display()))?;
    let written = compiler.run().context("Bundling failed")?;
    Ok(written)
}

fn main() {
    env_logger::init();
    let args: Args = Args::parse();

    match run(&args) {
        Ok(path) => {
            log::info!("Bundle written to {}", path.display());
            println!("{}", path.display());
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(1);
        }
    }
}
