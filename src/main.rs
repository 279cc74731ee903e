use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use declgen::cli::commands;
use declgen::cli::generate::GenerateOptions;
use declgen::cli::{Cli, Commands, LogLevel};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let project_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    match cli.command {
        Commands::Generate {
            ref path,
            write,
            ref js_prefix,
            ref exclude,
        } => {
            let opts = GenerateOptions {
                js_prefix: js_prefix.clone(),
                exclude: exclude.clone(),
                write,
            };
            let output = commands::run_generate_command(path, &opts, &cli.format)?;
            println!("{}", output);
        }

        Commands::Extract {
            ref file,
            ref js_prefix,
        } => {
            let output =
                commands::run_extract(&project_path, file, js_prefix.as_deref(), &cli.format)?;
            println!("{}", output);
        }
    }

    Ok(())
}

fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
