use clap::{Parser, Subcommand, ValueEnum};

pub mod commands;
pub mod generate;
pub mod output;

#[derive(Parser)]
#[command(
    name = "declgen",
    version,
    about = "Generate rules_closure BUILD files from goog.provide/goog.require declarations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: LogLevel,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate BUILD files for a project
    Generate {
        /// Project path (default: current directory)
        #[arg(default_value = ".")]
        path: String,
        /// Write BUILD files instead of printing them
        #[arg(long)]
        write: bool,
        /// Prefix of synthetic es6 import identifiers
        #[arg(long)]
        js_prefix: Option<String>,
        /// Exclude files matching this glob
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Show what one file provides and requires
    Extract {
        /// File to read
        file: String,
        /// Prefix of synthetic es6 import identifiers
        #[arg(long)]
        js_prefix: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Compact,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
