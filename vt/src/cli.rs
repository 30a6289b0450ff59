//! CLI argument parsing for vt

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vt")]
#[command(author, version, about = "Bootstrap helper for the vCD provider acceptance suite", long_about = None)]
pub struct Cli {
    /// Path to the test config file (overrides VCD_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and propagate the configuration, then print a summary
    Check,

    /// Print the variables the suite exports, as shell `export` lines
    Env {
        /// Show the password instead of masking it
        #[arg(long)]
        reveal: bool,
    },

    /// Render a template file and store it as an artifact
    Render {
        /// Template file
        #[arg(required = true)]
        template: PathBuf,

        /// Template value, repeatable
        #[arg(short, long = "data", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        data: Vec<(String, String)>,

        /// Artifact name (default: template file stem)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Start the suite, run a test command and exit with its exit code
    Run {
        /// Command and arguments, e.g. `vt run -- go test ./vcd`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

/// Parse `KEY=VALUE`; the value may itself contain `=`
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
