//! Command-line interface for CVEMAP-RELAY

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cvr",
    version,
    about = "Streaming front end to the cvemap vulnerability lookup service",
    long_about = "cvr turns /cvemap command lines into vulnerability database \
                  queries and streams the results back as markdown reports. \
                  Plain-English questions can be rewritten into command lines \
                  by a language model with the ask subcommand.",
    after_help = "EXAMPLES:
  # Query with CLI-style flags
  cvr query /cvemap -severity critical -poc -limit 10
  cvr query /cvemap -vendor microsoft -product windows_10 -kev
  cvr query /cvemap -id CVE-2023-0001 -json

  # Show the flag reference
  cvr query /cvemap -help

  # Ask in plain English (requires OPENAI_API_KEY)
  cvr ask \"what log4j bugs are being exploited in the wild?\"

  # Configuration
  cvr --config relay.yaml query /cvemap -kev

  For detailed help on any command, use: cvr <command> --help"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output (-v: info+warn, -vv: +debug, -vvv: +trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a /cvemap command line and stream the report
    Query(QueryArgs),

    /// Ask a plain-English question; a model derives the command line
    Ask(AskArgs),

    /// Show version information
    Version,
}

#[derive(clap::Args, Debug)]
pub struct QueryArgs {
    /// The command line, starting with /cvemap
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub line: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to rewrite as a command line
    #[arg(required = true, trailing_var_arg = true)]
    pub question: Vec<String>,

    /// Chat model used for the rewrite
    #[arg(long, default_value = "gpt-4o-mini")]
    pub model: String,

    /// API key for the chat model
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,
}
