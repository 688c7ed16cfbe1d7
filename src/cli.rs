use clap::{Parser, Subcommand};

/// Diagnostic tool for the issue-search query pipeline
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a search query and print the normalized filter sequence
    Parse {
        /// Query string, e.g. 'is:unresolved assigned:alice timesSeen:>5'
        query: String,

        /// Emit JSON instead of one clause per line
        #[arg(long)]
        json: bool,

        /// Run value conversion against a built-in sample directory
        #[arg(long)]
        convert: bool,
    },
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
