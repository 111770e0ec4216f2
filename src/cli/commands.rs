//! CLI command definitions using clap.
//!
//! - ingest: fold an action log file into the store
//! - due: list tasks due for review
//! - show: print one task's stored state
//! - clear: wipe the store

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// spacedrep - spaced repetition scheduling over an action log DAG
#[derive(Parser, Debug)]
#[command(name = "spacedrep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fold newline-delimited action log JSON into the store
    Ingest {
        /// Path to the .jsonl file
        file: PathBuf,

        /// Read every log in the file, including those older than the last sync
        #[arg(short, long)]
        all: bool,
    },

    /// List tasks due for review, in queue order
    Due {
        /// Reference time in milliseconds since the epoch (default: now)
        #[arg(long)]
        at: Option<i64>,

        /// Maximum number of tasks to list
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the stored state of a task
    Show {
        /// Task ID, e.g. basicPrompt/abc123
        task_id: String,
    },

    /// Remove every stored prompt state
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_due_with_options() {
        let cli = Cli::parse_from(["spacedrep", "due", "--at", "1000", "-l", "5"]);
        match cli.command {
            Commands::Due { at, limit } => {
                assert_eq!(at, Some(1000));
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["spacedrep", "show", "basicPrompt/a", "--verbose", "-c", "x.yml"]);
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("x.yml")));
        assert!(matches!(cli.command, Commands::Show { ref task_id } if task_id == "basicPrompt/a"));
    }

    #[test]
    fn test_parse_ingest_all() {
        let cli = Cli::parse_from(["spacedrep", "ingest", "logs.jsonl", "--all"]);
        assert!(matches!(cli.command, Commands::Ingest { ref file, all: true } if file == &PathBuf::from("logs.jsonl")));

        let cli = Cli::parse_from(["spacedrep", "ingest", "logs.jsonl"]);
        assert!(matches!(cli.command, Commands::Ingest { all: false, .. }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["spacedrep"]).is_err());
    }
}
