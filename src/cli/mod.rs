//! CLI module for spacedrep - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
