use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::data::LogLevel;

#[derive(Parser, Debug, Clone)]
#[command(name = "project-outline", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    #[clap(long, short, default_value = "warn", value_enum, global = true)]
    pub log_level: LogLevel,

    /// The root directory of the project
    #[clap(long, short, default_value = ".", global = true)]
    pub root: PathBuf,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the project outline
    Show,
    /// Replace the contents of a file in the outline and save the project
    Update {
        /// Path of the file item, e.g. "Executables/hello/Main.hs"
        item: String,
        /// File holding the new contents
        source: PathBuf,
    },
    /// Write a compressed snapshot of the whole project
    Snapshot { output: PathBuf },
}
