//! Argument parsing for the `ledisasm` binary.
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "ledisasm", about = "Static disassembler for 32-bit LE/LX Linear Executables")]
pub struct Cli {
    /// Path to the LE/LX binary to disassemble.
    pub input: PathBuf,

    /// Write the listing here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
