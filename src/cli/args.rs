//! Defines the command-line arguments and subcommands for the AutoTest CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "autotest",
    version,
    about = "Operator interface for sequencing hardware tests on a production line."
)]
pub struct AutoTestArgs {
    /// Station configuration file (YAML).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a simulated production-line test against one or more DUTs.
    Demo {
        /// Number of devices tested side by side.
        #[arg(long, default_value_t = 1)]
        targets: usize,
        /// Number of complete runs before exiting.
        #[arg(long, default_value_t = 1)]
        runs: usize,
        /// Seed for the simulated measurements.
        #[arg(long)]
        seed: Option<u64>,
        /// Answer barcode prompts with generated serial numbers.
        #[arg(long)]
        unattended: bool,
        /// Simulated duration of each step in milliseconds.
        #[arg(long, default_value_t = 0)]
        step_delay_ms: u64,
    },
    /// Generate a report encryption key pair.
    Keygen {
        /// Directory receiving report.pub and report.key.
        #[arg(long, required = true)]
        out: PathBuf,
    },
    /// Print the plaintext of an encrypted report as CSV.
    Decrypt {
        /// Secret key file written by `keygen`.
        #[arg(long, required = true)]
        key: PathBuf,
        /// The encrypted report.
        #[arg(required = true)]
        report: PathBuf,
    },
    /// Print the report header of the demo test.
    Header,
    /// Print the station id derived from a network interface.
    StationId {
        /// Interface to read the MAC address from.
        #[arg(long)]
        interface: Option<String>,
    },
}
