//! CLI Module
//!
//! Command-line interface for the headless Ambiente simulator.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ambiente - procedural ambient audio engines
#[derive(Parser, Debug)]
#[command(name = "ambiente")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List domains with their engine, buses and layers
    #[command(name = "domains")]
    Domains {
        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run an engine against a simulated clock and print meters
    #[command(name = "simulate")]
    Simulate {
        /// Domain to switch to (home, geometry, medicine, tantra, relationship, marketing, tarot)
        #[arg(short, long)]
        domain: String,

        /// Simulated duration in seconds
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f64,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Toggle a layer before starting (repeatable)
        #[arg(short, long)]
        toggle: Vec<String>,

        /// Start narration at this time (seconds)
        #[arg(long)]
        speak_at: Option<f64>,

        /// How long narration lasts (seconds)
        #[arg(long, default_value_t = 3.0)]
        speak_for: f64,

        /// Mastering EQ as bass,mid,treble in [0, 1]
        #[arg(long, value_delimiter = ',', num_args = 3)]
        eq: Option<Vec<f32>>,
    },
}
