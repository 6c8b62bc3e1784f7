//! CLI module for mediator-chain
//!
//! Provides subcommands:
//! - `demo`: send the greeting chain inside a transaction and print the result

pub mod demo;

use clap::{Parser, Subcommand};

/// mediator-chain - typed request pipelines over a mediator
#[derive(Parser)]
#[command(name = "mediator-chain")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Send the demo greeting chain
    Demo(demo::DemoArgs),
}
