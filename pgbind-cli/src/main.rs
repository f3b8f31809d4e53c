mod codegen;
mod commands;
mod config;
mod utils;

use std::error::Error;

use clap::Parser;
use commands::{analyze::Analyze, generate::Generate};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pgbind", bin_name = "pgbind")]
enum Command {
    Generate(Generate),
    Analyze(Analyze),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Command::parse() {
        Command::Generate(args) => args.run(),
        Command::Analyze(args) => args.run(),
    }
}
