use std::path::PathBuf;

use clap::Parser;
use silt::Silt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Tree-walking interpreter for the Silt language")]
struct Cli {
    /// Script to execute; starts an interactive prompt when omitted.
    script: Option<PathBuf>,
}

fn main() -> Result<(), anyhow::Error> {
    init_tracing();

    let cli = Cli::parse();
    let mut silt = Silt::new();

    match cli.script {
        Some(path) => {
            silt.run_file(&path)?;

            if silt.had_error() {
                std::process::exit(65);
            }
            if silt.had_runtime_error() {
                std::process::exit(70);
            }

            Ok(())
        }
        None => silt.run_prompt(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // Diagnostics and logs share stderr; program output owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
