mod args;
mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use stemtool_core::{Config, Envelope};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let Cli {
        command,
        verbose,
        config,
    } = Cli::parse();

    // Initialize logging based on verbosity; stdout is reserved for the result
    let filter = match verbose {
        0 => "stemtool=info,stemtool_core=info,stemtool_separate=info",
        1 => "stemtool=debug,stemtool_core=debug,stemtool_separate=debug",
        2 => "stemtool=trace,stemtool_core=trace,stemtool_separate=trace",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config_path = config.as_deref();

    match command {
        Commands::Doctor => report(commands::doctor::run(config_path).await),
        Commands::Config => report(commands::config::run(config_path).await.map(|()| true)),
        command => {
            let envelope = tokio::select! {
                envelope = commands::guarded(dispatch(command, config_path)) => envelope,
                // Dropping the dispatch future kills the running tool's process group
                _ = tokio::signal::ctrl_c() => Envelope::failure("Interrupted"),
            };
            emit(&envelope)
        }
    }
}

/// Commands that answer with a JSON envelope on stdout
async fn dispatch(command: Commands, config_path: Option<&Path>) -> Result<Envelope> {
    let config = Config::load(config_path)?;

    match command {
        Commands::Download { url, output_dir } => {
            commands::download::run(&url, &output_dir, &config).await
        }
        Commands::Separate {
            input,
            output_dir,
            engine,
            model,
            device,
        } => commands::separate::run(&input, &output_dir, engine, model, device, &config).await,
        Commands::Transpose {
            input,
            output_dir,
            shift,
        } => commands::transpose::run(&input, &output_dir, &shift, &config).await,
        Commands::Doctor | Commands::Config => unreachable!("handled in main"),
    }
}

fn report(result: Result<bool>) -> ExitCode {
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Callers read the outcome from the envelope, so writing one is a clean exit.
fn emit(envelope: &Envelope) -> ExitCode {
    match envelope.emit() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to write result: {}", e);
            ExitCode::FAILURE
        }
    }
}
