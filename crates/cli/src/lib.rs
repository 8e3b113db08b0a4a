pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "courtside",
    about = "Courtside operator CLI",
    long_about = "Inspect configuration, check runtime readiness, and run single conversation turns.",
    after_help = "Examples:\n  courtside doctor --json\n  courtside config\n  courtside ask \"What time is tomorrow's training?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model endpoint settings, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one conversation turn and print the transcript as JSON")]
    Ask {
        #[arg(help = "The user message to send")]
        message: String,
        #[arg(long, help = "JSON file holding the state returned by a previous turn")]
        state: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { message, state } => commands::ask::run(&message, state.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("COURTSIDE_LOG_LEVEL")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
