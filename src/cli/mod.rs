pub mod args;
pub mod commands;

pub use args::{LintArgs, RunArgs, SimulateArgs};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "statewalk")]
#[command(version = crate::VERSION)]
#[command(about = "Interpreter and data-flow validator for declarative state workflows")]
pub struct Cli {
    /// Emit logs as JSON instead of human-readable lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Execute a workflow document to termination",
        after_help = "Example:\n    statewalk run workflow.yaml --pretty"
    )]
    Run(RunArgs),
    #[command(
        about = "Simulate the state flow and report data-flow diagnostics",
        after_help = "Example:\n    statewalk simulate workflow.yaml --trace"
    )]
    Simulate(SimulateArgs),
    #[command(
        about = "Check the document structure without executing it",
        after_help = "Example:\n    statewalk lint workflow.yaml --format json"
    )]
    Lint(LintArgs),
}

pub async fn run(cli: Cli) -> crate::Result<()> {
    match cli.command {
        Command::Run(args) => commands::run(args).await,
        Command::Simulate(args) => commands::simulate(args).await,
        Command::Lint(args) => commands::lint(args).await,
    }
}
