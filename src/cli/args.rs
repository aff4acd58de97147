use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    /// Workflow document to execute (YAML)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Cap on state transitions before aborting (guards cyclic documents)
    #[arg(long, default_value = "1000")]
    pub max_transitions: usize,

    /// Fail on expressions that do not parse instead of degrading them to literals
    #[arg(long)]
    pub strict_expressions: bool,

    /// Pretty-print the final context
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Workflow document to simulate (YAML)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print the per-state input/output trace records
    #[arg(long)]
    pub trace: bool,
}

#[derive(Args)]
pub struct LintArgs {
    /// Workflow document to lint (YAML)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output format for lint results
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
