use crate::cli::args::{LintArgs, OutputFormat, RunArgs, SimulateArgs};
use crate::core::workflow::builtins::builtin_registry;
use crate::core::workflow::executor::{ExecutionConfig, ExecutionOverrides, StateExecutor};
use crate::core::workflow::lint::{LintRegistry, LintSeverity};
use crate::core::workflow::schema;
use crate::core::workflow::validator::validate_state_flow;
use crate::Result;
use anyhow::anyhow;

pub async fn run(args: RunArgs) -> Result<()> {
    let workflow = schema::load_workflow(&args.file)?;
    let overrides = ExecutionOverrides {
        max_transitions: Some(args.max_transitions),
        strict_expressions: args.strict_expressions,
    };
    let executor = StateExecutor::with_config(
        builtin_registry(),
        ExecutionConfig::with_overrides(&overrides),
    );
    let final_context = executor.execute_workflow(&workflow).await?;
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&final_context)?
    } else {
        serde_json::to_string(&final_context)?
    };
    println!("{}", rendered);
    Ok(())
}

pub async fn simulate(args: SimulateArgs) -> Result<()> {
    let workflow = schema::load_workflow(&args.file)?;
    let report = validate_state_flow(&workflow, &builtin_registry()).await;
    for message in &report.messages {
        println!("{}", message);
    }
    if args.trace {
        for record in &report.trace {
            println!("--- {} ---", record.state);
            println!("input:  {}", serde_json::to_string(&record.input)?);
            println!("output: {}", serde_json::to_string(&record.output)?);
        }
    }
    if !report.is_valid() {
        return Err(anyhow!("data flow validation failed for {}", args.file.display()));
    }
    Ok(())
}

pub async fn lint(args: LintArgs) -> Result<()> {
    let workflow = schema::load_workflow(&args.file)?;
    let results = LintRegistry::new().run(&workflow);
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            if results.is_empty() {
                println!("no findings");
            }
            for result in &results {
                let location = result.location.as_deref().unwrap_or("-");
                println!(
                    "{} [{}] {} ({})",
                    result.severity, result.code, result.message, location
                );
            }
        }
    }
    let error_count = results
        .iter()
        .filter(|result| result.severity == LintSeverity::Error)
        .count();
    if error_count > 0 {
        return Err(anyhow!("{} lint error(s) in {}", error_count, args.file.display()));
    }
    Ok(())
}
