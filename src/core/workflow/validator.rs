use crate::core::workflow::expression::ExpressionEngine;
use crate::core::workflow::merge::merge;
use crate::core::workflow::path::write_at;
use crate::core::workflow::registry::FunctionRegistry;
use crate::core::workflow::schema::{Action, StartRef, State, StateKind, Workflow};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Canonical message reported when the simulated walk records no errors.
pub const FLOW_CONSISTENT_MESSAGE: &str = "Data flow is consistent";

/// Outcome classification of a data-flow validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Valid,
    Invalid,
}

/// Input/output context snapshot captured for one action-bearing state.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub state: String,
    pub input: Value,
    pub output: Value,
}

/// Result of simulating a workflow's state flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowValidation {
    pub status: FlowStatus,
    /// Ordered error messages, or the single canonical success message.
    pub messages: Vec<String>,
    /// One record per action-bearing state visited, top level and iterator,
    /// captured regardless of validity.
    pub trace: Vec<TraceRecord>,
}

impl FlowValidation {
    pub fn is_valid(&self) -> bool {
        self.status == FlowStatus::Valid
    }
}

/// Walk the workflow's transition chain from its start state, invoking the
/// registered functions to thread realistic data, and collect structural
/// errors instead of raising them.
///
/// The walk is linear: it follows `transition` fields only, descending into
/// foreach iterators but never exploring switch or parallel branches as
/// alternate top-level paths. A revisited state records a cycle error and
/// stops the walk.
pub async fn validate_state_flow(
    workflow: &Workflow,
    registry: &FunctionRegistry,
) -> FlowValidation {
    let engine = ExpressionEngine::default();
    let state_index = workflow.state_index();
    let mut errors: Vec<String> = Vec::new();
    let mut trace: Vec<TraceRecord> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut context = json!({"context": {}});

    let mut current: Option<&State> = match &workflow.start {
        Some(StartRef::Name(name)) => state_index.get(name.as_str()).copied(),
        _ => None,
    };

    while let Some(state) = current {
        if !visited.insert(state.name.clone()) {
            errors.push(format!(
                "Cycle detected in state transitions at state '{}'",
                state.name
            ));
            break;
        }
        tracing::debug!(state = %state.name, "simulating state");

        let state_input = if state.actions().is_empty() {
            None
        } else {
            Some(context.clone())
        };
        for action in state.actions() {
            simulate_action(action, &state.name, "State", &mut context, registry, &engine, &mut errors)
                .await;
        }

        if let StateKind::Foreach {
            input_collection,
            iteration_param,
            iterator,
        } = &state.kind
        {
            simulate_foreach(
                state,
                input_collection.as_deref(),
                iteration_param,
                iterator,
                &mut context,
                registry,
                &engine,
                &mut errors,
                &mut trace,
            )
            .await;
        }

        if let Some(input) = state_input {
            trace.push(TraceRecord {
                state: state.name.clone(),
                input,
                output: context.clone(),
            });
        }

        let next_name = state.transition.as_deref();
        if let Some(next_state) = next_name.and_then(|name| state_index.get(name).copied()) {
            check_next_state_inputs(next_state, &context, &engine, &mut errors);
        }

        current = next_name.and_then(|name| state_index.get(name).copied());
        if matches!(current, Some(next) if next.end) {
            break;
        }
    }

    let (status, messages) = if errors.is_empty() {
        (FlowStatus::Valid, vec![FLOW_CONSISTENT_MESSAGE.to_string()])
    } else {
        (FlowStatus::Invalid, errors)
    };
    FlowValidation {
        status,
        messages,
        trace,
    }
}

/// Simulate one action: resolve the argument, invoke the function for real,
/// and merge its output at `dataOutput`. Failures are recorded, not raised.
async fn simulate_action(
    action: &Action,
    state_name: &str,
    state_label: &str,
    context: &mut Value,
    registry: &FunctionRegistry,
    engine: &ExpressionEngine,
    errors: &mut Vec<String>,
) {
    let ref_name = &action.function_ref.ref_name;
    let argument = match engine.evaluate(&action.function_ref.input_argument(), context) {
        Ok(value) => value,
        Err(err) => {
            errors.push(err.message);
            return;
        }
    };
    let Some(function) = registry.get(ref_name) else {
        errors.push(format!(
            "{} '{}' action references undefined function '{}'",
            state_label, state_name, ref_name
        ));
        return;
    };
    let output = match function.invoke(argument).await {
        Ok(value) => value,
        Err(err) => {
            errors.push(format!(
                "{} '{}' action '{}' failed during simulation: {}",
                state_label, state_name, ref_name, err.message
            ));
            return;
        }
    };
    if let Some(path) = &action.data_output {
        match write_at(&Value::Object(Map::new()), path, output) {
            Ok(tree) => *context = merge(context, &tree),
            Err(err) => errors.push(err.message),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn simulate_foreach(
    state: &State,
    input_collection: Option<&str>,
    iteration_param: &str,
    iterator: &[State],
    context: &mut Value,
    registry: &FunctionRegistry,
    engine: &ExpressionEngine,
    errors: &mut Vec<String>,
    trace: &mut Vec<TraceRecord>,
) {
    let expr = input_collection.unwrap_or("[]");
    let collection = engine
        .evaluate_str(expr, context)
        .unwrap_or(Value::Null);
    if is_empty_or_absent(&collection) {
        errors.push(format!(
            "State '{}' inputCollection '{}' references undefined or empty data",
            state.name, expr
        ));
        return;
    }

    let items = match collection {
        Value::Array(items) => items,
        _ => Vec::new(),
    };
    for item in items {
        let mut item_context = context.clone();
        if let Value::Object(map) = &mut item_context {
            map.insert(iteration_param.to_string(), item);
        }
        for iterator_state in iterator {
            let iterator_input = if iterator_state.actions().is_empty() {
                None
            } else {
                Some(item_context.clone())
            };
            for action in iterator_state.actions() {
                simulate_action(
                    action,
                    &iterator_state.name,
                    "Iterator state",
                    &mut item_context,
                    registry,
                    engine,
                    errors,
                )
                .await;
            }
            if let Some(input) = iterator_input {
                trace.push(TraceRecord {
                    state: iterator_state.name.clone(),
                    input,
                    output: item_context.clone(),
                });
            }
        }
    }
}

/// Lookahead: before advancing, prove the declared next state's collection
/// and action arguments resolve against the current context.
fn check_next_state_inputs(
    next_state: &State,
    context: &Value,
    engine: &ExpressionEngine,
    errors: &mut Vec<String>,
) {
    if let StateKind::Foreach {
        input_collection: Some(expr),
        ..
    } = &next_state.kind
    {
        let value = engine.evaluate_str(expr, context).unwrap_or(Value::Null);
        if is_empty_or_absent(&value) {
            errors.push(format!(
                "State '{}' inputCollection '{}' references undefined or empty data",
                next_state.name, expr
            ));
        }
    }
    for action in next_state.actions() {
        for (arg_name, arg_value) in &action.function_ref.arguments {
            let result = engine.evaluate(arg_value, context).unwrap_or(Value::Null);
            if is_empty_or_absent(&result) {
                errors.push(format!(
                    "Action in state '{}' argument '{}: {}' references undefined or empty data",
                    next_state.name,
                    arg_name,
                    format_argument(arg_value)
                ));
            }
        }
    }
}

fn is_empty_or_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn format_argument(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
