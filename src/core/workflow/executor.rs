#![allow(clippy::result_large_err)] // Executor returns AppError directly to keep structured diagnostic context.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow::expression::{is_truthy, ExpressionEngine};
use crate::core::workflow::merge::merge;
use crate::core::workflow::path::write_at;
use crate::core::workflow::registry::FunctionRegistry;
use crate::core::workflow::schema::{
    Action, ActionMode, Branch, DataCondition, DefaultCondition, State, StateKind, Workflow,
    DEFAULT_OUTPUT_PATH, FOREACH_OUTPUT_KEY, SUBFLOW_OUTPUT_KEY,
};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

/// Optional overrides supplied by CLI flags.
#[derive(Clone, Debug, Default)]
pub struct ExecutionOverrides {
    pub max_transitions: Option<usize>,
    pub strict_expressions: bool,
}

/// Resolved execution configuration used by the interpreter.
#[derive(Clone, Debug)]
pub struct ExecutionConfig {
    /// Cap on state transitions per invocation, so a cyclic document fails
    /// instead of spinning forever.
    pub max_transitions: usize,
    pub strict_expressions: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            max_transitions: 1000,
            strict_expressions: false,
        }
    }
}

impl ExecutionConfig {
    pub fn with_overrides(overrides: &ExecutionOverrides) -> Self {
        let mut config = ExecutionConfig::default();
        if let Some(max_transitions) = overrides.max_transitions {
            config.max_transitions = max_transitions;
        }
        config.strict_expressions = overrides.strict_expressions;
        config
    }
}

/// Result of dispatching a single state.
enum StateOutcome {
    /// Output context; the caller follows the state's own transition.
    Next(Value),
    /// A switch chose a transition: the cursor moves to the named sibling.
    Jump { target: String, context: Value },
    /// Terminal output context.
    Final(Value),
}

/// Recursive interpreter over a workflow's state graph.
pub struct StateExecutor {
    registry: FunctionRegistry,
    engine: ExpressionEngine,
    config: ExecutionConfig,
    cancel: CancellationToken,
}

impl StateExecutor {
    pub fn new(registry: FunctionRegistry) -> Self {
        Self::with_config(registry, ExecutionConfig::default())
    }

    pub fn with_config(registry: FunctionRegistry, config: ExecutionConfig) -> Self {
        let engine = if config.strict_expressions {
            ExpressionEngine::strict()
        } else {
            ExpressionEngine::default()
        };
        StateExecutor {
            registry,
            engine,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the cancellation token so a caller can abort execution.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the workflow from its start state to termination and return
    /// the final context.
    pub async fn execute_workflow(&self, workflow: &Workflow) -> Result<Value, AppError> {
        let start = workflow.resolve_start().ok_or_else(|| {
            AppError::new(
                ErrorCategory::ExecutionError,
                format!("workflow '{}' has no resolvable start state", workflow.id),
            )
            .with_code("WF-EXEC-002")
        })?;
        tracing::info!(workflow = %workflow.id, start = %start.name, "executing workflow");

        let mut current = start;
        let mut context = json!({"context": {}});
        let mut transitions = 0usize;
        loop {
            transitions += 1;
            if transitions > self.config.max_transitions {
                return Err(AppError::new(
                    ErrorCategory::ExecutionError,
                    format!(
                        "workflow '{}' exceeded {} state transitions",
                        workflow.id, self.config.max_transitions
                    ),
                )
                .with_code("WF-ITER-001"));
            }
            match self.dispatch(current, context, workflow).await? {
                StateOutcome::Final(value) => return Ok(value),
                StateOutcome::Jump { target, context: jumped } => {
                    current = self.lookup_state(workflow, &target)?;
                    context = jumped;
                }
                StateOutcome::Next(value) => {
                    context = value;
                    if current.end {
                        return Ok(context);
                    }
                    match &current.transition {
                        Some(next) => current = self.lookup_state(workflow, next)?,
                        None => return Ok(context),
                    }
                }
            }
        }
    }

    /// Execute a single state to completion, resolving any switch jumps
    /// within `scope`, and return its output context. The state's own
    /// `transition` field is not followed.
    pub async fn execute_state(
        &self,
        state: &State,
        input: Value,
        scope: &Workflow,
    ) -> Result<Value, AppError> {
        let mut current = state;
        let mut context = input;
        let mut hops = 0usize;
        loop {
            match self.dispatch(current, context, scope).await? {
                StateOutcome::Next(value) | StateOutcome::Final(value) => return Ok(value),
                StateOutcome::Jump { target, context: jumped } => {
                    hops += 1;
                    if hops > self.config.max_transitions {
                        return Err(AppError::new(
                            ErrorCategory::ExecutionError,
                            format!(
                                "state '{}' exceeded {} switch jumps",
                                state.name, self.config.max_transitions
                            ),
                        )
                        .with_code("WF-ITER-001"));
                    }
                    current = self.lookup_state(scope, &target)?;
                    context = jumped;
                }
            }
        }
    }

    fn lookup_state<'a>(&self, scope: &'a Workflow, name: &str) -> Result<&'a State, AppError> {
        scope.state(name).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ExecutionError,
                format!("transition references unknown state '{}'", name),
            )
            .with_code("WF-EXEC-003")
        })
    }

    fn dispatch<'a>(
        &'a self,
        state: &'a State,
        input: Value,
        scope: &'a Workflow,
    ) -> BoxFuture<'a, Result<StateOutcome, AppError>> {
        async move {
            if self.cancel.is_cancelled() {
                return Err(AppError::new(
                    ErrorCategory::CancelledError,
                    format!("execution cancelled before state '{}'", state.name),
                )
                .with_code("WF-CANCEL-001"));
            }
            tracing::debug!(state = %state.name, kind = state.kind.label(), "executing state");
            let working = self.apply_input_filter(state, input)?;
            match &state.kind {
                StateKind::Operation {
                    actions,
                    action_mode,
                } => self
                    .execute_operation(actions, *action_mode, working)
                    .await
                    .map(StateOutcome::Next),
                StateKind::Foreach {
                    input_collection,
                    iteration_param,
                    iterator,
                } => self
                    .execute_foreach(
                        state,
                        input_collection.as_deref(),
                        iteration_param,
                        iterator,
                        working,
                        scope,
                    )
                    .await
                    .map(StateOutcome::Next),
                StateKind::Switch {
                    data_conditions,
                    default_condition,
                } => self.execute_switch(
                    state,
                    data_conditions,
                    default_condition.as_ref(),
                    working,
                ),
                StateKind::Parallel { branches } => self
                    .execute_parallel(state, branches, working)
                    .await
                    .map(StateOutcome::Next),
                StateKind::Subflow { workflow_id } => self
                    .execute_subflow(state, workflow_id, working, scope)
                    .await
                    .map(StateOutcome::Next),
                StateKind::End => Ok(StateOutcome::Final(working)),
            }
        }
        .boxed()
    }

    /// Shape the state's working context. Without a declared input filter the
    /// input context flows through unchanged.
    fn apply_input_filter(&self, state: &State, input: Value) -> Result<Value, AppError> {
        match state.input_filter() {
            Some(expr) => self.engine.evaluate(expr, &input),
            None => Ok(input),
        }
    }

    async fn execute_operation(
        &self,
        actions: &[Action],
        mode: ActionMode,
        working: Value,
    ) -> Result<Value, AppError> {
        let mut current = seed_context(working);
        match mode {
            ActionMode::Sequential => {
                for action in actions {
                    let output = self.execute_action(action, &current).await?;
                    current = merge(&current, &output);
                }
            }
            ActionMode::Parallel => {
                // Every action sees the same snapshot; outputs merge in
                // declaration order regardless of completion order.
                let outputs = {
                    let futures: Vec<_> = actions
                        .iter()
                        .map(|action| self.execute_action(action, &current))
                        .collect();
                    join_all(futures).await
                };
                for output in outputs {
                    current = merge(&current, &output?);
                }
            }
        }
        Ok(current)
    }

    async fn execute_action(&self, action: &Action, working: &Value) -> Result<Value, AppError> {
        let ref_name = &action.function_ref.ref_name;
        let function = self.registry.get(ref_name).ok_or_else(|| {
            AppError::new(
                ErrorCategory::FunctionError,
                format!("function '{}' is not registered", ref_name),
            )
            .with_code("WF-FN-001")
        })?;
        let argument = self
            .engine
            .evaluate(&action.function_ref.input_argument(), working)?;
        let output = function.invoke(argument).await?;
        match &action.data_output {
            Some(path) => write_at(&Value::Object(Map::new()), path, output),
            None => Ok(Value::Object(Map::new())),
        }
    }

    async fn execute_foreach(
        &self,
        state: &State,
        input_collection: Option<&str>,
        iteration_param: &str,
        iterator: &[State],
        working: Value,
        scope: &Workflow,
    ) -> Result<Value, AppError> {
        let collection = match input_collection {
            Some(expr) => self.engine.evaluate_str(expr, &working)?,
            None => Value::Array(Vec::new()),
        };
        let items = match collection {
            Value::Array(items) => items,
            _ => Vec::new(),
        };

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let mut item_context = seed_context(working.clone());
            if let Value::Object(map) = &mut item_context {
                map.insert(iteration_param.to_string(), item);
            }
            let final_context = self.execute_sequence(iterator, item_context, scope).await?;
            results.push(
                final_context
                    .get("context")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new())),
            );
        }
        tracing::debug!(state = %state.name, iterations = results.len(), "foreach completed");

        let output = self.wrap_output(state, FOREACH_OUTPUT_KEY, json!({"results": results}))?;
        Ok(merge(&working, &output))
    }

    fn execute_switch(
        &self,
        state: &State,
        conditions: &[DataCondition],
        default: Option<&DefaultCondition>,
        working: Value,
    ) -> Result<StateOutcome, AppError> {
        for condition in conditions {
            let outcome = self.engine.evaluate(&condition.condition, &working)?;
            if !is_truthy(&outcome) {
                continue;
            }
            if let Some(target) = &condition.transition {
                return Ok(StateOutcome::Jump {
                    target: target.clone(),
                    context: working,
                });
            }
            if condition.end {
                return Ok(StateOutcome::Final(working));
            }
        }
        if let Some(default) = default {
            if let Some(target) = &default.transition {
                return Ok(StateOutcome::Jump {
                    target: target.clone(),
                    context: working,
                });
            }
            if default.end {
                return Ok(StateOutcome::Final(working));
            }
        }
        Err(AppError::new(
            ErrorCategory::ExecutionError,
            format!(
                "switch state '{}' matched no condition and has no default exit",
                state.name
            ),
        )
        .with_code("WF-EXEC-004"))
    }

    async fn execute_parallel(
        &self,
        state: &State,
        branches: &[Branch],
        working: Value,
    ) -> Result<Value, AppError> {
        // Branches run concurrently against isolated copies; outputs merge in
        // declaration order.
        let runs: Vec<_> = branches
            .iter()
            .map(|branch| {
                let seed = working.clone();
                async move {
                    let scope = branch_scope(branch);
                    self.execute_sequence(&scope.states, seed, &scope).await
                }
            })
            .collect();
        let outputs = join_all(runs).await;

        let mut merged = working.clone();
        for output in outputs {
            merged = merge(&merged, &output?);
        }
        let merged_context = merged
            .get("context")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let output_path = state.output_path();
        if output_path == DEFAULT_OUTPUT_PATH {
            Ok(json!({"context": merged_context}))
        } else {
            write_at(&working, output_path, merged_context)
        }
    }

    async fn execute_subflow(
        &self,
        state: &State,
        workflow_id: &str,
        working: Value,
        scope: &Workflow,
    ) -> Result<Value, AppError> {
        let sub = scope.sub_workflow(workflow_id).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ExecutionError,
                format!("sub-workflow '{}' not found", workflow_id),
            )
            .with_code("WF-EXEC-005")
        })?;

        let payload = match working.get("context") {
            Some(value) => value.clone(),
            None if working.is_object() => working.clone(),
            None => Value::Object(Map::new()),
        };
        // Sub-workflow states run in declared order, not by following the
        // sub-workflow's own start/transition graph.
        let seed = json!({"context": payload});
        let final_context = self.execute_sequence(&sub.states, seed, sub).await?;
        let sub_context = final_context
            .get("context")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let output = self.wrap_output(state, SUBFLOW_OUTPUT_KEY, sub_context)?;
        Ok(merge(&working, &output))
    }

    /// Run a declared sequence of states, chaining each state's output into
    /// the next state's input.
    async fn execute_sequence(
        &self,
        states: &[State],
        seed: Value,
        scope: &Workflow,
    ) -> Result<Value, AppError> {
        let mut context = seed;
        for state in states {
            context = self.execute_state(state, context, scope).await?;
        }
        Ok(context)
    }

    fn wrap_output(
        &self,
        state: &State,
        reserved_key: &str,
        payload: Value,
    ) -> Result<Value, AppError> {
        let output_path = state.output_path();
        if output_path == DEFAULT_OUTPUT_PATH {
            let mut wrapped = Map::new();
            wrapped.insert(reserved_key.to_string(), payload);
            Ok(json!({"context": wrapped}))
        } else {
            write_at(&Value::Object(Map::new()), output_path, payload)
        }
    }
}

/// Convenience wrapper: run `workflow` against `registry` with defaults.
pub async fn execute_workflow(
    workflow: &Workflow,
    registry: FunctionRegistry,
) -> Result<Value, AppError> {
    StateExecutor::new(registry).execute_workflow(workflow).await
}

/// An exhausted working context restarts from the conventional root so state
/// output always has a `context` mapping to land in.
fn seed_context(working: Value) -> Value {
    if is_truthy(&working) {
        working
    } else {
        json!({"context": {}})
    }
}

fn branch_scope(branch: &Branch) -> Workflow {
    Workflow {
        id: branch.name.clone(),
        spec_version: String::new(),
        start: None,
        states: branch.states.clone(),
        sub_workflows: Vec::new(),
    }
}
