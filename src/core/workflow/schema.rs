#![allow(clippy::result_large_err)] // Schema APIs return AppError directly to keep structured validation context.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Default output location for state results.
pub const DEFAULT_OUTPUT_PATH: &str = ".context";
/// Reserved key wrapping foreach results under the default output path.
pub const FOREACH_OUTPUT_KEY: &str = "ForEachStateOutput";
/// Reserved key wrapping sub-workflow results under the default output path.
pub const SUBFLOW_OUTPUT_KEY: &str = "SubWorkflowOutput";

fn default_iteration_param() -> String {
    "item".to_string()
}

/// A workflow definition: named states connected by transitions, plus nested
/// sub-workflows addressable by id.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub spec_version: String,
    #[serde(default)]
    pub start: Option<StartRef>,
    #[serde(default)]
    pub states: Vec<State>,
    #[serde(default)]
    pub sub_workflows: Vec<Workflow>,
}

/// Start reference: the name of the initial state, or (permissive fallback)
/// an inline state value.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StartRef {
    Name(String),
    Inline(Box<State>),
}

/// One node of the execution graph.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub name: String,
    #[serde(flatten)]
    pub kind: StateKind,
    #[serde(default)]
    pub transition: Option<String>,
    #[serde(default)]
    pub end: bool,
    #[serde(default)]
    pub state_data_filter: Option<StateDataFilter>,
}

/// Kind-specific state payload, tagged by the document's `type` field.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum StateKind {
    Operation {
        #[serde(default)]
        actions: Vec<Action>,
        #[serde(default)]
        action_mode: ActionMode,
    },
    Foreach {
        #[serde(default)]
        input_collection: Option<String>,
        #[serde(default = "default_iteration_param")]
        iteration_param: String,
        #[serde(default)]
        iterator: Vec<State>,
    },
    Switch {
        #[serde(default)]
        data_conditions: Vec<DataCondition>,
        #[serde(default)]
        default_condition: Option<DefaultCondition>,
    },
    Parallel {
        #[serde(default)]
        branches: Vec<Branch>,
    },
    Subflow {
        workflow_id: String,
    },
    End,
}

impl StateKind {
    pub fn label(&self) -> &'static str {
        match self {
            StateKind::Operation { .. } => "operation",
            StateKind::Foreach { .. } => "foreach",
            StateKind::Switch { .. } => "switch",
            StateKind::Parallel { .. } => "parallel",
            StateKind::Subflow { .. } => "subflow",
            StateKind::End => "end",
        }
    }
}

/// Visibility of earlier action outputs within an operation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    #[default]
    Sequential,
    Parallel,
}

/// One guarded exit of a switch state.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataCondition {
    pub condition: Value,
    #[serde(default)]
    pub transition: Option<String>,
    #[serde(default)]
    pub end: bool,
}

/// Fallback exit of a switch state when no condition matches.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DefaultCondition {
    #[serde(default)]
    pub transition: Option<String>,
    #[serde(default)]
    pub end: bool,
}

/// An independent sub-graph of a parallel state.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Branch {
    pub name: String,
    #[serde(default)]
    pub states: Vec<State>,
}

/// Input/output shaping applied around a state's execution.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateDataFilter {
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<String>,
}

/// A single named side-effecting call declared inside a state.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub function_ref: FunctionRef,
    #[serde(default)]
    pub data_output: Option<String>,
}

/// Reference into the function registry, with call arguments.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRef {
    pub ref_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl FunctionRef {
    /// The `input` argument expression, defaulting to the empty-mapping
    /// literal when absent.
    pub fn input_argument(&self) -> Value {
        self.arguments
            .get("input")
            .cloned()
            .unwrap_or_else(|| Value::String("{}".to_string()))
    }
}

impl State {
    /// Declared actions, empty for state kinds that carry none.
    pub fn actions(&self) -> &[Action] {
        match &self.kind {
            StateKind::Operation { actions, .. } => actions,
            _ => &[],
        }
    }

    /// Input filter expression, when declared.
    pub fn input_filter(&self) -> Option<&Value> {
        self.state_data_filter
            .as_ref()
            .and_then(|filter| filter.input.as_ref())
    }

    /// Output path for this state's result, defaulting to `.context`.
    pub fn output_path(&self) -> &str {
        self.state_data_filter
            .as_ref()
            .and_then(|filter| filter.output.as_deref())
            .unwrap_or(DEFAULT_OUTPUT_PATH)
    }
}

impl Workflow {
    /// Look up a top-level state by name.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|state| state.name == name)
    }

    /// Look up a nested sub-workflow by id.
    pub fn sub_workflow(&self, id: &str) -> Option<&Workflow> {
        self.sub_workflows.iter().find(|sub| sub.id == id)
    }

    /// Ordered name-to-state lookup over the top-level states.
    pub fn state_index(&self) -> IndexMap<&str, &State> {
        self.states
            .iter()
            .map(|state| (state.name.as_str(), state))
            .collect()
    }

    /// Resolve the start state: by name, or the inline fallback value.
    pub fn resolve_start(&self) -> Option<&State> {
        match self.start.as_ref()? {
            StartRef::Name(name) => self.state(name),
            StartRef::Inline(state) => Some(state),
        }
    }

    /// Parse a workflow from YAML text without structural validation.
    pub fn from_yaml(text: &str) -> Result<Self, AppError> {
        serde_yaml::from_str(text).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to parse workflow document: {}", err),
            )
            .with_code("WF-DOC-001")
        })
    }

    /// Validate mandatory-field structure: a non-empty id, unique state
    /// names per scope, and a resolvable start reference.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "workflow id must not be empty",
            )
            .with_code("WF-DOC-002"));
        }
        if self.spec_version.trim().is_empty() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                format!("workflow '{}' declares no specVersion", self.id),
            )
            .with_code("WF-DOC-002"));
        }

        let mut names = HashSet::new();
        for state in &self.states {
            if !names.insert(state.name.clone()) {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    format!(
                        "duplicate state name '{}' in workflow '{}'",
                        state.name, self.id
                    ),
                )
                .with_code("WF-DOC-003"));
            }
        }

        if let Some(StartRef::Name(name)) = &self.start {
            if self.state(name).is_none() {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    format!(
                        "start state '{}' is not present in workflow '{}'",
                        name, self.id
                    ),
                )
                .with_code("WF-DOC-004"));
            }
        }

        for sub in &self.sub_workflows {
            sub.validate()?;
        }
        Ok(())
    }
}

/// Load and structurally validate a workflow document from a YAML file.
pub fn load_workflow(path: &Path) -> Result<Workflow, AppError> {
    let text = fs::read_to_string(path).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to read {}: {}", path.display(), err),
        )
    })?;
    let workflow = Workflow::from_yaml(&text)?;
    workflow.validate()?;
    Ok(workflow)
}
