use super::{LintResult, LintSeverity, WorkflowLintRule};
use crate::core::workflow::expression::ExpressionEngine;
use crate::core::workflow::schema::{StartRef, State, StateKind, Workflow};
use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One transition namespace within a document: a top-level workflow, a
/// parallel branch, or a sub-workflow. `members` additionally carries the
/// foreach iterator states nested under the declared sequence, since their
/// references resolve against the same namespace.
struct Scope<'a> {
    location: String,
    declared: &'a [State],
    members: Vec<&'a State>,
    sub_workflows: &'a [Workflow],
}

impl<'a> Scope<'a> {
    fn names(&self) -> HashSet<&'a str> {
        self.declared.iter().map(|state| state.name.as_str()).collect()
    }
}

fn collect_scopes<'a>(workflow: &'a Workflow, scopes: &mut Vec<Scope<'a>>) {
    let mut members = Vec::new();
    for state in &workflow.states {
        collect_members(state, &mut members);
    }
    scopes.push(Scope {
        location: format!("workflow '{}'", workflow.id),
        declared: &workflow.states,
        members: members.clone(),
        sub_workflows: &workflow.sub_workflows,
    });

    for state in members {
        if let StateKind::Parallel { branches } = &state.kind {
            for branch in branches {
                let mut branch_members = Vec::new();
                for branch_state in &branch.states {
                    collect_members(branch_state, &mut branch_members);
                }
                scopes.push(Scope {
                    location: format!("branch '{}'", branch.name),
                    declared: &branch.states,
                    members: branch_members,
                    sub_workflows: &[],
                });
            }
        }
    }

    for sub in &workflow.sub_workflows {
        collect_scopes(sub, scopes);
    }
}

fn collect_members<'a>(state: &'a State, out: &mut Vec<&'a State>) {
    out.push(state);
    if let StateKind::Foreach { iterator, .. } = &state.kind {
        for nested in iterator {
            collect_members(nested, out);
        }
    }
}

fn transition_targets(state: &State) -> Vec<&str> {
    let mut targets = Vec::new();
    if let Some(target) = &state.transition {
        targets.push(target.as_str());
    }
    if let StateKind::Switch {
        data_conditions,
        default_condition,
    } = &state.kind
    {
        for condition in data_conditions {
            if let Some(target) = &condition.transition {
                targets.push(target.as_str());
            }
        }
        if let Some(default) = default_condition {
            if let Some(target) = &default.transition {
                targets.push(target.as_str());
            }
        }
    }
    targets
}

pub struct DuplicateStateNamesRule;

impl WorkflowLintRule for DuplicateStateNamesRule {
    fn validate(&self, workflow: &Workflow, _engine: &ExpressionEngine) -> Vec<LintResult> {
        let mut scopes = Vec::new();
        collect_scopes(workflow, &mut scopes);

        let mut out = Vec::new();
        for scope in &scopes {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for state in scope.declared {
                *counts.entry(state.name.as_str()).or_insert(0) += 1;
            }
            for (name, count) in counts {
                if count > 1 {
                    out.push(LintResult::new(
                        "WF-LINT-001",
                        LintSeverity::Error,
                        format!(
                            "duplicate state name '{}' found {} times in {}",
                            name, count, scope.location
                        ),
                        Some(name.to_string()),
                        Some("rename states so every name is unique within its scope".to_string()),
                    ));
                }
            }
        }
        out
    }
}

pub struct UnknownTargetRule;

impl WorkflowLintRule for UnknownTargetRule {
    fn validate(&self, workflow: &Workflow, _engine: &ExpressionEngine) -> Vec<LintResult> {
        let mut scopes = Vec::new();
        collect_scopes(workflow, &mut scopes);

        let mut out = Vec::new();
        for scope in &scopes {
            let names = scope.names();
            for state in &scope.members {
                for target in transition_targets(state) {
                    if !names.contains(target) {
                        out.push(LintResult::new(
                            "WF-LINT-002",
                            LintSeverity::Error,
                            format!(
                                "state '{}' references unknown target '{}' in {}",
                                state.name, target, scope.location
                            ),
                            Some(state.name.clone()),
                            Some("point transitions to a state declared in the same scope".to_string()),
                        ));
                    }
                }
            }
        }
        out
    }
}

pub struct UnknownSubWorkflowRule;

impl WorkflowLintRule for UnknownSubWorkflowRule {
    fn validate(&self, workflow: &Workflow, _engine: &ExpressionEngine) -> Vec<LintResult> {
        let mut scopes = Vec::new();
        collect_scopes(workflow, &mut scopes);

        let mut out = Vec::new();
        for scope in &scopes {
            let known: HashSet<&str> = scope
                .sub_workflows
                .iter()
                .map(|sub| sub.id.as_str())
                .collect();
            for state in &scope.members {
                if let StateKind::Subflow { workflow_id } = &state.kind {
                    if !known.contains(workflow_id.as_str()) {
                        out.push(LintResult::new(
                            "WF-LINT-003",
                            LintSeverity::Error,
                            format!(
                                "state '{}' references unknown sub-workflow '{}' in {}",
                                state.name, workflow_id, scope.location
                            ),
                            Some(state.name.clone()),
                            Some("declare the sub-workflow under subWorkflows".to_string()),
                        ));
                    }
                }
            }
        }
        out
    }
}

fn build_transition_graph(
    workflow: &Workflow,
) -> (DiGraph<&str, ()>, HashMap<&str, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();
    for state in &workflow.states {
        nodes.insert(state.name.as_str(), graph.add_node(state.name.as_str()));
    }
    for state in &workflow.states {
        let from = nodes[state.name.as_str()];
        for target in transition_targets(state) {
            if let Some(&to) = nodes.get(target) {
                graph.add_edge(from, to, ());
            }
        }
    }
    (graph, nodes)
}

pub struct UnreachableStatesRule;

impl WorkflowLintRule for UnreachableStatesRule {
    fn validate(&self, workflow: &Workflow, _engine: &ExpressionEngine) -> Vec<LintResult> {
        let start_name = match &workflow.start {
            Some(StartRef::Name(name)) => name.as_str(),
            _ => return Vec::new(),
        };
        let (graph, nodes) = build_transition_graph(workflow);
        let Some(&start) = nodes.get(start_name) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for state in &workflow.states {
            let node = nodes[state.name.as_str()];
            if !has_path_connecting(&graph, start, node, None) {
                out.push(LintResult::new(
                    "WF-LINT-004",
                    LintSeverity::Warning,
                    format!("state '{}' is unreachable from the start state", state.name),
                    Some(state.name.clone()),
                    Some("connect the state from a reachable transition or remove it".to_string()),
                ));
            }
        }
        out
    }
}

pub struct TransitionCycleRule;

impl WorkflowLintRule for TransitionCycleRule {
    fn validate(&self, workflow: &Workflow, _engine: &ExpressionEngine) -> Vec<LintResult> {
        let (graph, _nodes) = build_transition_graph(workflow);

        let mut out = Vec::new();
        for component in tarjan_scc(&graph) {
            let cyclic = component.len() > 1
                || (component.len() == 1 && graph.contains_edge(component[0], component[0]));
            if cyclic {
                let mut names: Vec<&str> = component.iter().map(|node| graph[*node]).collect();
                names.sort_unstable();
                out.push(LintResult::new(
                    "WF-LINT-005",
                    LintSeverity::Warning,
                    format!("transition cycle detected among states: {}", names.join(", ")),
                    Some(names.join(", ")),
                    Some("break the cycle or rely on the runtime transition cap".to_string()),
                ));
            }
        }
        out
    }
}

pub struct StartResolvableRule;

impl WorkflowLintRule for StartResolvableRule {
    fn validate(&self, workflow: &Workflow, _engine: &ExpressionEngine) -> Vec<LintResult> {
        let mut out = Vec::new();
        match &workflow.start {
            None => out.push(LintResult::new(
                "WF-LINT-006",
                LintSeverity::Error,
                format!("workflow '{}' declares no start state", workflow.id),
                None,
                Some("declare a start state name".to_string()),
            )),
            Some(StartRef::Name(name)) if workflow.state(name).is_none() => {
                out.push(LintResult::new(
                    "WF-LINT-006",
                    LintSeverity::Error,
                    format!(
                        "start state '{}' is not present in workflow '{}'",
                        name, workflow.id
                    ),
                    Some(name.clone()),
                    Some("point start at a declared state".to_string()),
                ))
            }
            Some(_) => {}
        }
        out
    }
}

pub struct ExpressionParseRule;

impl WorkflowLintRule for ExpressionParseRule {
    fn validate(&self, workflow: &Workflow, engine: &ExpressionEngine) -> Vec<LintResult> {
        let mut scopes = Vec::new();
        collect_scopes(workflow, &mut scopes);

        let mut out = Vec::new();
        for scope in &scopes {
            for state in &scope.members {
                for expr in state_expressions(state) {
                    if expr.is_empty() || expr == "{}" {
                        continue;
                    }
                    if engine.compile(expr).is_err() {
                        out.push(LintResult::new(
                            "WF-LINT-007",
                            LintSeverity::Warning,
                            format!(
                                "state '{}' expression '{}' does not parse as a query and will be treated as a literal value",
                                state.name, expr
                            ),
                            Some(state.name.clone()),
                            Some("quote intentional literals or fix the query".to_string()),
                        ));
                    }
                }
            }
        }
        out
    }
}

fn state_expressions(state: &State) -> Vec<&str> {
    let mut expressions = Vec::new();
    if let Some(Value::String(expr)) = state.input_filter() {
        expressions.push(expr.as_str());
    }
    for action in state.actions() {
        for value in action.function_ref.arguments.values() {
            if let Value::String(expr) = value {
                expressions.push(expr.as_str());
            }
        }
    }
    match &state.kind {
        StateKind::Foreach {
            input_collection: Some(expr),
            ..
        } => expressions.push(expr.as_str()),
        StateKind::Switch {
            data_conditions, ..
        } => {
            for condition in data_conditions {
                if let Value::String(expr) = &condition.condition {
                    expressions.push(expr.as_str());
                }
            }
        }
        _ => {}
    }
    expressions
}
