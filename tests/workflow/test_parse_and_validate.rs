use statewalk::core::workflow::schema::{self, StartRef, StateKind, Workflow};
use std::fs;
use tempfile::NamedTempFile;

const VALID_WORKFLOW: &str = r#"
id: sample
specVersion: "1.0"
start: Start
states:
  - name: Start
    type: operation
    transition: Done
    actions:
      - functionRef:
          refName: echo
          arguments:
            input: "{}"
        dataOutput: .context.out
  - name: Done
    type: end
"#;

const DUPLICATE_NAMES: &str = r#"
id: sample
specVersion: "1.0"
start: Start
states:
  - name: Start
    type: operation
    actions: []
  - name: Start
    type: end
"#;

const UNKNOWN_START: &str = r#"
id: sample
specVersion: "1.0"
start: Missing
states:
  - name: Start
    type: end
"#;

#[test]
fn valid_workflow_loads_from_file() {
    let file = NamedTempFile::new().expect("temp file");
    let path = file.path().to_owned();
    drop(file);
    fs::write(&path, VALID_WORKFLOW).unwrap();
    let workflow = schema::load_workflow(&path);
    assert!(workflow.is_ok());
}

#[test]
fn duplicate_state_names_are_rejected() {
    let workflow = Workflow::from_yaml(DUPLICATE_NAMES).unwrap();
    let err = workflow.validate().unwrap_err();
    assert_eq!(err.code, "WF-DOC-003");
    assert!(err.message.contains("duplicate state name 'Start'"));
}

#[test]
fn unresolvable_start_name_is_rejected() {
    let workflow = Workflow::from_yaml(UNKNOWN_START).unwrap();
    let err = workflow.validate().unwrap_err();
    assert_eq!(err.code, "WF-DOC-004");
}

#[test]
fn state_kinds_deserialize_with_their_fields() {
    let workflow = Workflow::from_yaml(
        r#"
id: kinds
specVersion: "1.0"
start: Decide
states:
  - name: Decide
    type: switch
    dataConditions:
      - condition: .context.flag
        transition: Loop
    defaultCondition:
      end: true
  - name: Loop
    type: foreach
    inputCollection: .context.items
    iterator:
      - name: Step
        type: operation
        actions: []
  - name: Fan
    type: parallel
    branches:
      - name: Left
        states:
          - name: LeftOp
            type: operation
            actions: []
  - name: Nested
    type: subflow
    workflowId: child
subWorkflows:
  - id: child
    specVersion: "1.0"
    states:
      - name: Only
        type: end
"#,
    )
    .unwrap();

    match &workflow.states[0].kind {
        StateKind::Switch {
            data_conditions,
            default_condition,
        } => {
            assert_eq!(data_conditions.len(), 1);
            assert_eq!(data_conditions[0].transition.as_deref(), Some("Loop"));
            assert!(default_condition.as_ref().unwrap().end);
        }
        other => panic!("unexpected kind: {}", other.label()),
    }
    match &workflow.states[1].kind {
        StateKind::Foreach {
            iteration_param,
            iterator,
            ..
        } => {
            assert_eq!(iteration_param, "item");
            assert_eq!(iterator.len(), 1);
        }
        other => panic!("unexpected kind: {}", other.label()),
    }
    match &workflow.states[2].kind {
        StateKind::Parallel { branches } => assert_eq!(branches[0].name, "Left"),
        other => panic!("unexpected kind: {}", other.label()),
    }
    match &workflow.states[3].kind {
        StateKind::Subflow { workflow_id } => assert_eq!(workflow_id, "child"),
        other => panic!("unexpected kind: {}", other.label()),
    }
    assert!(workflow.sub_workflow("child").is_some());
}

#[test]
fn inline_start_state_is_accepted() {
    let workflow = Workflow::from_yaml(
        r#"
id: inline-start
specVersion: "1.0"
start:
  name: Ad-hoc
  type: end
states: []
"#,
    )
    .unwrap();
    assert!(workflow.validate().is_ok());
    match &workflow.start {
        Some(StartRef::Inline(state)) => assert_eq!(state.name, "Ad-hoc"),
        other => panic!("unexpected start: {:?}", other),
    }
    assert_eq!(workflow.resolve_start().unwrap().name, "Ad-hoc");
}

#[test]
fn unparsable_documents_report_serialization_errors() {
    let err = Workflow::from_yaml("states: [").unwrap_err();
    assert_eq!(err.code, "WF-DOC-001");
}
