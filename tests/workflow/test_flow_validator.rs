use serde_json::json;
use statewalk::core::workflow::registry::FunctionRegistry;
use statewalk::core::workflow::schema::Workflow;
use statewalk::core::workflow::validator::{validate_state_flow, FlowStatus};

fn flow_registry() -> FunctionRegistry {
    let mut builder = FunctionRegistry::builder();
    builder
        .register_fn("produceData", |_input| {
            Ok(json!([{"value": 1}, {"value": 2}, {"value": 3}]))
        })
        .register_fn("processItem", |input| {
            Ok(json!({"result": input.get("value").cloned().unwrap_or(json!(0))}))
        })
        .register_fn("noop", |_input| Ok(json!({"ok": true})));
    builder.build()
}

fn workflow(text: &str) -> Workflow {
    Workflow::from_yaml(text).expect("workflow parses")
}

const PRODUCE_CONSUME: &str = r#"
id: test-flow
specVersion: "1.0"
start: ProduceData
states:
  - name: ProduceData
    type: operation
    transition: ConsumeData
    actions:
      - functionRef:
          refName: produceData
          arguments:
            input: "{}"
        dataOutput: .context.producedData
  - name: ConsumeData
    type: foreach
    transition: End
    inputCollection: .context.producedData
    iterationParam: item
    iterator:
      - name: ProcessItem
        type: operation
        end: true
        actions:
          - functionRef:
              refName: processItem
              arguments:
                input: .item
            dataOutput: .context.processedItem
  - name: End
    type: end
"#;

#[tokio::test]
async fn consistent_flow_reports_valid() {
    let report = validate_state_flow(&workflow(PRODUCE_CONSUME), &flow_registry()).await;
    assert_eq!(report.status, FlowStatus::Valid);
    assert_eq!(report.messages, vec!["Data flow is consistent".to_string()]);
}

#[tokio::test]
async fn trace_captures_per_state_inputs_and_outputs() {
    let report = validate_state_flow(&workflow(PRODUCE_CONSUME), &flow_registry()).await;
    assert!(report.is_valid());
    // ProduceData plus three ProcessItem iterations.
    assert_eq!(report.trace.len(), 4);

    let produce = report
        .trace
        .iter()
        .find(|record| record.state == "ProduceData")
        .expect("ProduceData record");
    assert_eq!(produce.input, json!({"context": {}}));
    assert_eq!(
        produce.output,
        json!({"context": {"producedData": [{"value": 1}, {"value": 2}, {"value": 3}]}})
    );

    let iterations: Vec<_> = report
        .trace
        .iter()
        .filter(|record| record.state == "ProcessItem")
        .collect();
    assert_eq!(iterations.len(), 3);
    for (index, record) in iterations.iter().enumerate() {
        let expected = index as u64 + 1;
        assert_eq!(record.input["item"], json!({"value": expected}));
        assert_eq!(
            record.input["context"]["producedData"],
            json!([{"value": 1}, {"value": 2}, {"value": 3}])
        );
        assert_eq!(
            record.output["context"]["processedItem"]["result"],
            json!(expected)
        );
    }
}

const UNDEFINED_COLLECTION: &str = r#"
id: test-flow
specVersion: "1.0"
start: ProduceData
states:
  - name: ProduceData
    type: operation
    transition: ConsumeData
    actions:
      - functionRef:
          refName: produceData
          arguments:
            input: "{}"
        dataOutput: .context.producedData
  - name: ConsumeData
    type: foreach
    transition: End
    inputCollection: .context.unrelatedData
    iterationParam: item
    iterator:
      - name: ProcessItem
        type: operation
        end: true
        actions:
          - functionRef:
              refName: processItem
              arguments:
                input: .item
            dataOutput: .context.processedItem
  - name: End
    type: end
"#;

#[tokio::test]
async fn undefined_collection_reference_is_reported_by_exact_path() {
    let report = validate_state_flow(&workflow(UNDEFINED_COLLECTION), &flow_registry()).await;
    assert_eq!(report.status, FlowStatus::Invalid);
    assert!(report.messages.iter().any(|message| message.contains(
        "inputCollection '.context.unrelatedData' references undefined or empty data"
    )));
}

const CYCLIC_FLOW: &str = r#"
id: cyclic-flow
specVersion: "1.0"
start: A
states:
  - name: A
    type: operation
    transition: B
    actions:
      - functionRef:
          refName: noop
          arguments:
            input: "{}"
        dataOutput: .context.a
  - name: B
    type: operation
    transition: A
    actions:
      - functionRef:
          refName: noop
          arguments:
            input: "{}"
        dataOutput: .context.b
"#;

#[tokio::test]
async fn transition_cycles_are_detected_and_terminate_the_walk() {
    let report = validate_state_flow(&workflow(CYCLIC_FLOW), &flow_registry()).await;
    assert_eq!(report.status, FlowStatus::Invalid);
    assert!(report
        .messages
        .iter()
        .any(|message| message.contains("Cycle detected in state transitions at state 'A'")));
}

const UNDEFINED_FUNCTION: &str = r#"
id: undefined-function
specVersion: "1.0"
start: Start
states:
  - name: Start
    type: operation
    actions:
      - functionRef:
          refName: ghost
          arguments:
            input: "{}"
        dataOutput: .context.out
"#;

#[tokio::test]
async fn undefined_function_is_recorded_not_fatal() {
    let report = validate_state_flow(&workflow(UNDEFINED_FUNCTION), &flow_registry()).await;
    assert_eq!(report.status, FlowStatus::Invalid);
    assert!(report
        .messages
        .iter()
        .any(|message| message.contains("State 'Start' action references undefined function 'ghost'")));
}

const LOOKAHEAD_ARGUMENT: &str = r#"
id: lookahead-argument
specVersion: "1.0"
start: Start
states:
  - name: Start
    type: operation
    transition: Consume
    actions:
      - functionRef:
          refName: noop
          arguments:
            input: "{}"
        dataOutput: .context.seeded
  - name: Consume
    type: operation
    actions:
      - functionRef:
          refName: noop
          arguments:
            input: .context.missing
        dataOutput: .context.out
"#;

#[tokio::test]
async fn lookahead_flags_unresolvable_next_state_arguments() {
    let report = validate_state_flow(&workflow(LOOKAHEAD_ARGUMENT), &flow_registry()).await;
    assert_eq!(report.status, FlowStatus::Invalid);
    assert!(report.messages.iter().any(|message| message.contains(
        "Action in state 'Consume' argument 'input: .context.missing' references undefined or empty data"
    )));
}

#[tokio::test]
async fn trace_is_returned_even_when_invalid() {
    let report = validate_state_flow(&workflow(UNDEFINED_COLLECTION), &flow_registry()).await;
    assert!(!report.is_valid());
    assert!(report
        .trace
        .iter()
        .any(|record| record.state == "ProduceData"));
}
