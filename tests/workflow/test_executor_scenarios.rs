use serde_json::json;
use statewalk::core::workflow::executor::{ExecutionConfig, StateExecutor};
use statewalk::core::workflow::registry::FunctionRegistry;
use statewalk::core::workflow::schema::Workflow;
use tokio_util::sync::CancellationToken;

fn scenario_registry() -> FunctionRegistry {
    let mut builder = FunctionRegistry::builder();
    builder
        .register_fn("initParallel", |_input| {
            Ok(json!({"items": [{"value": 60}, {"value": 30}, {"value": 45}], "value": 60}))
        })
        .register_fn("produceData", |_input| {
            Ok(json!([{"value": 1}, {"value": 2}, {"value": 3}]))
        })
        .register_fn("processItem", |input| {
            Ok(json!({"result": input.get("value").cloned().unwrap_or(json!(0))}))
        })
        .register_fn("method1", |input| Ok(json!(input.as_i64().unwrap_or(0) + 1)))
        .register_fn("method2", |input| {
            Ok(json!(format!("Processed: {}", input.as_str().unwrap_or(""))))
        })
        .register_fn("label", |input| Ok(json!(format!("high:{}", input))))
        .register_fn("tag", |input| Ok(input));
    builder.build()
}

fn workflow(text: &str) -> Workflow {
    Workflow::from_yaml(text).expect("workflow parses")
}

const SEQUENTIAL_OPERATION: &str = r#"
id: test-workflow
specVersion: "1.0"
start: Start
states:
  - name: Start
    type: operation
    transition: End
    actions:
      - functionRef:
          refName: initParallel
          arguments:
            input: "{}"
        dataOutput: .context.startOutput
  - name: End
    type: end
"#;

#[tokio::test]
async fn sequential_operation_writes_its_output() {
    let executor = StateExecutor::new(scenario_registry());
    let result = executor
        .execute_workflow(&workflow(SEQUENTIAL_OPERATION))
        .await
        .unwrap();
    assert_eq!(
        result["context"]["startOutput"]["items"],
        json!([{"value": 60}, {"value": 30}, {"value": 45}])
    );
    assert_eq!(result["context"]["startOutput"]["value"], json!(60));
}

const MISSING_DATA_OUTPUT: &str = r#"
id: test-workflow
specVersion: "1.0"
start: Start
states:
  - name: Start
    type: operation
    transition: End
    actions:
      - functionRef:
          refName: initParallel
          arguments:
            input: "{}"
  - name: End
    type: end
"#;

#[tokio::test]
async fn action_without_data_output_discards_its_result() {
    let executor = StateExecutor::new(scenario_registry());
    let result = executor
        .execute_workflow(&workflow(MISSING_DATA_OUTPUT))
        .await
        .unwrap();
    assert!(result["context"].get("startOutput").is_none());
}

const FOREACH_WORKFLOW: &str = r#"
id: foreach-workflow
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
async fn foreach_preserves_input_order_in_results() {
    let executor = StateExecutor::new(scenario_registry());
    let result = executor
        .execute_workflow(&workflow(FOREACH_WORKFLOW))
        .await
        .unwrap();
    let results = result["context"]["ForEachStateOutput"]["results"]
        .as_array()
        .expect("results list");
    assert_eq!(results.len(), 3);
    for (index, iteration) in results.iter().enumerate() {
        assert_eq!(
            iteration["processedItem"]["result"],
            json!(index as u64 + 1)
        );
    }
    // The producing state's output survives the foreach merge.
    assert_eq!(
        result["context"]["producedData"],
        json!([{"value": 1}, {"value": 2}, {"value": 3}])
    );
}

const PARALLEL_WORKFLOW: &str = r#"
id: parallel-workflow
specVersion: "1.0"
start: ParallelStart
states:
  - name: ParallelStart
    type: parallel
    transition: End
    branches:
      - name: Branch1
        states:
          - name: Branch1Op
            type: operation
            end: true
            actions:
              - functionRef:
                  refName: method1
                  arguments:
                    input: 5
                dataOutput: .context.branch1
      - name: Branch2
        states:
          - name: Branch2Op
            type: operation
            end: true
            actions:
              - functionRef:
                  refName: method2
                  arguments:
                    input: test
                dataOutput: .context.branch2
  - name: End
    type: end
"#;

#[tokio::test]
async fn parallel_branches_merge_into_one_context() {
    let executor = StateExecutor::new(scenario_registry());
    let result = executor
        .execute_workflow(&workflow(PARALLEL_WORKFLOW))
        .await
        .unwrap();
    assert_eq!(result["context"]["branch1"], json!(6));
    assert_eq!(result["context"]["branch2"], json!("Processed: test"));
}

const SWITCH_WORKFLOW: &str = r#"
id: switch-workflow
specVersion: "1.0"
start: Init
states:
  - name: Init
    type: operation
    transition: Decide
    actions:
      - functionRef:
          refName: initParallel
          arguments:
            input: "{}"
        dataOutput: .context.startOutput
  - name: Decide
    type: switch
    dataConditions:
      - condition: .context.startOutput.value
        transition: Record
      - condition: "true"
        end: true
  - name: Record
    type: operation
    transition: Done
    actions:
      - functionRef:
          refName: label
          arguments:
            input: .context.startOutput.value
        dataOutput: .context.recorded
  - name: Done
    type: end
"#;

#[tokio::test]
async fn switch_jumps_to_the_first_truthy_condition() {
    let executor = StateExecutor::new(scenario_registry());
    let result = executor
        .execute_workflow(&workflow(SWITCH_WORKFLOW))
        .await
        .unwrap();
    assert_eq!(result["context"]["recorded"], json!("high:60"));
}

const SWITCH_NO_EXIT: &str = r#"
id: switch-no-exit
specVersion: "1.0"
start: Decide
states:
  - name: Decide
    type: switch
    dataConditions:
      - condition: .context.missing
        transition: Decide
"#;

#[tokio::test]
async fn switch_without_match_or_default_is_an_error() {
    let executor = StateExecutor::new(scenario_registry());
    let err = executor
        .execute_workflow(&workflow(SWITCH_NO_EXIT))
        .await
        .unwrap_err();
    assert_eq!(err.code, "WF-EXEC-004");
}

const SUBFLOW_WORKFLOW: &str = r#"
id: subflow-workflow
specVersion: "1.0"
start: Delegate
states:
  - name: Delegate
    type: subflow
    workflowId: tagging
    transition: Done
  - name: Done
    type: end
subWorkflows:
  - id: tagging
    specVersion: "1.0"
    start: TagA
    states:
      - name: TagA
        type: operation
        actions:
          - functionRef:
              refName: tag
              arguments:
                input: alpha
            dataOutput: .context.tagA
      - name: TagB
        type: operation
        actions:
          - functionRef:
              refName: tag
              arguments:
                input: beta
            dataOutput: .context.tagB
"#;

#[tokio::test]
async fn subflow_states_run_in_declared_order_not_transition_order() {
    // TagA declares no transition; TagB still runs because sub-workflow
    // states execute in declared order.
    let executor = StateExecutor::new(scenario_registry());
    let result = executor
        .execute_workflow(&workflow(SUBFLOW_WORKFLOW))
        .await
        .unwrap();
    assert_eq!(
        result["context"]["SubWorkflowOutput"]["tagA"],
        json!("alpha")
    );
    assert_eq!(result["context"]["SubWorkflowOutput"]["tagB"], json!("beta"));
}

const CYCLIC_WORKFLOW: &str = r#"
id: cyclic-workflow
specVersion: "1.0"
start: A
states:
  - name: A
    type: operation
    transition: B
    actions: []
  - name: B
    type: operation
    transition: A
    actions: []
"#;

#[tokio::test]
async fn transition_cap_stops_cyclic_documents() {
    let config = ExecutionConfig {
        max_transitions: 10,
        strict_expressions: false,
    };
    let executor = StateExecutor::with_config(scenario_registry(), config);
    let err = executor
        .execute_workflow(&workflow(CYCLIC_WORKFLOW))
        .await
        .unwrap_err();
    assert_eq!(err.code, "WF-ITER-001");
}

const UNKNOWN_FUNCTION: &str = r#"
id: unknown-function
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
async fn unresolved_function_is_fatal() {
    let executor = StateExecutor::new(scenario_registry());
    let err = executor
        .execute_workflow(&workflow(UNKNOWN_FUNCTION))
        .await
        .unwrap_err();
    assert_eq!(err.code, "WF-FN-001");
}

const UNKNOWN_SUBFLOW: &str = r#"
id: unknown-subflow
specVersion: "1.0"
start: Delegate
states:
  - name: Delegate
    type: subflow
    workflowId: nope
"#;

#[tokio::test]
async fn unresolved_sub_workflow_is_fatal() {
    let executor = StateExecutor::new(scenario_registry());
    let err = executor
        .execute_workflow(&workflow(UNKNOWN_SUBFLOW))
        .await
        .unwrap_err();
    assert_eq!(err.code, "WF-EXEC-005");
}

const UNKNOWN_TRANSITION: &str = r#"
id: unknown-transition
specVersion: "1.0"
start: Start
states:
  - name: Start
    type: operation
    transition: Missing
    actions: []
"#;

#[tokio::test]
async fn unresolved_transition_target_is_fatal() {
    let executor = StateExecutor::new(scenario_registry());
    let err = executor
        .execute_workflow(&workflow(UNKNOWN_TRANSITION))
        .await
        .unwrap_err();
    assert_eq!(err.code, "WF-EXEC-003");
}

#[tokio::test]
async fn cancelled_token_aborts_execution() {
    let token = CancellationToken::new();
    token.cancel();
    let executor = StateExecutor::new(scenario_registry()).with_cancellation(token);
    let err = executor
        .execute_workflow(&workflow(SEQUENTIAL_OPERATION))
        .await
        .unwrap_err();
    assert_eq!(err.code, "WF-CANCEL-001");
}
