use crate::core::error::AppError;
use crate::core::workflow::registry::{
    FunctionRegistry, FunctionRegistryBuilder, WorkflowFunction,
};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Returns its argument unchanged.
pub struct EchoFunction;

#[async_trait]
impl WorkflowFunction for EchoFunction {
    fn name(&self) -> &str {
        "echo"
    }

    async fn invoke(&self, input: Value) -> Result<Value, AppError> {
        Ok(input)
    }
}

/// Returns the current wall-clock time.
pub struct TimestampFunction;

#[async_trait]
impl WorkflowFunction for TimestampFunction {
    fn name(&self) -> &str {
        "timestamp"
    }

    async fn invoke(&self, _input: Value) -> Result<Value, AppError> {
        Ok(json!({"timestamp": chrono::Utc::now().to_rfc3339()}))
    }
}

/// Builds `{"items": [{"value": 0}, ...]}` from a `count` argument, handy for
/// exercising foreach states from the command line.
pub struct MakeRangeFunction;

#[async_trait]
impl WorkflowFunction for MakeRangeFunction {
    fn name(&self) -> &str {
        "makeRange"
    }

    async fn invoke(&self, input: Value) -> Result<Value, AppError> {
        let count = input.get("count").and_then(Value::as_u64).unwrap_or(0);
        let items: Vec<Value> = (0..count).map(|i| json!({"value": i})).collect();
        Ok(json!({"items": items}))
    }
}

/// Register the built-in functions into the supplied builder.
pub fn register_builtins(builder: &mut FunctionRegistryBuilder) {
    builder
        .register(EchoFunction)
        .register(TimestampFunction)
        .register(MakeRangeFunction);
}

/// Registry preloaded with the built-in functions.
pub fn builtin_registry() -> FunctionRegistry {
    let mut builder = FunctionRegistry::builder();
    register_builtins(&mut builder);
    builder.build()
}
