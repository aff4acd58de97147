use crate::core::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait implemented by callable workflow functions.
///
/// Functions carry the side effects of a workflow; the interpreter only sees
/// their name and their value-in/value-out contract.
#[async_trait]
pub trait WorkflowFunction: Send + Sync + 'static {
    /// Function name used in `functionRef.refName` fields.
    fn name(&self) -> &str;

    /// Invoke the function with the resolved argument value.
    async fn invoke(&self, input: Value) -> Result<Value, AppError>;
}

/// Builder used to register functions before execution.
pub struct FunctionRegistryBuilder {
    functions: HashMap<String, Arc<dyn WorkflowFunction>>,
}

impl Default for FunctionRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistryBuilder {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn register<T: WorkflowFunction>(&mut self, function: T) -> &mut Self {
        let name = function.name().to_string();
        if self.functions.contains_key(&name) {
            panic!("duplicate function registered: {}", name);
        }
        self.functions.insert(name, Arc::new(function));
        self
    }

    /// Register a plain closure under the given name.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(Value) -> Result<Value, AppError> + Send + Sync + 'static,
    {
        self.register(ClosureFunction {
            name: name.into(),
            body: Box::new(body),
        })
    }

    pub fn build(self) -> FunctionRegistry {
        FunctionRegistry {
            inner: Arc::new(self.functions),
        }
    }
}

/// Immutable name-to-function mapping available during execution.
#[derive(Clone)]
pub struct FunctionRegistry {
    inner: Arc<HashMap<String, Arc<dyn WorkflowFunction>>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistryBuilder::new().build()
    }

    pub fn builder() -> FunctionRegistryBuilder {
        FunctionRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn WorkflowFunction>> {
        self.inner.get(name).cloned()
    }
}

struct ClosureFunction {
    name: String,
    body: Box<dyn Fn(Value) -> Result<Value, AppError> + Send + Sync>,
}

#[async_trait]
impl WorkflowFunction for ClosureFunction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, AppError> {
        (self.body)(input)
    }
}
