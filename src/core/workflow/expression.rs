use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde_json::{Map, Value};

/// Selection query evaluation engine for workflow documents.
///
/// Expressions use a jq-compatible subset: identity (`.`), dot-path
/// navigation (`.context.items`), array indexing (`.items[0]`), the
/// alternative operator (`.a // .b`), and JSON literals. A query in general
/// produces a stream of results; this engine returns the head.
pub struct ExpressionEngine {
    strict: bool,
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        ExpressionEngine { strict: false }
    }
}

impl ExpressionEngine {
    /// Engine that reports compile/evaluation failures instead of degrading
    /// the expression to a literal string.
    pub fn strict() -> Self {
        ExpressionEngine { strict: true }
    }

    /// Compile the given expression string into a query.
    pub fn compile(&self, expr: &str) -> Result<Query, AppError> {
        parse_query(expr).map_err(|err| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("expression compile error: {}", err),
            )
            .with_code("WF-EXPR-001")
        })
    }

    /// Evaluate an expression value against the provided data.
    ///
    /// Non-string expressions pass through unchanged: they are already
    /// resolved literals.
    pub fn evaluate(&self, expr: &Value, data: &Value) -> Result<Value, AppError> {
        match expr {
            Value::String(text) => self.evaluate_str(text, data),
            other => Ok(other.clone()),
        }
    }

    /// Evaluate a textual expression against the provided data.
    ///
    /// The literal strings `"{}"` and `""` evaluate to an empty mapping. A
    /// query that fails to compile or evaluate degrades to the raw expression
    /// text as a literal, unless the engine is strict.
    pub fn evaluate_str(&self, expr: &str, data: &Value) -> Result<Value, AppError> {
        if expr.is_empty() || expr == "{}" {
            return Ok(Value::Object(Map::new()));
        }
        let query = match parse_query(expr) {
            Ok(query) => query,
            Err(reason) => return self.fallback(expr, &reason),
        };
        match apply_query(&query, data) {
            Ok(value) => Ok(value),
            Err(reason) => self.fallback(expr, &reason),
        }
    }

    fn fallback(&self, expr: &str, reason: &str) -> Result<Value, AppError> {
        if self.strict {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                format!("expression '{}' failed to evaluate: {}", expr, reason),
            )
            .with_code("WF-EXPR-002"));
        }
        tracing::debug!(
            expression = expr,
            reason = reason,
            "query failed, treating expression as a literal value"
        );
        Ok(Value::String(expr.to_string()))
    }
}

/// Truthiness used by switch conditions: everything that is not
/// null/false/zero/empty counts as true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Compiled form of a selection expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Identity,
    Path(Vec<PathStep>),
    Literal(Value),
    Alternative(Box<Query>, Box<Query>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    Field(String),
    Index(usize),
}

fn parse_query(text: &str) -> Result<Query, String> {
    let mut parts = split_alternatives(text)
        .into_iter()
        .map(parse_primary)
        .collect::<Result<Vec<_>, String>>()?;
    let mut query = parts
        .pop()
        .ok_or_else(|| "empty expression".to_string())?;
    while let Some(lhs) = parts.pop() {
        query = Query::Alternative(Box::new(lhs), Box::new(query));
    }
    Ok(query)
}

/// Split on the `//` alternative operator, ignoring occurrences inside
/// double-quoted string literals.
fn split_alternatives(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    let mut in_string = false;
    while pos < bytes.len() {
        match bytes[pos] {
            b'"' if !in_string => in_string = true,
            b'"' if pos > 0 && bytes[pos - 1] != b'\\' => in_string = false,
            b'/' if !in_string && pos + 1 < bytes.len() && bytes[pos + 1] == b'/' => {
                parts.push(&text[start..pos]);
                pos += 2;
                start = pos;
                continue;
            }
            _ => {}
        }
        pos += 1;
    }
    parts.push(&text[start..]);
    parts
}

fn parse_primary(text: &str) -> Result<Query, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("empty expression".to_string());
    }
    if trimmed.starts_with('.') {
        return parse_path(trimmed);
    }
    serde_json::from_str(trimmed)
        .map(Query::Literal)
        .map_err(|err| format!("not a query or literal: {}", err))
}

fn parse_path(text: &str) -> Result<Query, String> {
    let bytes = text.as_bytes();
    let mut steps = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'.' => {
                pos += 1;
                let start = pos;
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                if pos == start {
                    if pos >= bytes.len() || bytes[pos] == b'[' {
                        continue;
                    }
                    return Err(format!("unexpected character at position {}", pos));
                }
                steps.push(PathStep::Field(text[start..pos].to_string()));
            }
            b'[' => {
                pos += 1;
                let start = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                if pos == start || pos >= bytes.len() || bytes[pos] != b']' {
                    return Err("invalid array index".to_string());
                }
                let index: usize = text[start..pos]
                    .parse()
                    .map_err(|_| "invalid array index".to_string())?;
                steps.push(PathStep::Index(index));
                pos += 1;
            }
            other => {
                return Err(format!("unexpected character '{}' in query", other as char));
            }
        }
    }
    if steps.is_empty() {
        Ok(Query::Identity)
    } else {
        Ok(Query::Path(steps))
    }
}

fn apply_query(query: &Query, data: &Value) -> Result<Value, String> {
    match query {
        Query::Identity => Ok(data.clone()),
        Query::Literal(value) => Ok(value.clone()),
        Query::Path(steps) => {
            let mut current = data.clone();
            for step in steps {
                current = match (step, &current) {
                    (PathStep::Field(name), Value::Object(map)) => {
                        map.get(name).cloned().unwrap_or(Value::Null)
                    }
                    (PathStep::Field(_), Value::Null) => Value::Null,
                    (PathStep::Field(name), other) => {
                        return Err(format!(
                            "cannot index {} with \"{}\"",
                            kind_name(other),
                            name
                        ));
                    }
                    (PathStep::Index(index), Value::Array(items)) => {
                        items.get(*index).cloned().unwrap_or(Value::Null)
                    }
                    (PathStep::Index(_), Value::Null) => Value::Null,
                    (PathStep::Index(index), other) => {
                        return Err(format!(
                            "cannot index {} with {}",
                            kind_name(other),
                            index
                        ));
                    }
                };
            }
            Ok(current)
        }
        Query::Alternative(lhs, rhs) => match apply_query(lhs, data)? {
            Value::Null | Value::Bool(false) => apply_query(rhs, data),
            value => Ok(value),
        },
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
