use serde_json::Value;

/// Deep-merge `b` into a copy of `a`.
///
/// Per key present in `b`: two mappings recurse, two sequences concatenate
/// (`b` after `a`, order preserved), anything else is overwritten by `b`.
/// Keys only present in `a` are kept. Neither input is mutated.
pub fn merge(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            let mut out = left.clone();
            for (key, value) in right {
                let merged = match out.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Array(left), Value::Array(right)) => {
            let mut out = left.clone();
            out.extend(right.iter().cloned());
            Value::Array(out)
        }
        (_, other) => other.clone(),
    }
}
