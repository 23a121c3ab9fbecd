use serde_json::{Map, Value};

/// Lower the first character of a key: `NetworkConfiguration` becomes
/// `networkConfiguration`.
pub fn pascal_case_to_camel_case(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rewrite every object key in `value`, recursing through nested objects
/// and arrays. Scalars are returned unchanged.
pub fn pascal_case_to_camel_case_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, nested) in map {
                out.insert(
                    pascal_case_to_camel_case(key),
                    pascal_case_to_camel_case_keys(nested),
                );
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(pascal_case_to_camel_case_keys).collect())
        }
        other => other.clone(),
    }
}
