//! Path selectors: InputPath, Parameters, ResultSelector, ResultPath and
//! OutputPath over JSON values.

use super::definition::ResultPath;
use crate::core::error::{names, AppError};
use crate::core::types::ErrorCategory;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid path '{path}': {reason}")]
    Syntax { path: String, reason: String },
    #[error("path '{path}' could not be found in the input")]
    NoMatch { path: String },
    #[error("unable to apply ResultPath '{path}': {reason}")]
    ResultPathMatch { path: String, reason: String },
}

impl From<PathError> for AppError {
    fn from(err: PathError) -> Self {
        let (code, name) = match &err {
            PathError::Syntax { .. } => ("SFN-PATH-001", names::RUNTIME),
            PathError::NoMatch { .. } => ("SFN-PATH-002", names::RUNTIME),
            PathError::ResultPathMatch { .. } => {
                ("SFN-PATH-003", names::RESULT_PATH_MATCH_FAILURE)
            }
        };
        AppError::named(ErrorCategory::PathError, name, err.to_string()).with_code(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(i64),
}

/// A parsed reference path: `$`, `$.a.b`, `$['a'][0]`, or `$$.State.Name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    context: bool,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let syntax = |reason: &str| PathError::Syntax {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut rest = raw.trim();
        rest = rest
            .strip_prefix('$')
            .ok_or_else(|| syntax("path must start with '$'"))?;
        let context = match rest.strip_prefix('$') {
            Some(stripped) => {
                rest = stripped;
                true
            }
            None => false,
        };

        let mut segments = Vec::new();
        while !rest.is_empty() {
            if let Some(after_dot) = rest.strip_prefix('.') {
                let end = after_dot
                    .find(|c| c == '.' || c == '[')
                    .unwrap_or(after_dot.len());
                let field = &after_dot[..end];
                if field.is_empty() {
                    return Err(syntax("empty field name"));
                }
                segments.push(Segment::Field(field.to_string()));
                rest = &after_dot[end..];
            } else if let Some(after_bracket) = rest.strip_prefix('[') {
                let close = after_bracket
                    .find(']')
                    .ok_or_else(|| syntax("unterminated '['"))?;
                let inner = after_bracket[..close].trim();
                let quoted = inner
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
                match quoted {
                    Some(field) => segments.push(Segment::Field(field.to_string())),
                    None => {
                        let index = inner
                            .parse::<i64>()
                            .map_err(|_| syntax("bracket must hold an index or a quoted name"))?;
                        segments.push(Segment::Index(index));
                    }
                }
                rest = &after_bracket[close + 1..];
            } else {
                return Err(syntax("expected '.' or '['"));
            }
        }

        Ok(JsonPath {
            raw: raw.to_string(),
            context,
            segments,
        })
    }

    pub fn is_context(&self) -> bool {
        self.context
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolve against `input`, or against `context` for `$$` paths.
    pub fn select(&self, input: &Value, context: &Value) -> Result<Value, PathError> {
        let mut current = if self.context { context } else { input };
        for segment in &self.segments {
            let next = match (segment, current) {
                (Segment::Field(name), Value::Object(map)) => map.get(name),
                (Segment::Index(index), Value::Array(items)) => {
                    resolve_index(*index, items.len()).and_then(|i| items.get(i))
                }
                _ => None,
            };
            current = next.ok_or_else(|| PathError::NoMatch {
                path: self.raw.clone(),
            })?;
        }
        Ok(current.clone())
    }

    /// Write `result` into a copy of `target` at this path, creating
    /// missing intermediate objects.
    pub fn inject(&self, target: &Value, result: Value) -> Result<Value, PathError> {
        if self.context {
            return Err(PathError::ResultPathMatch {
                path: self.raw.clone(),
                reason: "context paths cannot be written".to_string(),
            });
        }
        let Some((last, parents)) = self.segments.split_last() else {
            return Ok(result);
        };

        let mut root = target.clone();
        let mut cursor = &mut root;
        for segment in parents {
            cursor = self.step_mut(cursor, segment)?;
        }

        match (last, cursor) {
            (Segment::Field(name), Value::Object(map)) => {
                map.insert(name.clone(), result);
            }
            (Segment::Index(index), Value::Array(items)) => {
                match resolve_index(*index, items.len()) {
                    Some(i) => items[i] = result,
                    None => return Err(self.match_failure("array index out of range")),
                }
            }
            (_, other) => {
                return Err(self.match_failure(&format!(
                    "cannot write into a {} value",
                    type_name(other)
                )));
            }
        }
        Ok(root)
    }

    fn step_mut<'a>(
        &self,
        cursor: &'a mut Value,
        segment: &Segment,
    ) -> Result<&'a mut Value, PathError> {
        match (segment, cursor) {
            (Segment::Field(name), Value::Object(map)) => Ok(map
                .entry(name.clone())
                .or_insert_with(|| Value::Object(Map::new()))),
            (Segment::Index(index), Value::Array(items)) => {
                match resolve_index(*index, items.len()) {
                    Some(i) => Ok(&mut items[i]),
                    None => Err(self.match_failure("array index out of range")),
                }
            }
            (_, other) => Err(self.match_failure(&format!(
                "cannot descend into a {} value",
                type_name(other)
            ))),
        }
    }

    fn match_failure(&self, reason: &str) -> PathError {
        PathError::ResultPathMatch {
            path: self.raw.clone(),
            reason: reason.to_string(),
        }
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Resolve `path` against `input` (or `context` for `$$` paths).
pub fn select(input: &Value, context: &Value, path: &str) -> Result<Value, PathError> {
    JsonPath::parse(path)?.select(input, context)
}

/// `None` passes the raw input through unchanged.
pub fn apply_input_path(raw: &Value, selector: Option<&str>) -> Result<Value, PathError> {
    match selector {
        None => Ok(raw.clone()),
        Some(path) => select(raw, &Value::Null, path),
    }
}

/// Build the effective parameters from a payload template. Keys ending in
/// `.$` take the value their path selects; everything else is copied.
pub fn apply_parameters(
    value: &Value,
    template: Option<&Value>,
    context: &Value,
) -> Result<Value, PathError> {
    match template {
        None => Ok(value.clone()),
        Some(template) => resolve_template(template, value, context),
    }
}

fn resolve_template(template: &Value, input: &Value, context: &Value) -> Result<Value, PathError> {
    match template {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, nested) in map {
                match key.strip_suffix(".$") {
                    Some(stripped) => {
                        let path = nested.as_str().ok_or_else(|| PathError::Syntax {
                            path: key.clone(),
                            reason: "the value of a '.$' key must be a path string".to_string(),
                        })?;
                        out.insert(stripped.to_string(), select(input, context, path)?);
                    }
                    None => {
                        out.insert(key.clone(), resolve_template(nested, input, context)?);
                    }
                }
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_template(item, input, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// Merge `result` into `original` as directed by `selector`.
pub fn apply_result_path(
    original: &Value,
    selector: &ResultPath,
    result: Value,
) -> Result<Value, PathError> {
    match selector {
        ResultPath::Discard => Ok(original.clone()),
        ResultPath::Path(path) => JsonPath::parse(path)?.inject(original, result),
    }
}

/// `None` passes the value through unchanged.
pub fn apply_output_path(value: &Value, selector: Option<&str>) -> Result<Value, PathError> {
    apply_input_path(value, selector)
}
