use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn default_interval_seconds() -> f64 {
    1.0
}

fn default_backoff_rate() -> f64 {
    2.0
}

fn default_max_attempts() -> u32 {
    3
}

/// Root document of a workflow: the top-level machine or one Parallel branch.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateMachineDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub start_at: String,
    pub states: IndexMap<String, StateDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum StateType {
    Task,
    Parallel,
    Pass,
    Wait,
    Choice,
    Succeed,
    Fail,
}

impl StateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateType::Task => "Task",
            StateType::Parallel => "Parallel",
            StateType::Pass => "Pass",
            StateType::Wait => "Wait",
            StateType::Choice => "Choice",
            StateType::Succeed => "Succeed",
            StateType::Fail => "Fail",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, StateType::Succeed | StateType::Fail)
    }
}

/// Where a state's result lands in its effective input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultPath {
    /// `null`: drop the result and keep the input.
    Discard,
    Path(String),
}

impl Default for ResultPath {
    fn default() -> Self {
        ResultPath::Path("$".to_string())
    }
}

impl<'de> Deserialize<'de> for ResultPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            Some(path) => ResultPath::Path(path),
            None => ResultPath::Discard,
        })
    }
}

impl Serialize for ResultPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResultPath::Discard => serializer.serialize_none(),
            ResultPath::Path(path) => serializer.serialize_str(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JitterStrategy {
    Full,
    #[default]
    None,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Retrier {
    pub error_equals: Vec<String>,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_seconds: Option<f64>,
    #[serde(default)]
    pub jitter_strategy: JitterStrategy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Catcher {
    pub error_equals: Vec<String>,
    pub next: String,
    #[serde(default)]
    pub result_path: ResultPath,
}

/// One Choice rule. Leaf rules carry a `Variable` and a single comparison
/// operator key, collected in `comparison`; compound rules use And/Or/Not.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<ChoiceRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<ChoiceRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<ChoiceRule>>,
    #[serde(flatten)]
    pub comparison: Map<String, Value>,
}

/// Flat record of every States Language field; which ones apply depends on
/// `Type`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateDefinition {
    #[serde(rename = "Type")]
    pub state_type: StateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<StateMachineDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_selector: Option<Value>,
    #[serde(default)]
    pub result_path: ResultPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retry: Vec<Retrier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub catch: Vec<Catcher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ChoiceRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl StateDefinition {
    /// Bare definition of the given type; the remaining fields take their
    /// States Language defaults.
    pub fn of_type(state_type: StateType) -> Self {
        StateDefinition {
            state_type,
            comment: None,
            resource: None,
            branches: Vec::new(),
            input_path: None,
            parameters: None,
            result_selector: None,
            result_path: ResultPath::default(),
            output_path: None,
            result: None,
            retry: Vec::new(),
            catch: Vec::new(),
            next: None,
            end: false,
            timeout_seconds: None,
            seconds: None,
            seconds_path: None,
            timestamp: None,
            timestamp_path: None,
            choices: Vec::new(),
            default: None,
            error: None,
            cause: None,
        }
    }
}

fn invalid(code: &str, message: String) -> AppError {
    AppError::new(ErrorCategory::ConfigurationError, message).with_code(code)
}

impl StateMachineDefinition {
    /// Load a definition from disk. `.yaml`/`.yml` files are parsed as YAML,
    /// anything else as JSON.
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read definition {}: {}", path.display(), err),
            )
            .with_code("SFN-DEF-001")
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml_str(&raw)
        } else {
            Self::from_json_str(&raw)
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AppError> {
        let definition: StateMachineDefinition = serde_json::from_str(raw).map_err(|err| {
            invalid("SFN-DEF-002", format!("failed to parse definition: {}", err))
        })?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, AppError> {
        let definition: StateMachineDefinition = serde_yaml::from_str(raw).map_err(|err| {
            invalid("SFN-DEF-002", format!("failed to parse definition: {}", err))
        })?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn state(&self, name: &str) -> Option<&StateDefinition> {
        self.states.get(name)
    }

    /// Structural checks run before anything executes.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.states.is_empty() {
            return Err(invalid(
                "SFN-DEF-003",
                "definition must declare at least one state".to_string(),
            ));
        }
        if !self.states.contains_key(&self.start_at) {
            return Err(invalid(
                "SFN-DEF-004",
                format!("StartAt '{}' does not name a state", self.start_at),
            ));
        }

        let known: HashSet<&str> = self.states.keys().map(String::as_str).collect();
        let check_target = |state: &str, target: &str| -> Result<(), AppError> {
            if known.contains(target) {
                Ok(())
            } else {
                Err(invalid(
                    "SFN-DEF-004",
                    format!("state '{}' transitions to unknown state '{}'", state, target),
                ))
            }
        };

        for (name, state) in &self.states {
            if let Some(next) = &state.next {
                check_target(name, next)?;
            }
            if let Some(default) = &state.default {
                check_target(name, default)?;
            }
            for catcher in &state.catch {
                check_target(name, &catcher.next)?;
            }
            for rule in &state.choices {
                if let Some(next) = &rule.next {
                    check_target(name, next)?;
                }
            }
            validate_state(name, state)?;
        }
        Ok(())
    }
}

fn validate_state(name: &str, state: &StateDefinition) -> Result<(), AppError> {
    let kind = state.state_type;
    match kind {
        StateType::Task if state.resource.is_none() => {
            return Err(invalid(
                "SFN-DEF-005",
                format!("Task state '{}' is missing Resource", name),
            ));
        }
        StateType::Parallel => {
            if state.branches.is_empty() {
                return Err(invalid(
                    "SFN-DEF-005",
                    format!("Parallel state '{}' must declare at least one branch", name),
                ));
            }
            for branch in &state.branches {
                branch.validate()?;
            }
        }
        StateType::Choice => {
            if state.choices.is_empty() {
                return Err(invalid(
                    "SFN-DEF-005",
                    format!("Choice state '{}' must declare at least one rule", name),
                ));
            }
            if let Some(rule) = state.choices.iter().find(|rule| rule.next.is_none()) {
                return Err(invalid(
                    "SFN-DEF-005",
                    format!(
                        "Choice state '{}' has a rule without Next: {:?}",
                        name, rule.variable
                    ),
                ));
            }
        }
        _ => {}
    }

    if !kind.is_terminal() && kind != StateType::Choice && state.next.is_some() == state.end {
        return Err(invalid(
            "SFN-DEF-006",
            format!(
                "{} state '{}' must declare exactly one of Next or End",
                kind.as_str(),
                name
            ),
        ));
    }

    for retrier in &state.retry {
        if retrier.error_equals.is_empty() {
            return Err(invalid(
                "SFN-DEF-007",
                format!("Retrier in state '{}' has empty ErrorEquals", name),
            ));
        }
        if retrier.backoff_rate < 1.0 {
            return Err(invalid(
                "SFN-DEF-007",
                format!("Retrier in state '{}' has BackoffRate below 1.0", name),
            ));
        }
        if retrier.interval_seconds <= 0.0 {
            return Err(invalid(
                "SFN-DEF-007",
                format!("Retrier in state '{}' must have a positive IntervalSeconds", name),
            ));
        }
    }
    if state.catch.iter().any(|catcher| catcher.error_equals.is_empty()) {
        return Err(invalid(
            "SFN-DEF-007",
            format!("Catcher in state '{}' has empty ErrorEquals", name),
        ));
    }
    Ok(())
}
