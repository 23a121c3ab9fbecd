use super::{State, StateOutcome, StateScope, Transition};
use crate::core::error::{names, AppError};
use crate::core::history_recorder::HistoryEventType;
use crate::core::state_machine::definition::{ChoiceRule, StateDefinition, StateType};
use crate::core::state_machine::paths::{self, PathError};
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    String,
    Numeric,
    Boolean,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Equals,
    LessThan,
    GreaterThan,
    LessThanEquals,
    GreaterThanEquals,
}

impl Relation {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Relation::Equals => ordering == Ordering::Equal,
            Relation::LessThan => ordering == Ordering::Less,
            Relation::GreaterThan => ordering == Ordering::Greater,
            Relation::LessThanEquals => ordering != Ordering::Greater,
            Relation::GreaterThanEquals => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeTest {
    Null,
    Present,
    String,
    Numeric,
    Boolean,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Literal(Value),
    Path(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Rule {
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
    Compare {
        variable: String,
        family: Family,
        relation: Relation,
        operand: Operand,
    },
    Matches {
        variable: String,
        pattern: String,
    },
    Is {
        variable: String,
        test: TypeTest,
        expected: bool,
    },
}

fn invalid_rule(state: &str, reason: String) -> AppError {
    AppError::configuration(format!("Choice state '{}': {}", state, reason)).with_code("SFN-CHOICE-001")
}

fn parse_rule(state: &str, rule: &ChoiceRule) -> Result<Rule, AppError> {
    if let Some(rules) = &rule.and {
        return Ok(Rule::And(parse_all(state, rules)?));
    }
    if let Some(rules) = &rule.or {
        return Ok(Rule::Or(parse_all(state, rules)?));
    }
    if let Some(inner) = &rule.not {
        return Ok(Rule::Not(Box::new(parse_rule(state, inner)?)));
    }

    let variable = rule
        .variable
        .clone()
        .ok_or_else(|| invalid_rule(state, "rule is missing Variable".to_string()))?;
    let mut operators = rule.comparison.iter();
    let (key, operand) = match (operators.next(), operators.next()) {
        (Some(entry), None) => entry,
        _ => {
            return Err(invalid_rule(
                state,
                format!("rule on {} must have exactly one comparison operator", variable),
            ))
        }
    };
    parse_comparison(state, variable, key, operand)
}

fn parse_all(state: &str, rules: &[ChoiceRule]) -> Result<Vec<Rule>, AppError> {
    if rules.is_empty() {
        return Err(invalid_rule(state, "And/Or needs at least one rule".to_string()));
    }
    rules.iter().map(|rule| parse_rule(state, rule)).collect()
}

fn parse_comparison(state: &str, variable: String, key: &str, operand: &Value) -> Result<Rule, AppError> {
    let unknown = || invalid_rule(state, format!("unsupported comparison operator {}", key));

    if let Some(test) = key.strip_prefix("Is") {
        let test = match test {
            "Null" => TypeTest::Null,
            "Present" => TypeTest::Present,
            "String" => TypeTest::String,
            "Numeric" => TypeTest::Numeric,
            "Boolean" => TypeTest::Boolean,
            "Timestamp" => TypeTest::Timestamp,
            _ => return Err(unknown()),
        };
        let expected = operand
            .as_bool()
            .ok_or_else(|| invalid_rule(state, format!("{} expects a boolean", key)))?;
        return Ok(Rule::Is {
            variable,
            test,
            expected,
        });
    }

    if key == "StringMatches" {
        let pattern = operand
            .as_str()
            .ok_or_else(|| invalid_rule(state, "StringMatches expects a string".to_string()))?;
        return Ok(Rule::Matches {
            variable,
            pattern: pattern.to_string(),
        });
    }

    let (family, rest) = [
        ("String", Family::String),
        ("Numeric", Family::Numeric),
        ("Boolean", Family::Boolean),
        ("Timestamp", Family::Timestamp),
    ]
    .into_iter()
    .find_map(|(prefix, family)| key.strip_prefix(prefix).map(|rest| (family, rest)))
    .ok_or_else(unknown)?;

    let (relation_name, is_path) = match rest.strip_suffix("Path") {
        Some(stripped) => (stripped, true),
        None => (rest, false),
    };
    let relation = match relation_name {
        "Equals" => Relation::Equals,
        "LessThan" => Relation::LessThan,
        "GreaterThan" => Relation::GreaterThan,
        "LessThanEquals" => Relation::LessThanEquals,
        "GreaterThanEquals" => Relation::GreaterThanEquals,
        _ => return Err(unknown()),
    };
    if family == Family::Boolean && relation != Relation::Equals {
        return Err(unknown());
    }

    let operand = if is_path {
        let path = operand
            .as_str()
            .ok_or_else(|| invalid_rule(state, format!("{} expects a path string", key)))?;
        Operand::Path(path.to_string())
    } else {
        Operand::Literal(operand.clone())
    };
    Ok(Rule::Compare {
        variable,
        family,
        relation,
        operand,
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|timestamp| timestamp.with_timezone(&Utc))
}

fn order(family: Family, left: &Value, right: &Value) -> Option<Ordering> {
    match family {
        Family::String => Some(left.as_str()?.cmp(right.as_str()?)),
        Family::Numeric => left.as_f64()?.partial_cmp(&right.as_f64()?),
        Family::Boolean => Some(left.as_bool()?.cmp(&right.as_bool()?)),
        Family::Timestamp => Some(parse_timestamp(left)?.cmp(&parse_timestamp(right)?)),
    }
}

/// `*` matches any run of characters; `\*` is a literal asterisk.
fn string_matches(text: &str, pattern: &str) -> bool {
    #[derive(PartialEq)]
    enum Token {
        Literal(char),
        Wildcard,
    }
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => tokens.push(Token::Literal(escaped)),
                None => tokens.push(Token::Literal('\\')),
            },
            '*' => tokens.push(Token::Wildcard),
            other => tokens.push(Token::Literal(other)),
        }
    }

    let text: Vec<char> = text.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            Some(Token::Wildcard) => {
                backtrack = Some((p, t));
                p += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|token| *token == Token::Wildcard)
}

impl Rule {
    fn evaluate(&self, input: &Value, context: &Value) -> Result<bool, AppError> {
        match self {
            Rule::And(rules) => {
                for rule in rules {
                    if !rule.evaluate(input, context)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Rule::Or(rules) => {
                for rule in rules {
                    if rule.evaluate(input, context)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Rule::Not(rule) => Ok(!rule.evaluate(input, context)?),
            Rule::Is {
                variable,
                test,
                expected,
            } => {
                let value = match paths::select(input, context, variable) {
                    Ok(value) => Some(value),
                    Err(PathError::NoMatch { .. }) => None,
                    Err(err) => return Err(err.into()),
                };
                let actual = match (test, value) {
                    (TypeTest::Present, value) => value.is_some(),
                    (_, None) => false,
                    (TypeTest::Null, Some(value)) => value.is_null(),
                    (TypeTest::String, Some(value)) => value.is_string(),
                    (TypeTest::Numeric, Some(value)) => value.is_number(),
                    (TypeTest::Boolean, Some(value)) => value.is_boolean(),
                    (TypeTest::Timestamp, Some(value)) => parse_timestamp(&value).is_some(),
                };
                Ok(actual == *expected)
            }
            Rule::Matches { variable, pattern } => {
                let value = paths::select(input, context, variable)?;
                Ok(value
                    .as_str()
                    .map(|text| string_matches(text, pattern))
                    .unwrap_or(false))
            }
            Rule::Compare {
                variable,
                family,
                relation,
                operand,
            } => {
                let left = paths::select(input, context, variable)?;
                let right = match operand {
                    Operand::Literal(value) => value.clone(),
                    Operand::Path(path) => paths::select(input, context, path)?,
                };
                Ok(order(*family, &left, &right)
                    .map(|ordering| relation.holds(ordering))
                    .unwrap_or(false))
            }
        }
    }
}

/// Branches to the first rule that matches the input.
pub struct ChoiceState {
    name: String,
    definition: StateDefinition,
    rules: Vec<(Rule, String)>,
    scope: StateScope,
}

impl ChoiceState {
    pub fn new(name: &str, definition: StateDefinition, scope: StateScope) -> Result<Self, AppError> {
        let rules = definition
            .choices
            .iter()
            .map(|choice| {
                let next = choice
                    .next
                    .clone()
                    .ok_or_else(|| invalid_rule(name, "top-level rule is missing Next".to_string()))?;
                Ok((parse_rule(name, choice)?, next))
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        Ok(ChoiceState {
            name: name.to_string(),
            definition,
            rules,
            scope,
        })
    }
}

#[async_trait]
impl State for ChoiceState {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_type(&self) -> StateType {
        StateType::Choice
    }

    async fn execute(&self, input: Value) -> Result<StateOutcome, AppError> {
        let execution = &self.scope.execution;
        execution.record(HistoryEventType::ChoiceStateEntered, Some(&self.name));

        let effective_input =
            paths::apply_input_path(&input, self.definition.input_path.as_deref())?;
        let context = self.scope.context_object(&self.name, Utc::now(), 0);

        let mut next = None;
        for (rule, target) in &self.rules {
            if rule.evaluate(&effective_input, &context)? {
                next = Some(target.clone());
                break;
            }
        }
        let next = next.or_else(|| self.definition.default.clone()).ok_or_else(|| {
            AppError::named(
                ErrorCategory::StateFailure,
                names::NO_CHOICE_MATCHED,
                format!("No Choice rule matched and no Default in state {}", self.name),
            )
            .with_code("SFN-CHOICE-002")
        })?;
        tracing::debug!(state = %self.name, next = %next, "choice resolved");

        let output =
            paths::apply_output_path(&effective_input, self.definition.output_path.as_deref())?;
        execution.record(HistoryEventType::ChoiceStateExited, Some(&self.name));
        Ok(StateOutcome {
            output,
            next: Transition::Next(next),
        })
    }
}
