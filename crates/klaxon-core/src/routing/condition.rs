use std::borrow::Cow;
use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Regex,
    Gte,
    Lte,
    StartsWith,
    EndsWith,
}

impl Operator {
    fn is_negative(&self) -> bool {
        matches!(self, Self::NotEquals | Self::NotContains)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    field: String,
    operator: Operator,
    value: String,
    #[serde(skip)]
    compiled: CompiledPattern,
}

/// Regex for a `Regex` condition, compiled on first use and kept with the
/// condition. A bad pattern is remembered as its error message.
#[derive(Debug, Clone, Default)]
struct CompiledPattern(OnceLock<Result<Regex, String>>);

impl PartialEq for CompiledPattern {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Eq for CompiledPattern {}

/// The value a condition reads off an alert.
enum FieldValue<'a> {
    Text(Cow<'a, str>),
    Tags(&'a [String]),
    Missing,
}

impl FieldValue<'_> {
    fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_ref()),
            Self::Tags(tags) => Cow::Owned(tags.join(",")),
            Self::Missing => Cow::Borrowed(""),
        }
    }
}

fn field_value<'a>(alert: &'a Alert, field: &str) -> FieldValue<'a> {
    match field {
        "source" => FieldValue::Text(Cow::Borrowed(alert.source().as_str())),
        "title" => FieldValue::Text(Cow::Borrowed(alert.title())),
        "message" => FieldValue::Text(Cow::Borrowed(alert.message())),
        "priority" => FieldValue::Text(Cow::Borrowed(alert.priority().as_str())),
        "tags" => FieldValue::Tags(alert.tags()),
        other => {
            let key = other.strip_prefix("custom.").unwrap_or(other);
            alert
                .custom_fields()
                .get(key)
                .map(|v| FieldValue::Text(Cow::Borrowed(v.as_str())))
                .unwrap_or(FieldValue::Missing)
        }
    }
}

/// Numeric when both sides parse as numbers, lexicographic otherwise.
fn compare(actual: &str, expected: &str) -> Ordering {
    match (actual.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => actual.cmp(expected),
    }
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            compiled: CompiledPattern::default(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.operator == Operator::Regex {
            self.pattern()?;
        }
        Ok(())
    }

    fn pattern(&self) -> Result<&Regex, DomainError> {
        self.compiled
            .0
            .get_or_init(|| Regex::new(&self.value).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|reason| DomainError::InvalidPattern {
                pattern: self.value.clone(),
                reason: reason.clone(),
            })
    }

    /// Fails only when a regex condition carries an invalid pattern.
    pub fn evaluate(&self, alert: &Alert) -> Result<bool, DomainError> {
        let pattern = match self.operator {
            Operator::Regex => Some(self.pattern()?),
            _ => None,
        };
        let actual = field_value(alert, &self.field);
        if matches!(actual, FieldValue::Missing) {
            return Ok(self.operator.is_negative());
        }

        let expected = self.value.as_str();
        let text = actual.as_text();
        let result = match self.operator {
            Operator::Equals => text == expected,
            Operator::NotEquals => text != expected,
            Operator::Contains | Operator::NotContains => {
                let found = match &actual {
                    FieldValue::Tags(tags) => tags.iter().any(|t| t == expected),
                    _ => text.contains(expected),
                };
                found != (self.operator == Operator::NotContains)
            }
            Operator::Regex => pattern.is_some_and(|re| re.is_match(&text)),
            Operator::Gte => compare(&text, expected) != Ordering::Less,
            Operator::Lte => compare(&text, expected) != Ordering::Greater,
            Operator::StartsWith => text.starts_with(expected),
            Operator::EndsWith => text.ends_with(expected),
        };
        Ok(result)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionBlock {
    #[serde(rename = "match")]
    pub match_mode: MatchMode,
    pub conditions: Vec<Condition>,
}

impl ConditionBlock {
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self {
            match_mode: MatchMode::All,
            conditions,
        }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self {
            match_mode: MatchMode::Any,
            conditions,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.conditions.iter().try_for_each(Condition::validate)
    }

    /// An empty block never matches. Every condition is checked so that an
    /// invalid pattern surfaces regardless of its position.
    pub fn evaluate(&self, alert: &Alert) -> Result<bool, DomainError> {
        if self.conditions.is_empty() {
            return Ok(false);
        }
        let results = self
            .conditions
            .iter()
            .map(|c| c.evaluate(alert))
            .collect::<Result<Vec<bool>, DomainError>>()?;
        Ok(match self.match_mode {
            MatchMode::All => results.iter().all(|r| *r),
            MatchMode::Any => results.iter().any(|r| *r),
        })
    }
}
