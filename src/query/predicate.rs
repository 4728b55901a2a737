use super::Condition;
use crate::core::value::json_type_name;
use crate::core::{ModelError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

lazy_static! {
    static ref IDENTIFIER_SEGMENT: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("segment pattern is valid");
}

/// `$.a.b` style path into an attribute document.
///
/// Segments are separated by `.`. A segment that is not a plain
/// identifier, such as `file-name`, is rendered quoted (`$."file-name"`)
/// and may also be written quoted when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPath {
    segments: Vec<String>,
}

impl JsonPath {
    /// Parses a dotted attribute name; a leading `$.` is accepted.
    pub fn parse(field: &str) -> Result<Self> {
        let trimmed = field.strip_prefix("$.").unwrap_or(field);
        let segments: Vec<String> = trimmed
            .split('.')
            .map(|segment| {
                segment
                    .strip_prefix('"')
                    .and_then(|inner| inner.strip_suffix('"'))
                    .unwrap_or(segment)
                    .to_string()
            })
            .collect();

        if !segments.iter().all(|segment| Self::accepts_segment(segment)) {
            return Err(ModelError::InvalidCondition(format!(
                "'{}' is not a valid attribute path",
                field
            )));
        }
        Ok(Self { segments })
    }

    /// True when `name` can be one path segment: non-blank, with no `.`,
    /// quote, backslash or control character.
    pub fn accepts_segment(name: &str) -> bool {
        !name.trim().is_empty()
            && !name
                .chars()
                .any(|c| matches!(c, '.' | '"' | '\\') || c.is_control())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Follows the path; `None` when any segment is missing.
    pub fn extract<'v>(&self, document: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(document, |node, segment| node.get(segment))
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            if IDENTIFIER_SEGMENT.is_match(segment) {
                write!(f, ".{}", segment)?;
            } else {
                write!(f, ".\"{}\"", segment)?;
            }
        }
        Ok(())
    }
}

/// Engine-neutral predicate over one attribute document.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonPredicate {
    /// Extracted value, unquoted, equals the text.
    UnquotedEquals { path: JsonPath, value: String },
    /// Extracted raw JSON value equals the number.
    NumberEquals { path: JsonPath, value: Number },
    /// Extracted raw JSON text equals the literal (`true`/`false`).
    LiteralEquals { path: JsonPath, literal: String },
    /// Path is missing or JSON null.
    IsNull { path: JsonPath },
    And(Vec<JsonPredicate>),
    Or(Vec<JsonPredicate>),
}

impl JsonPredicate {
    fn leaf(field: &str, value: &Value) -> Result<Self> {
        let path = JsonPath::parse(field)?;
        match value {
            Value::String(text) => Ok(Self::UnquotedEquals {
                path,
                value: text.clone(),
            }),
            Value::Number(number) => Ok(Self::NumberEquals {
                path,
                value: number.clone(),
            }),
            Value::Bool(flag) => Ok(Self::LiteralEquals {
                path,
                literal: flag.to_string(),
            }),
            Value::Null => Ok(Self::IsNull { path }),
            other => Err(ModelError::InvalidCondition(format!(
                "unsupported {} value for '{}'",
                json_type_name(other),
                field
            ))),
        }
    }

    fn group(pairs: &BTreeMap<String, Value>) -> Result<Vec<Self>> {
        pairs
            .iter()
            .map(|(field, value)| Self::leaf(field, value))
            .collect()
    }

    /// Evaluates the predicate against one attribute document.
    ///
    /// Text equality only holds for JSON strings and numeric equality only
    /// for JSON numbers: an attribute stored as `5` never equals `"5"`.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::UnquotedEquals { path, value } => {
                matches!(path.extract(document), Some(Value::String(found)) if found == value)
            }
            Self::NumberEquals { path, value } => match path.extract(document) {
                Some(Value::Number(found)) => numbers_equal(found, value),
                _ => false,
            },
            Self::LiteralEquals { path, literal } => path
                .extract(document)
                .is_some_and(|found| found.to_string() == *literal),
            Self::IsNull { path } => matches!(path.extract(document), None | Some(Value::Null)),
            Self::And(parts) => parts.iter().all(|part| part.matches(document)),
            Self::Or(parts) => parts.iter().any(|part| part.matches(document)),
        }
    }
}

fn numbers_equal(left: &Number, right: &Number) -> bool {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (left.as_u64(), right.as_u64()) {
        return a == b;
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Lowers a condition into a single predicate.
///
/// Empty OR-groups are dropped. Returns `None` when nothing constrains
/// the documents, meaning every row of the model matches.
pub fn compile(condition: &Condition) -> Result<Option<JsonPredicate>> {
    let mut clauses = JsonPredicate::group(condition.and_group())?;

    let mut alternatives = Vec::new();
    for group in condition.or_groups() {
        let mut parts = JsonPredicate::group(group)?;
        match parts.len() {
            0 => continue,
            1 => alternatives.extend(parts.pop()),
            _ => alternatives.push(JsonPredicate::And(parts)),
        }
    }
    match alternatives.len() {
        0 => {}
        1 => clauses.extend(alternatives.pop()),
        _ => clauses.push(JsonPredicate::Or(alternatives)),
    }

    Ok(match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(JsonPredicate::And(clauses)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_parsing() {
        assert_eq!(JsonPath::parse("tier").unwrap().to_string(), "$.tier");
        assert_eq!(JsonPath::parse("$.a.b").unwrap().segments().len(), 2);
        assert!(JsonPath::parse("").is_err());
        assert!(JsonPath::parse("a..b").is_err());
        assert!(JsonPath::parse("$.").is_err());
        assert!(JsonPath::parse(r#"say"hi""#).is_err());
        assert!(JsonPath::parse("back\\slash").is_err());
    }

    #[test]
    fn test_non_identifier_segments_are_quoted() {
        let path = JsonPath::parse("file-name").unwrap();
        assert_eq!(path.to_string(), r#"$."file-name""#);
        assert_eq!(JsonPath::parse(r#"$."file-name""#).unwrap(), path);

        assert_eq!(JsonPath::parse("meta.2fa").unwrap().to_string(), r#"$.meta."2fa""#);
        assert_eq!(JsonPath::parse("first name").unwrap().to_string(), r#"$."first name""#);

        let doc = json!({"file-name": "a.txt"});
        let predicate = compile(&Condition::new().and("file-name", "a.txt"))
            .unwrap()
            .unwrap();
        assert!(predicate.matches(&doc));
    }

    #[test]
    fn test_type_sensitive_equality() {
        let doc = json!({"n": 5, "s": "5"});
        let number = compile(&Condition::new().and("n", 5)).unwrap().unwrap();
        let text = compile(&Condition::new().and("n", "5")).unwrap().unwrap();

        assert!(number.matches(&doc));
        assert!(!text.matches(&doc));
        assert!(compile(&Condition::new().and("s", "5")).unwrap().unwrap().matches(&doc));
        assert!(!compile(&Condition::new().and("s", 5)).unwrap().unwrap().matches(&doc));
    }

    #[test]
    fn test_integer_matches_float_representation() {
        let doc = json!({"n": 5.0});
        let number = compile(&Condition::new().and("n", 5)).unwrap().unwrap();
        assert!(number.matches(&doc));
    }

    #[test]
    fn test_null_matches_missing_and_null() {
        let predicate = compile(&Condition::new().and("gone", Value::Null))
            .unwrap()
            .unwrap();
        assert!(predicate.matches(&json!({"gone": null})));
        assert!(predicate.matches(&json!({"other": 1})));
        assert!(!predicate.matches(&json!({"gone": 0})));
    }

    #[test]
    fn test_boolean_literal() {
        let predicate = compile(&Condition::new().and("on", true)).unwrap().unwrap();
        assert!(predicate.matches(&json!({"on": true})));
        assert!(!predicate.matches(&json!({"on": "true"})));
    }

    #[test]
    fn test_empty_condition_compiles_to_none() {
        assert_eq!(compile(&Condition::new()).unwrap(), None);
        let only_empty = Condition::new().or(Vec::<(String, Value)>::new());
        assert_eq!(compile(&only_empty).unwrap(), None);
    }

    #[test]
    fn test_nested_values_are_rejected() {
        let err = compile(&Condition::new().and("tags", json!(["a"]))).unwrap_err();
        assert!(matches!(err, ModelError::InvalidCondition(_)));
    }

    #[test]
    fn test_and_with_or_groups() {
        let predicate = compile(
            &Condition::new()
                .and("status", "active")
                .or([("tier", "gold")])
                .or([("tier", "platinum")]),
        )
        .unwrap()
        .unwrap();

        assert!(predicate.matches(&json!({"status": "active", "tier": "gold"})));
        assert!(!predicate.matches(&json!({"status": "inactive", "tier": "gold"})));
        assert!(!predicate.matches(&json!({"status": "active", "tier": "silver"})));
    }
}
