//! Condition Tree and its compilation into engine-native predicates.
//!
//! A [`Condition`] is one AND-group plus any number of OR'd AND-groups.
//! [`compile`] lowers it into the engine-neutral [`JsonPredicate`] IR; the
//! in-memory engine evaluates that directly and [`sql`] renders it as
//! MySQL JSON-path SQL.

mod predicate;
pub mod sql;

pub use predicate::{compile, JsonPath, JsonPredicate};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute equality tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    and: BTreeMap<String, Value>,
    #[serde(default)]
    or: Vec<BTreeMap<String, Value>>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `field == value`. A later call for the same field replaces
    /// the earlier value.
    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and.insert(field.into(), value.into());
        self
    }

    /// Adds one OR'd group of `field == value` pairs.
    pub fn or<I, K, V>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.or.push(
            group
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        );
        self
    }

    pub fn and_group(&self) -> &BTreeMap<String, Value> {
        &self.and
    }

    pub fn or_groups(&self) -> &[BTreeMap<String, Value>] {
        &self.or
    }

    /// True when no pair constrains anything.
    pub fn is_unconstrained(&self) -> bool {
        self.and.is_empty() && self.or.iter().all(BTreeMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_groups() {
        let condition = Condition::new()
            .and("status", "active")
            .or([("tier", "gold")])
            .or([("tier", "platinum")]);

        assert_eq!(condition.and_group().get("status"), Some(&json!("active")));
        assert_eq!(condition.or_groups().len(), 2);
        assert!(!condition.is_unconstrained());
    }

    #[test]
    fn test_empty_groups_are_unconstrained() {
        let condition = Condition::new().or(Vec::<(String, Value)>::new());
        assert!(condition.is_unconstrained());
    }

    #[test]
    fn test_condition_from_json() {
        let condition: Condition =
            serde_json::from_str(r#"{"and": {"age": 3}, "or": [{"a": true}]}"#).unwrap();
        assert_eq!(condition, Condition::new().and("age", 3).or([("a", true)]));
    }
}
