//! Attribute-based access control
//!
//! Policies are kept sorted by descending priority. The first policy whose
//! action, subject attributes, resource attributes and conditions all match
//! decides; when none matches the request is denied.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::RwLock;

use crate::constants::WILDCARD;
use crate::error::{AuthzError, Result};
use crate::value::{AttrValue, Attributes};

/// Outcome a matching policy produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// A required attribute; key or value `*` matches anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    fn matches(&self, attrs: &Attributes) -> bool {
        if self.key == WILDCARD {
            return true;
        }

        match attrs.get(&self.key) {
            Some(actual) => self.value.as_str() == Some(WILDCARD) || *actual == self.value,
            None => false,
        }
    }
}

/// Comparison applied by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
    Contains,
}

/// Predicate over the combined `subject.*` / `resource.*` attribute map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path such as `subject.age` or `resource.owner`
    pub attribute: String,
    pub operator: Operator,
    pub value: AttrValue,
}

impl Condition {
    pub fn new(
        attribute: impl Into<String>,
        operator: Operator,
        value: impl Into<AttrValue>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: value.into(),
        }
    }

    /// A condition on a missing attribute never holds
    pub fn evaluate(&self, combined: &Attributes) -> bool {
        let Some(actual) = combined.get(&self.attribute) else {
            return false;
        };

        match self.operator {
            Operator::Eq => *actual == self.value,
            Operator::Ne => *actual != self.value,
            Operator::Gt => actual.compare(&self.value) == Ordering::Greater,
            Operator::Lt => actual.compare(&self.value) == Ordering::Less,
            Operator::Ge => actual.compare(&self.value) != Ordering::Less,
            Operator::Le => actual.compare(&self.value) != Ordering::Greater,
            Operator::In => match &self.value {
                AttrValue::List(items) => items.contains(actual),
                _ => false,
            },
            Operator::Contains => match (actual, &self.value) {
                (AttrValue::String(haystack), AttrValue::String(needle)) => {
                    haystack.contains(needle.as_str())
                }
                _ => false,
            },
        }
    }
}

/// An attribute policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<Attribute>,
    #[serde(default)]
    pub resources: Vec<Attribute>,
    pub actions: HashSet<String>,
    pub effect: Effect,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub priority: i32,
}

impl Policy {
    /// A policy with no attribute requirements, conditions or priority
    pub fn new(id: impl Into<String>, name: impl Into<String>, effect: Effect) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            subjects: Vec::new(),
            resources: Vec::new(),
            actions: HashSet::new(),
            effect,
            conditions: Vec::new(),
            priority: 0,
        }
    }

    pub fn with_subject(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.subjects.push(Attribute::new(key, value));
        self
    }

    pub fn with_resource(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.resources.push(Attribute::new(key, value));
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.insert(action.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn matches_action(&self, action: &str) -> bool {
        self.actions.contains(action) || self.actions.contains(WILDCARD)
    }

    fn matches(
        &self,
        subject: &Attributes,
        resource: &Attributes,
        action: &str,
        combined: &Attributes,
    ) -> bool {
        self.matches_action(action)
            && self.subjects.iter().all(|a| a.matches(subject))
            && self.resources.iter().all(|a| a.matches(resource))
            && self.conditions.iter().all(|c| c.evaluate(combined))
    }
}

/// Priority-ordered policy list and the decision procedure over it
#[derive(Default)]
pub struct PolicyEngine {
    policies: RwLock<Vec<Policy>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts before the first policy with strictly lower priority
    pub fn add_policy(&self, policy: Policy) -> Result<()> {
        let mut policies = self.policies.write()?;
        let index = policies
            .iter()
            .position(|p| p.priority < policy.priority)
            .unwrap_or(policies.len());

        log::debug!(
            "Policy {} added at position {} (priority {})",
            policy.id,
            index,
            policy.priority
        );
        policies.insert(index, policy);
        Ok(())
    }

    /// Removes every policy with the given id, returning whether any existed
    pub fn remove_policy(&self, id: &str) -> Result<bool> {
        let mut policies = self.policies.write()?;
        let before = policies.len();
        policies.retain(|p| p.id != id);
        Ok(policies.len() != before)
    }

    pub fn get_policy(&self, id: &str) -> Result<Option<Policy>> {
        Ok(self.policies.read()?.iter().find(|p| p.id == id).cloned())
    }

    /// Policies in evaluation order
    pub fn list_policies(&self) -> Result<Vec<Policy>> {
        Ok(self.policies.read()?.clone())
    }

    pub fn policy_count(&self) -> Result<usize> {
        Ok(self.policies.read()?.len())
    }

    pub fn clear_policies(&self) -> Result<()> {
        self.policies.write()?.clear();
        Ok(())
    }

    /// Returns the decision and the policy that made it, if any
    pub fn check_access(
        &self,
        subject: &Attributes,
        resource: &Attributes,
        action: &str,
    ) -> Result<(bool, Option<Policy>)> {
        let combined = combine_attributes(subject, resource);
        let policies = self.policies.read()?;

        let decision = policies
            .iter()
            .find(|p| p.matches(subject, resource, action, &combined))
            .map(|p| (p.effect == Effect::Allow, Some(p.clone())))
            .unwrap_or((false, None));

        Ok(decision)
    }

    /// Like [`check_access`](Self::check_access) but reports denial as an error
    pub fn check_access_with_error(
        &self,
        subject: &Attributes,
        resource: &Attributes,
        action: &str,
    ) -> Result<()> {
        match self.check_access(subject, resource, action)? {
            (true, _) => Ok(()),
            (false, Some(policy)) => {
                log::debug!("ABAC denied action {} by policy {}", action, policy.id);
                Err(AuthzError::AccessDenied(Some(format!(
                    "{} ({})",
                    policy.id, policy.name
                ))))
            }
            (false, None) => {
                log::debug!("ABAC denied action {}: no matching policy", action);
                Err(AuthzError::AccessDenied(None))
            }
        }
    }
}

/// Prefixes subject keys with `subject.` and resource keys with `resource.`
pub fn combine_attributes(subject: &Attributes, resource: &Attributes) -> Attributes {
    subject
        .iter()
        .map(|(k, v)| (format!("subject.{}", k), v.clone()))
        .chain(
            resource
                .iter()
                .map(|(k, v)| (format!("resource.{}", k), v.clone())),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn attrs(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_combine_attributes_prefixes() {
        let combined = combine_attributes(
            &attrs(&[("age", 30.into())]),
            &attrs(&[("owner", "bob".into())]),
        );
        assert_eq!(combined.get("subject.age"), Some(&AttrValue::Int(30)));
        assert_eq!(combined.get("resource.owner"), Some(&AttrValue::from("bob")));
        assert_eq!(combined.len(), 2);
    }

    #[test]
    fn test_attribute_wildcards() {
        let subject = attrs(&[("role", "admin".into())]);

        assert!(Attribute::new("*", "anything").matches(&subject));
        assert!(Attribute::new("role", "*").matches(&subject));
        assert!(Attribute::new("role", "admin").matches(&subject));
        assert!(!Attribute::new("role", "user").matches(&subject));
        // A wildcard value still needs the key to be present
        assert!(!Attribute::new("dept", "*").matches(&subject));
    }

    #[test]
    fn test_numeric_operators() {
        let combined = attrs(&[("subject.age", 30.into())]);

        assert!(Condition::new("subject.age", Operator::Gt, 18).evaluate(&combined));
        assert!(!Condition::new("subject.age", Operator::Lt, 18).evaluate(&combined));
        assert!(Condition::new("subject.age", Operator::Ge, 30).evaluate(&combined));
        assert!(Condition::new("subject.age", Operator::Le, 30).evaluate(&combined));
        assert!(Condition::new("subject.age", Operator::Eq, 30).evaluate(&combined));
        assert!(Condition::new("subject.age", Operator::Ne, 31).evaluate(&combined));
    }

    #[test]
    fn test_cross_type_comparison_is_equal() {
        let combined = attrs(&[("subject.age", 30.into())]);

        // Int against Float compares as equal
        assert!(!Condition::new("subject.age", Operator::Gt, 99.5).evaluate(&combined));
        assert!(!Condition::new("subject.age", Operator::Lt, 1.5).evaluate(&combined));
        assert!(Condition::new("subject.age", Operator::Ge, 99.5).evaluate(&combined));
        assert!(Condition::new("subject.age", Operator::Le, 1.5).evaluate(&combined));
        // Equality stays strict
        assert!(!Condition::new("subject.age", Operator::Eq, 30.0).evaluate(&combined));
    }

    #[test]
    fn test_string_and_timestamp_ordering() {
        let now = Utc::now();
        let combined = attrs(&[
            ("subject.name", "mallory".into()),
            ("resource.created", now.into()),
        ]);

        assert!(Condition::new("subject.name", Operator::Gt, "alice").evaluate(&combined));
        assert!(Condition::new(
            "resource.created",
            Operator::Lt,
            now + Duration::minutes(5)
        )
        .evaluate(&combined));
    }

    #[test]
    fn test_in_and_contains() {
        let combined = attrs(&[
            ("subject.dept", "sales".into()),
            ("resource.path", "/docs/internal/plan".into()),
            ("subject.level", 3.into()),
        ]);

        let dept_in = Condition::new("subject.dept", Operator::In, vec!["eng", "sales"]);
        assert!(dept_in.evaluate(&combined));
        assert!(!Condition::new("subject.dept", Operator::In, vec!["eng"]).evaluate(&combined));
        assert!(!Condition::new("subject.dept", Operator::In, "sales").evaluate(&combined));

        let path_has = |needle: &str| {
            Condition::new("resource.path", Operator::Contains, needle).evaluate(&combined)
        };
        assert!(path_has("/docs"));
        assert!(path_has("internal"));
        assert!(path_has("plan"));
        assert!(!Condition::new("subject.level", Operator::Contains, "3").evaluate(&combined));
    }

    #[test]
    fn test_missing_attribute_fails_every_operator() {
        let combined = Attributes::new();
        for op in [
            Operator::Eq,
            Operator::Ne,
            Operator::Gt,
            Operator::Lt,
            Operator::Ge,
            Operator::Le,
            Operator::In,
            Operator::Contains,
        ] {
            assert!(!Condition::new("subject.ghost", op, 1).evaluate(&combined));
        }
    }

    #[test]
    fn test_insertion_keeps_equal_priorities_in_order() {
        let engine = PolicyEngine::new();
        engine.add_policy(Policy::new("a", "a", Effect::Allow).with_priority(10)).unwrap();
        engine.add_policy(Policy::new("b", "b", Effect::Allow).with_priority(50)).unwrap();
        engine.add_policy(Policy::new("c", "c", Effect::Allow).with_priority(10)).unwrap();
        engine.add_policy(Policy::new("d", "d", Effect::Allow).with_priority(50)).unwrap();
        engine.add_policy(Policy::new("e", "e", Effect::Allow).with_priority(-1)).unwrap();

        let ids: Vec<String> = engine
            .list_policies()
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["b", "d", "a", "c", "e"]);
    }

    #[test]
    fn test_policy_round_trips_through_json() {
        let policy = Policy::new("p1", "admins read", Effect::Allow)
            .with_subject("role", "admin")
            .with_action("read")
            .with_condition(Condition::new("subject.age", Operator::Ge, 18))
            .with_priority(5);

        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains("\"allow\""));
        assert!(json.contains("\"ge\""));
        let back: Policy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }
}
