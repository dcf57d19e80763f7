//! Equality-based label selectors.
//!
//! Grammar: `key=value[,key=value...]`. Whitespace around keys and values is
//! ignored. The empty expression selects everything.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;
use crate::types::{Labels, ResourceId};

/// A conjunction of `key=value` label requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Selector that matches every label set.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(expr: &str) -> Result<Self, StoreError> {
        let invalid = |reason: String| StoreError::InvalidSelector {
            selector: expr.to_string(),
            reason,
        };

        let mut requirements = BTreeMap::new();
        if expr.trim().is_empty() {
            return Ok(Self { requirements });
        }

        for term in expr.split(',') {
            let parts: Vec<&str> = term.split('=').collect();
            if parts.len() != 2 {
                return Err(invalid(format!("'{}' is not of the form key=value", term.trim())));
            }
            let key = parts[0].trim();
            let value = parts[1].trim();
            if key.is_empty() {
                return Err(invalid(format!("'{}' has an empty key", term.trim())));
            }
            if key.chars().any(char::is_whitespace) || value.chars().any(char::is_whitespace) {
                return Err(invalid(format!("'{}' contains whitespace", term.trim())));
            }
            match requirements.entry(key.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(value.to_string());
                }
                Entry::Occupied(existing) if existing.get() == value => {}
                Entry::Occupied(existing) => {
                    return Err(invalid(format!(
                        "conflicting values '{}' and '{value}' for key '{key}'",
                        existing.get()
                    )));
                }
            }
        }
        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// True when every requirement is present in `labels` with the same value.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

impl FromStr for LabelSelector {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.requirements {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// What a store listing is filtered by: an optional namespace and labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    /// `None` selects resources in every namespace.
    pub namespace: Option<String>,
    pub labels: LabelSelector,
}

impl Selector {
    pub fn new(namespace: Option<String>, labels: LabelSelector) -> Self {
        Self { namespace, labels }
    }

    pub fn matches(&self, id: &ResourceId, labels: &Labels) -> bool {
        let namespace_ok = self
            .namespace
            .as_deref()
            .map_or(true, |ns| ns == id.namespace);
        namespace_ok && self.labels.matches(labels)
    }
}
