//! Recorded editing operations.
//!
//! A [`FilterAction`] captures one committed edit: which operation, in which
//! version, whether replaying it reproduces the result, and its parameters in
//! insertion order.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How far an action can be replayed to regenerate its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterCategory {
    /// Replaying identifier, version and parameters reproduces the pixels.
    #[default]
    Reproducible,
    /// Replayable in principle, but depends on more than the stored
    /// parameters (e.g. user-painted masks stored elsewhere).
    Complex,
    /// Only documents that an edit happened. The result cannot be regenerated
    /// from history, so the image data itself must be kept.
    Documented,
}

/// Bit set of action flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionFlags(u32);

impl ActionFlags {
    /// The action starts a new branch rather than continuing the line it was
    /// applied to.
    pub const EXPLICIT_BRANCH: ActionFlags = ActionFlags(1 << 0);

    pub fn empty() -> Self {
        ActionFlags(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: ActionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ActionFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ActionFlags) {
        self.0 &= !other.0;
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a double, widening integers.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            ParamValue::Double(d) => Some(*d),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// False only for doubles that are NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            ParamValue::Double(d) => d.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Double(d) => write!(f, "{d}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Double(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// One committed editing operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterAction {
    /// Namespaced operation name, e.g. `digikam:BCGFilter`.
    pub identifier: String,
    pub version: i32,
    #[serde(default)]
    pub category: FilterCategory,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "ActionFlags::is_empty")]
    pub flags: ActionFlags,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, ParamValue>,
}

impl FilterAction {
    pub fn new(identifier: impl Into<String>, version: i32, category: FilterCategory) -> Self {
        FilterAction {
            identifier: identifier.into(),
            version,
            category,
            ..Default::default()
        }
    }

    /// A null action has no identifier and is never recorded.
    pub fn is_null(&self) -> bool {
        self.identifier.is_empty()
    }

    pub fn category(&self) -> FilterCategory {
        self.category
    }

    pub fn is_reproducible(&self) -> bool {
        self.category == FilterCategory::Reproducible
    }

    /// True if the result of this action cannot be regenerated by replaying
    /// the history.
    pub fn breaks_reproducibility(&self) -> bool {
        self.category == FilterCategory::Documented
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Builder form of [`add_parameter`](Self::add_parameter).
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.add_parameter(name, value);
        self
    }

    // -----------------------------------------------------------------------
    // Parameters
    // -----------------------------------------------------------------------

    pub fn parameters(&self) -> &IndexMap<String, ParamValue> {
        &self.params
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Appends a parameter. An existing parameter of the same name is
    /// removed first, so the new value lands at the end.
    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        self.params.shift_remove(&name);
        self.params.insert(name, value.into());
    }

    /// Sets a parameter, keeping the position of an existing one.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(name.into(), value.into());
    }

    pub fn remove_parameter(&mut self, name: &str) -> Option<ParamValue> {
        self.params.shift_remove(name)
    }

    pub fn clear_parameters(&mut self) {
        self.params.clear();
    }

    // -----------------------------------------------------------------------
    // Flags
    // -----------------------------------------------------------------------

    pub fn flags(&self) -> ActionFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: ActionFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn add_flag(&mut self, flag: ActionFlags) {
        self.flags.insert(flag);
    }

    pub fn remove_flag(&mut self, flag: ActionFlags) {
        self.flags.remove(flag);
    }
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "{} v{}", self.identifier, self.version)
        } else {
            write!(f, "{} ({} v{})", self.display_name, self.identifier, self.version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_keep_insertion_order() {
        let action = FilterAction::new("digikam:BCGFilter", 1, FilterCategory::Reproducible)
            .with_parameter("gamma", 1.2)
            .with_parameter("brightness", 10)
            .with_parameter("contrast", 0.5);
        let names: Vec<&str> = action.parameters().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["gamma", "brightness", "contrast"]);
    }

    #[test]
    fn set_parameter_keeps_position_add_moves_to_end() {
        let mut action = FilterAction::new("f", 1, FilterCategory::Reproducible)
            .with_parameter("a", 1)
            .with_parameter("b", 2);

        action.set_parameter("a", 5);
        let names: Vec<&str> = action.parameters().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(action.parameter("a").and_then(ParamValue::as_int), Some(5));

        action.add_parameter("a", 6);
        let names: Vec<&str> = action.parameters().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn remove_and_clear_parameters() {
        let mut action = FilterAction::new("f", 1, FilterCategory::Complex)
            .with_parameter("a", true)
            .with_parameter("b", "text");
        assert_eq!(action.remove_parameter("a"), Some(ParamValue::Bool(true)));
        assert!(!action.has_parameter("a"));
        action.clear_parameters();
        assert!(action.parameters().is_empty());
    }

    #[test]
    fn category_reproducibility() {
        let reproducible = FilterAction::new("a", 1, FilterCategory::Reproducible);
        let complex = FilterAction::new("b", 1, FilterCategory::Complex);
        let documented = FilterAction::new("c", 1, FilterCategory::Documented);

        assert!(reproducible.is_reproducible());
        assert!(!reproducible.breaks_reproducibility());
        assert!(!complex.is_reproducible());
        assert!(!complex.breaks_reproducibility());
        assert!(documented.breaks_reproducibility());
    }

    #[test]
    fn null_action() {
        assert!(FilterAction::default().is_null());
        assert!(!FilterAction::new("x", 0, FilterCategory::Reproducible).is_null());
    }

    #[test]
    fn branch_flag() {
        let mut action = FilterAction::new("f", 1, FilterCategory::Reproducible);
        assert!(!action.has_flag(ActionFlags::EXPLICIT_BRANCH));
        action.add_flag(ActionFlags::EXPLICIT_BRANCH);
        assert!(action.has_flag(ActionFlags::EXPLICIT_BRANCH));
        assert_eq!(action.flags().bits(), 1);
        action.remove_flag(ActionFlags::EXPLICIT_BRANCH);
        assert!(action.flags().is_empty());
        assert_eq!(action.flags().bits(), 0);
    }

    #[test]
    fn param_value_accessors() {
        assert_eq!(ParamValue::from(3).as_double(), Some(3.0));
        assert_eq!(ParamValue::from("x").as_str(), Some("x"));
        assert_eq!(ParamValue::from(true).as_int(), None);
        assert_eq!(ParamValue::from(true).as_bool(), Some(true));
        assert_eq!(ParamValue::from(1).as_bool(), None);
        assert!(!ParamValue::Double(f64::NAN).is_finite());
    }

    #[test]
    fn compact_json_form() {
        let action = FilterAction::new("digikam:AutoLevels", 1, FilterCategory::Reproducible)
            .with_parameter("strength", 3);
        let json = serde_json::to_string(&action).unwrap();
        insta::assert_snapshot!(json, @r#"{"identifier":"digikam:AutoLevels","version":1,"category":"Reproducible","params":{"strength":{"type":"int","value":3}}}"#);
    }
}
