// ── Attribute-bag codec ──
//
// The only place that touches the host's loosely typed attributes. Rules
// are loaded into typed records once at the boundary and dumped once on the
// way out; the engine never sees raw values.

pub mod sensitive;

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use serde_json::Value;

use crate::error::CoreError;
use crate::model::{PolicyRule, Targets, normalize_set, or_any};

/// Attribute bag as exchanged with the host.
pub type Attributes = serde_json::Map<String, Value>;

/// Rule name → audit comment, for the rules that declared one.
pub type AuditComments = BTreeMap<String, String>;

pub const RULE_BLOCK: &str = "rule";
pub const AUDIT_COMMENT: &str = "audit_comment";

/// Read-only view over an attribute bag that reports errors by path.
#[derive(Debug, Clone, Copy)]
pub struct Bag<'a> {
    attrs: &'a Attributes,
    path: &'a str,
}

impl<'a> Bag<'a> {
    pub fn new(attrs: &'a Attributes) -> Self {
        Self { attrs, path: "" }
    }

    fn nested(attrs: &'a Attributes, path: &'a str) -> Self {
        Self { attrs, path }
    }

    pub fn path_of(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.attrs.get(key).filter(|v| !v.is_null())
    }

    fn type_error(&self, key: &str, expected: &str, got: &Value) -> CoreError {
        CoreError::validation(self.path_of(key), format!("expected {expected}, got {got}"))
    }

    /// A string attribute; absent, null and empty all read as `None`.
    pub fn string(&self, key: &str) -> Result<Option<String>, CoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.type_error(key, "a string", other)),
        }
    }

    pub fn string_or(&self, key: &str, default: &str) -> Result<String, CoreError> {
        Ok(self.string(key)?.unwrap_or_else(|| default.to_owned()))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, CoreError> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(self.type_error(key, "a boolean", other)),
        }
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>, CoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.type_error(key, "an integer", &Value::Number(n.clone()))),
            Some(other) => Err(self.type_error(key, "an integer", other)),
        }
    }

    /// Ordered list of strings.
    pub fn list(&self, key: &str) -> Result<Vec<String>, CoreError> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(self.type_error(key, "a list of strings", other)),
                })
                .collect(),
            Some(other) => Err(self.type_error(key, "a list of strings", other)),
        }
    }

    /// Unordered set of strings, normalized.
    pub fn set(&self, key: &str) -> Result<Vec<String>, CoreError> {
        Ok(normalize_set(self.list(key)?))
    }

    /// Set that the appliance requires; empty means `any`.
    pub fn set_or_any(&self, key: &str) -> Result<Vec<String>, CoreError> {
        Ok(or_any(self.list(key)?))
    }

    /// Keyword attribute parsed through `FromStr`, `default` when unset.
    pub fn enum_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, CoreError> {
        match self.string(key)? {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| {
                CoreError::validation(self.path_of(key), format!("unsupported value {value:?}"))
            }),
        }
    }

    /// Nested blocks, each paired with its path (`key[idx]`).
    pub fn blocks(&self, key: &str) -> Result<Vec<(String, &'a Attributes)>, CoreError> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    Value::Object(block) => Ok((format!("{}[{idx}]", self.path_of(key)), block)),
                    other => Err(self.type_error(key, "a list of blocks", other)),
                })
                .collect(),
            Some(other) => Err(self.type_error(key, "a list of blocks", other)),
        }
    }

    /// Collapse `{serial, vsys_list}` blocks into a map keyed by serial.
    pub fn targets(&self, key: &str) -> Result<Targets, CoreError> {
        let mut targets = Targets::new();
        for (path, block) in self.blocks(key)? {
            let block = Bag::nested(block, &path);
            let serial = block.string("serial")?.ok_or_else(|| {
                CoreError::validation(block.path_of("serial"), "attribute is required")
            })?;
            let vsys = block.set("vsys_list")?;
            if targets.insert(serial.clone(), vsys).is_some() {
                return Err(CoreError::validation(
                    path,
                    format!("serial {serial:?} is listed more than once"),
                ));
            }
        }
        Ok(targets)
    }
}

/// Builder for output bags. Absent optional values are written as their
/// documented default, never as null.
#[derive(Debug, Default)]
pub struct AttrWriter {
    attrs: Attributes,
}

impl AttrWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(&mut self, key: &str, value: &str) {
        self.attrs.insert(key.to_owned(), Value::String(value.to_owned()));
    }

    pub fn opt_string(&mut self, key: &str, value: Option<&str>) {
        self.string(key, value.unwrap_or_default());
    }

    pub fn bool(&mut self, key: &str, value: bool) {
        self.attrs.insert(key.to_owned(), Value::Bool(value));
    }

    pub fn int(&mut self, key: &str, value: Option<i64>) {
        self.attrs
            .insert(key.to_owned(), value.map_or(Value::from(0), Value::from));
    }

    pub fn set(&mut self, key: &str, values: &[String]) {
        self.attrs.insert(
            key.to_owned(),
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        );
    }

    pub fn targets(&mut self, key: &str, targets: &Targets) {
        let blocks = targets
            .iter()
            .map(|(serial, vsys)| {
                let mut block = AttrWriter::new();
                block.string("serial", serial);
                block.set("vsys_list", vsys);
                Value::Object(block.finish())
            })
            .collect();
        self.attrs.insert(key.to_owned(), Value::Array(blocks));
    }

    pub fn finish(self) -> Attributes {
        self.attrs
    }
}

/// Load the declared `rule` blocks of a resource bag.
///
/// Returns the typed rules in declared order plus the audit comments keyed
/// by rule name. At least one rule is required and names must be unique.
pub fn load_rules<R: PolicyRule>(attrs: &Attributes) -> Result<(Vec<R>, AuditComments), CoreError> {
    let bag = Bag::new(attrs);
    let blocks = bag.blocks(RULE_BLOCK)?;
    if blocks.is_empty() {
        return Err(CoreError::validation(RULE_BLOCK, "at least one rule is required"));
    }

    let mut rules = Vec::with_capacity(blocks.len());
    let mut comments = AuditComments::new();
    let mut seen = HashSet::new();

    for (path, block) in blocks {
        let rule_bag = Bag::nested(block, &path);
        let rule = R::from_bag(&rule_bag)?;
        if !seen.insert(rule.name().to_owned()) {
            return Err(CoreError::validation(
                rule_bag.path_of("name"),
                format!("duplicate rule name {:?}", rule.name()),
            ));
        }
        if let Some(comment) = rule_bag.string(AUDIT_COMMENT)? {
            comments.insert(rule.name().to_owned(), comment);
        }
        rules.push(rule);
    }
    Ok((rules, comments))
}

/// Dump typed rules as `rule` blocks. Audit comments are never emitted.
pub fn save_rules<R: PolicyRule>(rules: &[R]) -> Value {
    Value::Array(
        rules
            .iter()
            .map(|rule| Value::Object(rule.to_bag()))
            .collect(),
    )
}

/// Names of the rules, in order.
pub fn rule_names<R: PolicyRule>(rules: &[R]) -> Vec<String> {
    rules.iter().map(|r| r.name().to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::SecurityRule;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => Attributes::new(),
        }
    }

    #[test]
    fn audit_comments_are_split_out() {
        let input = attrs(json!({
            "rule": [
                { "name": "a", "audit_comment": "CHG-1" },
                { "name": "b" }
            ]
        }));
        let (rules, comments) = load_rules::<SecurityRule>(&input).expect("loads");
        assert_eq!(rule_names(&rules), vec!["a", "b"]);
        assert_eq!(comments.get("a").map(String::as_str), Some("CHG-1"));
        assert!(!comments.contains_key("b"));

        let Value::Array(out) = save_rules(&rules) else {
            panic!("expected a list");
        };
        assert!(out.iter().all(|r| r.get(AUDIT_COMMENT).is_none()));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let input = attrs(json!({ "rule": [{ "name": "a" }, { "name": "a" }] }));
        let err = load_rules::<SecurityRule>(&input).expect_err("duplicate");
        assert!(
            matches!(err, CoreError::Validation { ref attribute, .. } if attribute == "rule[1].name")
        );
    }

    #[test]
    fn empty_rule_list_is_rejected() {
        let err = load_rules::<SecurityRule>(&attrs(json!({ "rule": [] }))).expect_err("empty");
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn sets_are_order_insensitive() {
        let a = attrs(json!({ "rule": [{ "name": "r", "source_zones": ["untrust", "trust"] }] }));
        let b = attrs(json!({ "rule": [{ "name": "r", "source_zones": ["trust", "untrust", "trust"] }] }));
        let (ra, _) = load_rules::<SecurityRule>(&a).expect("loads");
        let (rb, _) = load_rules::<SecurityRule>(&b).expect("loads");
        assert_eq!(ra, rb);
    }

    #[test]
    fn target_blocks_collapse_by_serial() {
        let input = attrs(json!({ "target": [
            { "serial": "0002", "vsys_list": ["vsys2", "vsys1"] },
            { "serial": "0001" }
        ]}));
        let targets = Bag::new(&input).targets("target").expect("valid");
        assert_eq!(targets.get("0002"), Some(&vec!["vsys1".to_owned(), "vsys2".to_owned()]));
        assert_eq!(targets.get("0001"), Some(&Vec::new()));

        let mut out = AttrWriter::new();
        out.targets("target", &targets);
        assert_eq!(
            Value::Object(out.finish()),
            json!({ "target": [
                { "serial": "0001", "vsys_list": [] },
                { "serial": "0002", "vsys_list": ["vsys1", "vsys2"] }
            ]})
        );
    }

    #[test]
    fn absent_values_are_written_as_defaults() {
        let mut out = AttrWriter::new();
        out.opt_string("description", None);
        out.int("port", None);
        assert_eq!(Value::Object(out.finish()), json!({ "description": "", "port": 0 }));
    }
}
