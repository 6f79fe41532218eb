// ── Attribute schema ──
//
// Declarative description of the attribute bags exchanged with the host.
// Every rule family shares one skeleton and contributes its own attribute
// plug-in; resource schemas wrap the rule block with location and
// placement attributes.

use serde::Serialize;
use serde_json::Value;

use crate::codec::Attributes;
use crate::error::CoreError;
use crate::migrate::SCHEMA_VERSION;
use crate::model::PolicyRule;

/// Value shape of one attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "block", rename_all = "snake_case")]
pub enum AttrType {
    String,
    Bool,
    Int,
    /// Unordered, de-duplicated strings.
    StringSet,
    /// Ordered strings.
    StringList,
    /// Ordered nested blocks.
    BlockList(Vec<Attribute>),
    /// Unordered nested blocks.
    BlockSet(Vec<Attribute>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: AttrType,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub computed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub write_only: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<&'static str>,
    #[serde(skip_serializing_if = "is_zero")]
    pub min_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub description: &'static str,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Attribute {
    fn of(name: &'static str, kind: AttrType) -> Self {
        Self {
            name,
            kind,
            required: false,
            computed: false,
            write_only: false,
            sensitive: false,
            enum_values: Vec::new(),
            min_items: 0,
            default: None,
            description: "",
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::of(name, AttrType::String)
    }

    pub fn bool(name: &'static str) -> Self {
        Self::of(name, AttrType::Bool)
    }

    pub fn int(name: &'static str) -> Self {
        Self::of(name, AttrType::Int)
    }

    pub fn string_set(name: &'static str) -> Self {
        Self::of(name, AttrType::StringSet)
    }

    pub fn string_list(name: &'static str) -> Self {
        Self::of(name, AttrType::StringList)
    }

    pub fn block_list(name: &'static str, attributes: Vec<Attribute>) -> Self {
        Self::of(name, AttrType::BlockList(attributes))
    }

    pub fn block_set(name: &'static str, attributes: Vec<Attribute>) -> Self {
        Self::of(name, AttrType::BlockSet(attributes))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        self.enum_values = values.to_vec();
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = n;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, text: &'static str) -> Self {
        self.description = text;
        self
    }

    fn validate(&self, path: &str, value: &Value) -> Result<(), CoreError> {
        let bad_type = |expected: &str| {
            CoreError::validation(path, format!("expected {expected}, got {value}"))
        };

        match (&self.kind, value) {
            (AttrType::String, Value::String(s)) => {
                if !s.is_empty() && !self.enum_values.is_empty() && !self.enum_values.contains(&s.as_str()) {
                    return Err(CoreError::validation(
                        path,
                        format!("{s:?} is not one of {:?}", self.enum_values),
                    ));
                }
                if self.required && s.is_empty() {
                    return Err(CoreError::validation(path, "must not be empty"));
                }
                Ok(())
            }
            (AttrType::String, _) => Err(bad_type("a string")),
            (AttrType::Bool, Value::Bool(_)) => Ok(()),
            (AttrType::Bool, _) => Err(bad_type("a boolean")),
            (AttrType::Int, Value::Number(n)) if n.is_i64() => Ok(()),
            (AttrType::Int, _) => Err(bad_type("an integer")),
            (AttrType::StringSet | AttrType::StringList, Value::Array(items)) => {
                if let Some(item) = items.iter().find(|i| !i.is_string()) {
                    return Err(CoreError::validation(
                        path,
                        format!("expected a list of strings, found element {item}"),
                    ));
                }
                self.check_len(path, items.len())
            }
            (AttrType::StringSet | AttrType::StringList, _) => Err(bad_type("a list of strings")),
            (AttrType::BlockList(attrs) | AttrType::BlockSet(attrs), Value::Array(items)) => {
                self.check_len(path, items.len())?;
                for (idx, item) in items.iter().enumerate() {
                    let item_path = format!("{path}[{idx}]");
                    let Value::Object(block) = item else {
                        return Err(CoreError::validation(
                            item_path,
                            format!("expected a block, got {item}"),
                        ));
                    };
                    validate_block(attrs, &item_path, block)?;
                }
                Ok(())
            }
            (AttrType::BlockList(_) | AttrType::BlockSet(_), _) => Err(bad_type("a list of blocks")),
        }
    }

    fn check_len(&self, path: &str, len: usize) -> Result<(), CoreError> {
        if len < self.min_items {
            return Err(CoreError::validation(
                path,
                format!("needs at least {} element(s), got {len}", self.min_items),
            ));
        }
        Ok(())
    }
}

fn validate_block(attrs: &[Attribute], path: &str, block: &Attributes) -> Result<(), CoreError> {
    let child_path = |name: &str| {
        if path.is_empty() {
            name.to_owned()
        } else {
            format!("{path}.{name}")
        }
    };

    for key in block.keys() {
        if !attrs.iter().any(|a| a.name == key) {
            return Err(CoreError::validation(child_path(key), "unsupported attribute"));
        }
    }

    for attr in attrs {
        let path = child_path(attr.name);
        match block.get(attr.name) {
            None | Some(Value::Null) => {
                if attr.required {
                    return Err(CoreError::validation(path, "attribute is required"));
                }
            }
            Some(value) => attr.validate(&path, value)?,
        }
    }
    Ok(())
}

/// Schema of one resource or data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub version: u32,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    /// Reject missing required attributes, wrongly typed values, values
    /// outside an enumeration and lists that are too short.
    pub fn validate(&self, attrs: &Attributes) -> Result<(), CoreError> {
        validate_block(&self.attributes, "", attrs)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Nested attribute names flagged `sensitive` inside the `rule` block.
    pub fn sensitive_rule_attributes(&self) -> Vec<&'static str> {
        match self.attribute("rule").map(|a| &a.kind) {
            Some(AttrType::BlockList(attrs) | AttrType::BlockSet(attrs)) => attrs
                .iter()
                .filter(|a| a.sensitive)
                .map(|a| a.name)
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ── Builders ─────────────────────────────────────────────────────────

/// Attributes every rule carries regardless of family.
pub fn rule_skeleton() -> Vec<Attribute> {
    vec![
        Attribute::string("name").required().describe("Rule name, unique within the rulebase"),
        Attribute::string("uuid").computed().describe("Identifier assigned by the appliance"),
        Attribute::string("description"),
        Attribute::string_set("tags"),
        Attribute::string("group_tag"),
        Attribute::bool("disabled").default_value(false),
        Attribute::block_set(
            "target",
            vec![
                Attribute::string("serial").required(),
                Attribute::string_set("vsys_list"),
            ],
        )
        .describe("Panorama only: firewalls this rule is pushed to"),
        Attribute::bool("negate_target").default_value(false),
        Attribute::string("audit_comment")
            .write_only()
            .describe("Recorded with the change; never read back"),
    ]
}

/// The `rule` block for family `R`: the skeleton plus the family plug-in.
pub fn rule_block<R: PolicyRule>() -> Vec<Attribute> {
    let mut attrs = rule_skeleton();
    attrs.extend(R::family_attributes());
    attrs
}

fn location_attributes() -> Vec<Attribute> {
    vec![
        Attribute::string("device_group")
            .default_value("shared")
            .describe("Panorama only"),
        Attribute::string("rulebase").one_of(&["rulebase", "pre-rulebase", "post-rulebase"]),
        Attribute::string("vsys")
            .default_value("vsys1")
            .describe("Firewall only"),
    ]
}

/// Schema of the rule-group resource.
pub fn rule_group_schema<R: PolicyRule>() -> Schema {
    let mut attributes = location_attributes();
    attributes.extend([
        Attribute::string("position_keyword").one_of(&[
            "top",
            "bottom",
            "before",
            "directly-before",
            "after",
            "directly-after",
        ]),
        Attribute::string("position_reference")
            .describe("Must be empty unless position_keyword is relative"),
        Attribute::block_list("rule", rule_block::<R>())
            .required()
            .min_items(1),
    ]);
    Schema {
        version: SCHEMA_VERSION,
        attributes,
    }
}

/// Schema of the whole-rulebase policy resource.
pub fn policy_schema<R: PolicyRule>() -> Schema {
    let mut attributes = location_attributes();
    attributes.push(
        Attribute::block_list("rule", rule_block::<R>())
            .required()
            .min_items(1),
    );
    Schema {
        version: SCHEMA_VERSION,
        attributes,
    }
}

/// Schema of the read-only rulebase data source.
pub fn rulebase_data_source_schema<R: PolicyRule>() -> Schema {
    let mut attributes = location_attributes();
    attributes.extend([
        Attribute::string_list("names").computed(),
        Attribute::block_list("rule", rule_block::<R>()).computed(),
    ]);
    Schema {
        version: SCHEMA_VERSION,
        attributes,
    }
}
