// ── Shared rule skeleton ──
//
// Attributes every rule family carries, plus the XML helpers the family
// codecs build on. Sets are kept sorted and de-duplicated so equality is
// order-insensitive and output is deterministic.

use std::collections::BTreeMap;

use panrule_api::XmlNode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{AttrWriter, Bag};
use crate::error::CoreError;

/// Panorama push targets: firewall serial → vsys names (empty = all).
pub type Targets = BTreeMap<String, Vec<String>>;

pub const ANY: &str = "any";

/// Attributes shared by security, decryption and NAT rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCommon {
    pub name: String,
    /// Assigned by the appliance; never written.
    pub uuid: Option<Uuid>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub group_tag: Option<String>,
    pub disabled: bool,
    pub targets: Targets,
    pub negate_target: bool,
}

impl RuleCommon {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    // ── XML ──────────────────────────────────────────────────────────

    /// Start an `<entry>` element carrying the shared attributes.
    pub fn to_entry(&self) -> XmlNode {
        let mut entry = XmlNode::entry(self.name.as_str());
        entry.push_opt("description", self.description.as_deref());
        push_members(&mut entry, "tag", &self.tags);
        entry.push_opt("group-tag", self.group_tag.as_deref());
        push_flag(&mut entry, "disabled", self.disabled, false);

        if !self.targets.is_empty() || self.negate_target {
            let mut target = XmlNode::new("target");
            if !self.targets.is_empty() {
                let mut devices = XmlNode::new("devices");
                for (serial, vsys_list) in &self.targets {
                    let mut device = XmlNode::entry(serial.as_str());
                    if !vsys_list.is_empty() {
                        let mut vsys = XmlNode::new("vsys");
                        for name in vsys_list {
                            vsys.push(XmlNode::entry(name.as_str()));
                        }
                        device.push(vsys);
                    }
                    devices.push(device);
                }
                target.push(devices);
            }
            push_flag(&mut target, "negate", self.negate_target, false);
            entry.push(target);
        }
        entry
    }

    pub fn from_entry(entry: &XmlNode) -> Result<Self, CoreError> {
        let name = entry
            .attr("name")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CoreError::Api {
                message: "rule entry without a name".into(),
                code: None,
            })?;

        let mut targets = Targets::new();
        let target = entry.get_child("target");
        if let Some(devices) = target.and_then(|t| t.get_child("devices")) {
            for device in devices.get_children("entry") {
                let Some(serial) = device.attr("name") else {
                    continue;
                };
                targets.insert(serial.to_owned(), normalize_set(device.entry_names("vsys")));
            }
        }

        Ok(Self {
            name: name.to_owned(),
            uuid: entry.attr("uuid").and_then(|u| Uuid::parse_str(u).ok()),
            description: text(entry, "description"),
            tags: read_set(entry, "tag"),
            group_tag: text(entry, "group-tag"),
            disabled: read_flag(entry, "disabled", false),
            targets,
            negate_target: target.is_some_and(|t| read_flag(t, "negate", false)),
        })
    }

    // ── Attribute bag ────────────────────────────────────────────────

    pub fn from_bag(bag: &Bag<'_>) -> Result<Self, CoreError> {
        let name = bag.string("name")?.ok_or_else(|| {
            CoreError::validation(bag.path_of("name"), "every rule needs a non-empty name")
        })?;
        if name.contains('\'') {
            return Err(CoreError::validation(
                bag.path_of("name"),
                format!("{name:?} must not contain a single quote"),
            ));
        }
        if name.contains('\n') || name.contains(crate::identity::SEPARATOR) {
            return Err(CoreError::validation(
                bag.path_of("name"),
                format!("{name:?} must not contain a newline or ':'"),
            ));
        }

        Ok(Self {
            name,
            uuid: bag
                .string("uuid")?
                .and_then(|u| Uuid::parse_str(&u).ok()),
            description: bag.string("description")?,
            tags: bag.set("tags")?,
            group_tag: bag.string("group_tag")?,
            disabled: bag.bool_or("disabled", false)?,
            targets: bag.targets("target")?,
            negate_target: bag.bool_or("negate_target", false)?,
        })
    }

    pub fn write_bag(&self, out: &mut AttrWriter) {
        out.string("name", &self.name);
        out.opt_string("uuid", self.uuid.map(|u| u.to_string()).as_deref());
        out.opt_string("description", self.description.as_deref());
        out.set("tags", &self.tags);
        out.opt_string("group_tag", self.group_tag.as_deref());
        out.bool("disabled", self.disabled);
        out.targets("target", &self.targets);
        out.bool("negate_target", self.negate_target);
    }
}

// ── XML helpers ──────────────────────────────────────────────────────

/// Sort, de-duplicate and drop empty strings.
pub fn normalize_set(mut values: Vec<String>) -> Vec<String> {
    values.retain(|v| !v.is_empty());
    values.sort();
    values.dedup();
    values
}

/// An empty required match set means "any".
pub fn or_any(values: Vec<String>) -> Vec<String> {
    let values = normalize_set(values);
    if values.is_empty() {
        vec![ANY.to_owned()]
    } else {
        values
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Append `<tag><member>..</member></tag>` unless `values` is empty.
pub fn push_members(entry: &mut XmlNode, tag: &str, values: &[String]) {
    if !values.is_empty() {
        entry.push(XmlNode::members(tag, values.iter().map(String::as_str)));
    }
}

/// Append `<tag>yes|no</tag>` only when `value` differs from `default`.
pub fn push_flag(entry: &mut XmlNode, tag: &str, value: bool, default: bool) {
    if value != default {
        entry.push(XmlNode::leaf(tag, yes_no(value)));
    }
}

pub fn read_flag(node: &XmlNode, tag: &str, default: bool) -> bool {
    match node.get_text(&[tag]) {
        Some("yes") => true,
        Some("no") => false,
        _ => default,
    }
}

pub fn read_set(node: &XmlNode, tag: &str) -> Vec<String> {
    normalize_set(node.member_texts(tag))
}

pub fn read_set_or_any(node: &XmlNode, tag: &str) -> Vec<String> {
    or_any(node.member_texts(tag))
}

/// Non-empty text of a direct child.
pub fn text(node: &XmlNode, tag: &str) -> Option<String> {
    node.get_text(&[tag])
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Parse a keyword leaf through `FromStr`, falling back to `default` when
/// the element is absent.
pub fn read_enum<T: std::str::FromStr>(node: &XmlNode, tag: &str, default: T) -> Result<T, CoreError> {
    match node.get_text(&[tag]) {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|_| CoreError::Api {
            message: format!("unexpected <{tag}> value {value:?} in rule entry"),
            code: None,
        }),
    }
}
