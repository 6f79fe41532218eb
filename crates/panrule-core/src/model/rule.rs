use std::fmt;

use panrule_api::XmlNode;
use uuid::Uuid;

use super::common::RuleCommon;
use crate::codec::{Attributes, Bag};
use crate::error::CoreError;
use crate::location::Family;
use crate::schema::Attribute;

/// A policy rule of one rulebase family.
///
/// Implementors provide the XML entry codec, the attribute-bag codec and
/// the family's schema plug-in; everything else (name, uuid, content
/// comparison) comes from the shared skeleton.
pub trait PolicyRule: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    const FAMILY: Family;

    fn common(&self) -> &RuleCommon;

    fn common_mut(&mut self) -> &mut RuleCommon;

    fn name(&self) -> &str {
        &self.common().name
    }

    fn uuid(&self) -> Option<Uuid> {
        self.common().uuid
    }

    fn set_uuid(&mut self, uuid: Option<Uuid>) {
        self.common_mut().uuid = uuid;
    }

    /// Whether both rules would produce the same configuration.
    ///
    /// The appliance-assigned uuid is not configuration and is ignored.
    fn same_config(&self, other: &Self) -> bool {
        if self.uuid() == other.uuid() {
            return self == other;
        }
        let mut left = self.clone();
        let mut right = other.clone();
        left.set_uuid(None);
        right.set_uuid(None);
        left == right
    }

    /// Encode as an `<entry>` element. The uuid is never written.
    fn to_xml(&self) -> XmlNode;

    /// Decode an `<entry>` element read from the appliance.
    fn from_xml(entry: &XmlNode) -> Result<Self, CoreError>;

    /// Family-specific attributes merged into the rule schema.
    fn family_attributes() -> Vec<Attribute>;

    /// Load one declared `rule` block.
    fn from_bag(bag: &Bag<'_>) -> Result<Self, CoreError>;

    /// Dump as a `rule` block with every attribute present.
    fn to_bag(&self) -> Attributes;
}
