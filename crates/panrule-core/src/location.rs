// ── Rulebase addressing ──
//
// A rulebase is located by (device-group, rulebase slot, vsys, family).
// Standalone firewalls only look at the vsys; Panorama only at the
// device-group and slot. The unused fields carry topology defaults so the
// engine always handles the same four-tuple.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;

pub const DEFAULT_DEVICE_GROUP: &str = "shared";
pub const DEFAULT_VSYS: &str = "vsys1";

/// Deployment topology of the appliance being managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// A single firewall with virtual systems.
    Standalone,
    /// Panorama with device-groups and pre/post rulebases.
    Controller,
}

impl From<panrule_api::Platform> for Topology {
    fn from(platform: panrule_api::Platform) -> Self {
        if platform.is_controller() {
            Self::Controller
        } else {
            Self::Standalone
        }
    }
}

/// Which of the three rulebases a group lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum RulebaseSlot {
    /// The only rulebase of a standalone firewall.
    Rulebase,
    PreRulebase,
    PostRulebase,
}

impl RulebaseSlot {
    /// The slot a topology uses when none is given.
    pub fn default_for(topology: Topology) -> Self {
        match topology {
            Topology::Standalone => Self::Rulebase,
            Topology::Controller => Self::PreRulebase,
        }
    }
}

/// Policy rule family, also the rulebase element name in the xpath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Family {
    Security,
    Decryption,
    Nat,
}

/// The four-tuple addressing one rulebase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub device_group: String,
    pub rulebase: RulebaseSlot,
    pub vsys: String,
    pub family: Family,
}

impl Location {
    /// Build a location, filling topology defaults for anything unset.
    ///
    /// The controller has no plain `rulebase` slot; asking for it is a
    /// validation error rather than a silent remap.
    pub fn resolve(
        topology: Topology,
        family: Family,
        device_group: Option<&str>,
        rulebase: Option<RulebaseSlot>,
        vsys: Option<&str>,
    ) -> Result<Self, CoreError> {
        let device_group = non_empty(device_group).unwrap_or(DEFAULT_DEVICE_GROUP);
        let vsys = non_empty(vsys).unwrap_or(DEFAULT_VSYS);

        let rulebase = match (topology, rulebase) {
            (Topology::Controller, Some(RulebaseSlot::Rulebase)) => {
                return Err(CoreError::validation(
                    "rulebase",
                    "\"rulebase\" is only valid on a standalone firewall; use \"pre-rulebase\" or \"post-rulebase\"",
                ));
            }
            (Topology::Standalone, Some(slot)) if slot != RulebaseSlot::Rulebase => {
                return Err(CoreError::validation(
                    "rulebase",
                    format!("\"{slot}\" requires Panorama; a firewall only has \"rulebase\""),
                ));
            }
            (_, Some(slot)) => slot,
            (topology, None) => RulebaseSlot::default_for(topology),
        };

        for (attr, value) in [("device_group", device_group), ("vsys", vsys)] {
            if value.contains(crate::identity::SEPARATOR) || value.contains('\'') {
                return Err(CoreError::validation(
                    attr,
                    format!("{value:?} must not contain ':' or a single quote"),
                ));
            }
        }

        Ok(Self {
            device_group: device_group.to_owned(),
            rulebase,
            vsys: vsys.to_owned(),
            family,
        })
    }

    /// Topology implied by the slot.
    pub fn topology(&self) -> Topology {
        match self.rulebase {
            RulebaseSlot::Rulebase => Topology::Standalone,
            RulebaseSlot::PreRulebase | RulebaseSlot::PostRulebase => Topology::Controller,
        }
    }

    /// Xpath of the `<rules>` container for this location.
    pub fn rules_xpath(&self) -> Result<String, CoreError> {
        let family = self.family.to_string();
        let xpath = match self.rulebase {
            RulebaseSlot::Rulebase => panrule_api::xpath::firewall_rules(&self.vsys, &family)?,
            slot => panrule_api::xpath::panorama_rules(
                &self.device_group,
                &slot.to_string(),
                &family,
            )?,
        };
        Ok(xpath)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.topology() {
            Topology::Standalone => write!(f, "{} {} rulebase", self.vsys, self.family),
            Topology::Controller => write!(
                f,
                "{} {} {}",
                self.device_group, self.rulebase, self.family
            ),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_defaults_to_shared_pre_rulebase() {
        let loc = Location::resolve(Topology::Controller, Family::Security, None, None, None)
            .expect("valid");
        assert_eq!(loc.device_group, "shared");
        assert_eq!(loc.rulebase, RulebaseSlot::PreRulebase);
        assert_eq!(
            loc.rules_xpath().expect("xpath"),
            "/config/shared/pre-rulebase/security/rules"
        );
    }

    #[test]
    fn standalone_defaults_to_vsys1() {
        let loc = Location::resolve(Topology::Standalone, Family::Nat, None, None, Some(""))
            .expect("valid");
        assert_eq!(loc.vsys, "vsys1");
        assert_eq!(loc.rulebase, RulebaseSlot::Rulebase);
        assert!(loc.rules_xpath().expect("xpath").ends_with("/rulebase/nat/rules"));
    }

    #[test]
    fn controller_rejects_plain_rulebase() {
        let err = Location::resolve(
            Topology::Controller,
            Family::Security,
            Some("branch"),
            Some(RulebaseSlot::Rulebase),
            None,
        )
        .expect_err("invalid");
        assert!(matches!(err, CoreError::Validation { ref attribute, .. } if attribute == "rulebase"));
    }

    #[test]
    fn separator_in_device_group_is_rejected() {
        assert!(
            Location::resolve(Topology::Controller, Family::Security, Some("a:b"), None, None)
                .is_err()
        );
    }

    #[test]
    fn slot_parses_kebab_case() {
        assert_eq!("post-rulebase".parse::<RulebaseSlot>().ok(), Some(RulebaseSlot::PostRulebase));
        assert_eq!(Family::Decryption.to_string(), "decryption");
    }
}
