// ── Security rules ──

use panrule_api::XmlNode;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::common::{
    RuleCommon, push_flag, push_members, read_enum, read_flag, read_set, read_set_or_any, text,
};
use super::rule::PolicyRule;
use crate::codec::{AttrWriter, Attributes, Bag};
use crate::error::CoreError;
use crate::location::Family;
use crate::schema::Attribute;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SecurityAction {
    #[default]
    Allow,
    Deny,
    Drop,
    ResetClient,
    ResetServer,
    ResetBoth,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SecurityRuleType {
    #[default]
    Universal,
    Interzone,
    Intrazone,
}

/// Individually attached security profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityProfiles {
    pub virus: Option<String>,
    pub spyware: Option<String>,
    pub vulnerability: Option<String>,
    pub url_filtering: Option<String>,
    pub file_blocking: Option<String>,
    pub wildfire_analysis: Option<String>,
    pub data_filtering: Option<String>,
}

impl SecurityProfiles {
    /// (bag key, xml element, value)
    fn slots(&self) -> [(&'static str, &'static str, Option<&str>); 7] {
        [
            ("virus", "virus", self.virus.as_deref()),
            ("spyware", "spyware", self.spyware.as_deref()),
            ("vulnerability", "vulnerability", self.vulnerability.as_deref()),
            ("url_filtering", "url-filtering", self.url_filtering.as_deref()),
            ("file_blocking", "file-blocking", self.file_blocking.as_deref()),
            ("wildfire_analysis", "wildfire-analysis", self.wildfire_analysis.as_deref()),
            ("data_filtering", "data-filtering", self.data_filtering.as_deref()),
        ]
    }

    fn with<F>(mut get: F) -> Result<Self, CoreError>
    where
        F: FnMut(&'static str, &'static str) -> Result<Option<String>, CoreError>,
    {
        Ok(Self {
            virus: get("virus", "virus")?,
            spyware: get("spyware", "spyware")?,
            vulnerability: get("vulnerability", "vulnerability")?,
            url_filtering: get("url_filtering", "url-filtering")?,
            file_blocking: get("file_blocking", "file-blocking")?,
            wildfire_analysis: get("wildfire_analysis", "wildfire-analysis")?,
            data_filtering: get("data_filtering", "data-filtering")?,
        })
    }

    fn is_empty(&self) -> bool {
        self.slots().iter().all(|(_, _, v)| v.is_none())
    }
}

/// How security profiles are attached to a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileSetting {
    #[default]
    None,
    Group(String),
    Profiles(SecurityProfiles),
}

impl ProfileSetting {
    fn from_profiles(profiles: SecurityProfiles) -> Self {
        if profiles.is_empty() {
            Self::None
        } else {
            Self::Profiles(profiles)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    #[serde(flatten)]
    pub common: RuleCommon,
    pub rule_type: SecurityRuleType,
    pub source_zones: Vec<String>,
    pub destination_zones: Vec<String>,
    pub source_addresses: Vec<String>,
    pub destination_addresses: Vec<String>,
    pub negate_source: bool,
    pub negate_destination: bool,
    pub source_users: Vec<String>,
    pub source_hip: Vec<String>,
    pub destination_hip: Vec<String>,
    pub applications: Vec<String>,
    pub services: Vec<String>,
    pub categories: Vec<String>,
    pub source_devices: Vec<String>,
    pub destination_devices: Vec<String>,
    pub action: SecurityAction,
    pub log_setting: Option<String>,
    pub log_start: bool,
    pub log_end: bool,
    pub schedule: Option<String>,
    pub icmp_unreachable: bool,
    pub disable_server_response_inspection: bool,
    pub profile_setting: ProfileSetting,
}

impl SecurityRule {
    /// An allow-any rule named `name`, matching what the appliance reports
    /// for an entry carrying only defaults.
    pub fn new(name: impl Into<String>) -> Self {
        let any = || vec![super::ANY.to_owned()];
        Self {
            common: RuleCommon::new(name),
            source_zones: any(),
            destination_zones: any(),
            source_addresses: any(),
            destination_addresses: any(),
            source_users: any(),
            applications: any(),
            services: any(),
            categories: any(),
            log_end: true,
            ..Self::default()
        }
    }
}

const ACTIONS: &[&str] = &[
    "allow",
    "deny",
    "drop",
    "reset-client",
    "reset-server",
    "reset-both",
];

impl PolicyRule for SecurityRule {
    const FAMILY: Family = Family::Security;

    fn common(&self) -> &RuleCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut RuleCommon {
        &mut self.common
    }

    fn to_xml(&self) -> XmlNode {
        let mut e = self.common.to_entry();
        if self.rule_type != SecurityRuleType::Universal {
            e.push(XmlNode::leaf("rule-type", self.rule_type.to_string()));
        }
        push_members(&mut e, "from", &self.source_zones);
        push_members(&mut e, "to", &self.destination_zones);
        push_members(&mut e, "source", &self.source_addresses);
        push_members(&mut e, "destination", &self.destination_addresses);
        push_flag(&mut e, "negate-source", self.negate_source, false);
        push_flag(&mut e, "negate-destination", self.negate_destination, false);
        push_members(&mut e, "source-user", &self.source_users);
        push_members(&mut e, "source-hip", &self.source_hip);
        push_members(&mut e, "destination-hip", &self.destination_hip);
        push_members(&mut e, "application", &self.applications);
        push_members(&mut e, "service", &self.services);
        push_members(&mut e, "category", &self.categories);
        push_members(&mut e, "source-device", &self.source_devices);
        push_members(&mut e, "destination-device", &self.destination_devices);
        e.push(XmlNode::leaf("action", self.action.to_string()));
        e.push_opt("log-setting", self.log_setting.as_deref());
        push_flag(&mut e, "log-start", self.log_start, false);
        push_flag(&mut e, "log-end", self.log_end, true);
        e.push_opt("schedule", self.schedule.as_deref());
        push_flag(&mut e, "icmp-unreachable", self.icmp_unreachable, false);
        if self.disable_server_response_inspection {
            let mut option = XmlNode::new("option");
            push_flag(&mut option, "disable-server-response-inspection", true, false);
            e.push(option);
        }

        match &self.profile_setting {
            ProfileSetting::None => {}
            ProfileSetting::Group(group) => {
                e.push(
                    XmlNode::new("profile-setting")
                        .with_child(XmlNode::members("group", [group.as_str()])),
                );
            }
            ProfileSetting::Profiles(profiles) => {
                let mut list = XmlNode::new("profiles");
                for (_, tag, value) in profiles.slots() {
                    if let Some(value) = value {
                        list.push(XmlNode::members(tag, [value]));
                    }
                }
                e.push(XmlNode::new("profile-setting").with_child(list));
            }
        }
        e
    }

    fn from_xml(entry: &XmlNode) -> Result<Self, CoreError> {
        let profile_setting = match entry.get_child("profile-setting") {
            None => ProfileSetting::None,
            Some(ps) => {
                if let Some(group) = ps.member_texts("group").into_iter().next() {
                    ProfileSetting::Group(group)
                } else if let Some(list) = ps.get_child("profiles") {
                    ProfileSetting::from_profiles(SecurityProfiles::with(|_, tag| {
                        Ok(list.member_texts(tag).into_iter().next())
                    })?)
                } else {
                    ProfileSetting::None
                }
            }
        };

        Ok(Self {
            common: RuleCommon::from_entry(entry)?,
            rule_type: read_enum(entry, "rule-type", SecurityRuleType::Universal)?,
            source_zones: read_set_or_any(entry, "from"),
            destination_zones: read_set_or_any(entry, "to"),
            source_addresses: read_set_or_any(entry, "source"),
            destination_addresses: read_set_or_any(entry, "destination"),
            negate_source: read_flag(entry, "negate-source", false),
            negate_destination: read_flag(entry, "negate-destination", false),
            source_users: read_set_or_any(entry, "source-user"),
            source_hip: read_set(entry, "source-hip"),
            destination_hip: read_set(entry, "destination-hip"),
            applications: read_set_or_any(entry, "application"),
            services: read_set_or_any(entry, "service"),
            categories: read_set_or_any(entry, "category"),
            source_devices: read_set(entry, "source-device"),
            destination_devices: read_set(entry, "destination-device"),
            action: read_enum(entry, "action", SecurityAction::Allow)?,
            log_setting: text(entry, "log-setting"),
            log_start: read_flag(entry, "log-start", false),
            log_end: read_flag(entry, "log-end", true),
            schedule: text(entry, "schedule"),
            icmp_unreachable: read_flag(entry, "icmp-unreachable", false),
            disable_server_response_inspection: entry
                .get_child("option")
                .is_some_and(|o| read_flag(o, "disable-server-response-inspection", false)),
            profile_setting,
        })
    }

    fn family_attributes() -> Vec<Attribute> {
        vec![
            Attribute::string("type")
                .one_of(&["universal", "interzone", "intrazone"])
                .default_value("universal"),
            Attribute::string_set("source_zones").default_value(vec!["any"]),
            Attribute::string_set("destination_zones").default_value(vec!["any"]),
            Attribute::string_set("source_addresses").default_value(vec!["any"]),
            Attribute::string_set("destination_addresses").default_value(vec!["any"]),
            Attribute::bool("negate_source").default_value(false),
            Attribute::bool("negate_destination").default_value(false),
            Attribute::string_set("source_users").default_value(vec!["any"]),
            Attribute::string_set("source_hip"),
            Attribute::string_set("destination_hip"),
            Attribute::string_set("applications").default_value(vec!["any"]),
            Attribute::string_set("services").default_value(vec!["any"]),
            Attribute::string_set("categories").default_value(vec!["any"]),
            Attribute::string_set("source_devices"),
            Attribute::string_set("destination_devices"),
            Attribute::string("action").one_of(ACTIONS).default_value("allow"),
            Attribute::string("log_setting"),
            Attribute::bool("log_start").default_value(false),
            Attribute::bool("log_end").default_value(true),
            Attribute::string("schedule"),
            Attribute::bool("icmp_unreachable").default_value(false),
            Attribute::bool("disable_server_response_inspection").default_value(false),
            Attribute::string("group").describe("Security profile group; excludes individual profiles"),
            Attribute::string("virus"),
            Attribute::string("spyware"),
            Attribute::string("vulnerability"),
            Attribute::string("url_filtering"),
            Attribute::string("file_blocking"),
            Attribute::string("wildfire_analysis"),
            Attribute::string("data_filtering"),
        ]
    }

    fn from_bag(bag: &Bag<'_>) -> Result<Self, CoreError> {
        let profiles = SecurityProfiles::with(|key, _| bag.string(key))?;
        let profile_setting = match bag.string("group")? {
            Some(group) if !profiles.is_empty() => {
                return Err(CoreError::validation(
                    bag.path_of("group"),
                    format!("profile group {group:?} cannot be combined with individual profiles"),
                ));
            }
            Some(group) => ProfileSetting::Group(group),
            None => ProfileSetting::from_profiles(profiles),
        };

        Ok(Self {
            common: RuleCommon::from_bag(bag)?,
            rule_type: bag.enum_or("type", SecurityRuleType::Universal)?,
            source_zones: bag.set_or_any("source_zones")?,
            destination_zones: bag.set_or_any("destination_zones")?,
            source_addresses: bag.set_or_any("source_addresses")?,
            destination_addresses: bag.set_or_any("destination_addresses")?,
            negate_source: bag.bool_or("negate_source", false)?,
            negate_destination: bag.bool_or("negate_destination", false)?,
            source_users: bag.set_or_any("source_users")?,
            source_hip: bag.set("source_hip")?,
            destination_hip: bag.set("destination_hip")?,
            applications: bag.set_or_any("applications")?,
            services: bag.set_or_any("services")?,
            categories: bag.set_or_any("categories")?,
            source_devices: bag.set("source_devices")?,
            destination_devices: bag.set("destination_devices")?,
            action: bag.enum_or("action", SecurityAction::Allow)?,
            log_setting: bag.string("log_setting")?,
            log_start: bag.bool_or("log_start", false)?,
            log_end: bag.bool_or("log_end", true)?,
            schedule: bag.string("schedule")?,
            icmp_unreachable: bag.bool_or("icmp_unreachable", false)?,
            disable_server_response_inspection: bag
                .bool_or("disable_server_response_inspection", false)?,
            profile_setting,
        })
    }

    fn to_bag(&self) -> Attributes {
        let mut out = AttrWriter::new();
        self.common.write_bag(&mut out);
        out.string("type", &self.rule_type.to_string());
        out.set("source_zones", &self.source_zones);
        out.set("destination_zones", &self.destination_zones);
        out.set("source_addresses", &self.source_addresses);
        out.set("destination_addresses", &self.destination_addresses);
        out.bool("negate_source", self.negate_source);
        out.bool("negate_destination", self.negate_destination);
        out.set("source_users", &self.source_users);
        out.set("source_hip", &self.source_hip);
        out.set("destination_hip", &self.destination_hip);
        out.set("applications", &self.applications);
        out.set("services", &self.services);
        out.set("categories", &self.categories);
        out.set("source_devices", &self.source_devices);
        out.set("destination_devices", &self.destination_devices);
        out.string("action", &self.action.to_string());
        out.opt_string("log_setting", self.log_setting.as_deref());
        out.bool("log_start", self.log_start);
        out.bool("log_end", self.log_end);
        out.opt_string("schedule", self.schedule.as_deref());
        out.bool("icmp_unreachable", self.icmp_unreachable);
        out.bool(
            "disable_server_response_inspection",
            self.disable_server_response_inspection,
        );

        let (group, profiles) = match &self.profile_setting {
            ProfileSetting::None => (None, SecurityProfiles::default()),
            ProfileSetting::Group(group) => (Some(group.as_str()), SecurityProfiles::default()),
            ProfileSetting::Profiles(profiles) => (None, profiles.clone()),
        };
        out.opt_string("group", group);
        for (key, _, value) in profiles.slots() {
            out.opt_string(key, value);
        }
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::codec::Bag;

    fn load(value: Value) -> Result<SecurityRule, CoreError> {
        let Value::Object(map) = value else {
            panic!("expected an object");
        };
        SecurityRule::from_bag(&Bag::new(&map))
    }

    #[test]
    fn minimal_bag_matches_defaults() {
        let rule = load(json!({ "name": "allow-dns" })).expect("loads");
        assert_eq!(rule, SecurityRule::new("allow-dns"));
    }

    #[test]
    fn xml_round_trip_preserves_content() {
        let mut rule = SecurityRule::new("web");
        rule.source_zones = vec!["trust".into()];
        rule.destination_zones = vec!["untrust".into()];
        rule.applications = vec!["ssl".into(), "web-browsing".into()];
        rule.action = SecurityAction::ResetBoth;
        rule.log_end = false;
        rule.disable_server_response_inspection = true;
        rule.rule_type = SecurityRuleType::Interzone;
        rule.profile_setting = ProfileSetting::Profiles(SecurityProfiles {
            virus: Some("default".into()),
            url_filtering: Some("strict".into()),
            ..SecurityProfiles::default()
        });

        let parsed = SecurityRule::from_xml(&rule.to_xml()).expect("parses");
        assert_eq!(parsed, rule);
    }

    #[test]
    fn default_log_end_is_not_written() {
        let xml = SecurityRule::new("r").to_xml();
        assert!(xml.get_child("log-end").is_none());
        assert_eq!(xml.get_text(&["action"]), Some("allow"));
    }

    #[test]
    fn group_and_profiles_are_exclusive() {
        let err = load(json!({ "name": "r", "group": "best-practice", "virus": "default" }))
            .expect_err("exclusive");
        assert!(matches!(err, CoreError::Validation { .. }));

        let rule = load(json!({ "name": "r", "group": "best-practice" })).expect("loads");
        assert_eq!(rule.profile_setting, ProfileSetting::Group("best-practice".into()));
    }

    #[test]
    fn bag_round_trip_is_stable() {
        let rule = load(json!({
            "name": "r",
            "source_zones": ["b", "a"],
            "action": "drop",
            "target": [{ "serial": "0001", "vsys_list": ["vsys1"] }]
        }))
        .expect("loads");
        let dumped = rule.to_bag();
        assert_eq!(dumped.get("source_zones"), Some(&json!(["a", "b"])));
        assert_eq!(dumped.get("description"), Some(&json!("")));
        let reloaded = SecurityRule::from_bag(&Bag::new(&dumped)).expect("reloads");
        assert_eq!(reloaded, rule);
    }

    #[test]
    fn unknown_action_names_the_attribute() {
        let err = load(json!({ "name": "r", "action": "permit" })).expect_err("invalid");
        assert!(matches!(err, CoreError::Validation { ref attribute, .. } if attribute == "action"));
    }

    #[test]
    fn same_config_ignores_uuid() {
        let a = SecurityRule::new("r");
        let mut b = a.clone();
        b.set_uuid(Some(uuid::Uuid::new_v4()));
        assert!(a.same_config(&b));
        b.negate_source = true;
        assert!(!a.same_config(&b));
    }
}
